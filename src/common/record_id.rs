//! Record identifier type.

use std::fmt;

use super::PageId;

/// Location of a stored record: the heap page holding it plus its slot.
///
/// The index never dereferences a `RecordId`; it is the payload carried
/// by leaf entries and handed back by scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    /// Encoded size in bytes (page id + slot).
    pub const SIZE: usize = PageId::SIZE + 2;

    /// Create a new RecordId.
    #[inline]
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }

    /// Decode from the first six bytes of `bytes`.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        Self {
            page_id: PageId::from_le_bytes(bytes),
            slot: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    /// Encode into the first six bytes of `out`.
    pub fn write_le_bytes(&self, out: &mut [u8]) {
        self.page_id.write_le_bytes(out);
        out[4..6].copy_from_slice(&self.slot.to_le_bytes());
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[pg,slot]=[{},{}]", self.page_id.0, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_byte_layout() {
        let rid = RecordId::new(PageId::new(7), 0x0102);
        let mut buf = [0u8; RecordId::SIZE];
        rid.write_le_bytes(&mut buf);
        assert_eq!(buf, [7, 0, 0, 0, 0x02, 0x01]);
        assert_eq!(RecordId::from_le_bytes(&buf), rid);
    }

    #[test]
    fn test_record_id_display() {
        let rid = RecordId::new(PageId::new(3), 4);
        assert_eq!(rid.to_string(), "[pg,slot]=[3,4]");
    }
}
