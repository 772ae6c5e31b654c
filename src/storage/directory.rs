//! File-entry registry stored on the directory page (page 0).

use crate::common::config::{MAX_FILE_NAME_LEN, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Name → root page mapping persisted on page 0.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       5     PageHeader (type = Directory)
/// 5       2     entry count (u16)
/// 8       ...   entries: name_len (u8) | name bytes | root page id (u32)
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Directory {
    entries: Vec<(String, PageId)>,
}

impl Directory {
    const OFFSET_COUNT: usize = PageHeader::SIZE;
    const OFFSET_ENTRIES: usize = 8;

    pub(crate) fn decode(page: &Page) -> Result<Self> {
        let data = page.as_slice();
        let found = page.page_type();
        if found != PageType::Directory {
            return Err(Error::WrongPageType {
                expected: PageType::Directory,
                found,
            });
        }

        let count = u16::from_le_bytes([data[Self::OFFSET_COUNT], data[Self::OFFSET_COUNT + 1]]);
        let mut entries = Vec::with_capacity(count as usize);
        let mut offset = Self::OFFSET_ENTRIES;
        for _ in 0..count {
            let name_len = data[offset] as usize;
            offset += 1;
            let name = String::from_utf8_lossy(&data[offset..offset + name_len]).into_owned();
            offset += name_len;
            let root = PageId::from_le_bytes(&data[offset..]);
            offset += PageId::SIZE;
            entries.push((name, root));
        }

        Ok(Self { entries })
    }

    pub(crate) fn encode(&self, page: &mut Page) {
        page.reset();
        page.set_header(&PageHeader::new(PageType::Directory));

        let data = page.as_mut_slice();
        data[Self::OFFSET_COUNT..Self::OFFSET_COUNT + 2]
            .copy_from_slice(&(self.entries.len() as u16).to_le_bytes());

        let mut offset = Self::OFFSET_ENTRIES;
        for (name, root) in &self.entries {
            data[offset] = name.len() as u8;
            offset += 1;
            data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
            offset += name.len();
            root.write_le_bytes(&mut data[offset..]);
            offset += PageId::SIZE;
        }
        page.update_checksum();
    }

    pub(crate) fn get(&self, name: &str) -> Option<PageId> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|&(_, root)| root)
    }

    pub(crate) fn add(&mut self, name: &str, root: PageId) -> Result<()> {
        if name.len() > MAX_FILE_NAME_LEN {
            return Err(Error::NameTooLong(name.to_string()));
        }
        if self.get(name).is_some() {
            return Err(Error::FileEntryExists(name.to_string()));
        }
        if self.encoded_len() + 1 + name.len() + PageId::SIZE > PAGE_SIZE {
            return Err(Error::DirectoryFull);
        }
        self.entries.push((name.to_string(), root));
        Ok(())
    }

    pub(crate) fn set(&mut self, name: &str, root: PageId) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|(entry, _)| entry == name)
            .ok_or_else(|| Error::FileEntryNotFound(name.to_string()))?;
        entry.1 = root;
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> Result<()> {
        let position = self
            .entries
            .iter()
            .position(|(entry, _)| entry == name)
            .ok_or_else(|| Error::FileEntryNotFound(name.to_string()))?;
        self.entries.remove(position);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        Self::OFFSET_ENTRIES
            + self
                .entries
                .iter()
                .map(|(name, _)| 1 + name.len() + PageId::SIZE)
                .sum::<usize>()
    }
}
