//! Frame identifier type.

use std::fmt;

/// Identifies a frame in the buffer pool.
///
/// A frame id is a volatile cache slot: it is looked up through the page
/// index on every pin and never stored on disk or inside a page.
///
/// # Example
/// ```
/// use pagetree::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.0, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
