//! Page index - hash map from page id to the frame holding it.

use std::collections::HashMap;

use crate::common::{FrameId, PageId};

/// Maps resident page ids to frame slots.
///
/// Rebuilt incrementally as pages enter and leave frames. A miss is an
/// ordinary `None`, not an error.
#[derive(Debug, Default)]
pub struct PageIndex {
    map: HashMap<PageId, FrameId>,
}

impl PageIndex {
    /// Create an empty index sized for `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Record that `page_id` now lives in `frame_id`.
    pub fn insert(&mut self, page_id: PageId, frame_id: FrameId) {
        self.map.insert(page_id, frame_id);
    }

    /// Remove the mapping for `page_id`, returning the frame it occupied.
    pub fn delete(&mut self, page_id: PageId) -> Option<FrameId> {
        self.map.remove(&page_id)
    }

    /// Frame holding `page_id`, if resident.
    #[inline]
    pub fn lookup(&self, page_id: PageId) -> Option<FrameId> {
        self.map.get(&page_id).copied()
    }

    /// Drop every mapping.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of resident pages.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
