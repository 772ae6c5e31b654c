//! pagetree - a disk-oriented B+ tree index over a pinning buffer pool.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           pagetree                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Index Layer (index/btree)                      │   │
//! │  │   BTreeIndex: search / insert / delete / open_scan       │   │
//! │  │   Node views (leaf, internal) · ScanCursor · reports     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓ pin / unpin                      │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Buffer Pool (buffer/)                          │   │
//! │  │   Frames + PageIndex + ClockReplacer + page guards       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓ PageStore                        │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │   DiskManager + directory page + Page/PageHeader         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, RecordId, Error, config)
//! - [`storage`] - Page store trait, disk manager and page formats
//! - [`buffer`] - Buffer pool, clock replacement and page guards
//! - [`index`] - The B+ tree
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use pagetree::{BTreeConfig, BTreeIndex, BufferPool, DiskManager, PageId, RecordId};
//!
//! let dm = DiskManager::open_or_create("my_index.db").unwrap();
//! let pool = Arc::new(BufferPool::new(64, dm));
//! let mut tree = BTreeIndex::open_or_create(pool, "people", BTreeConfig::default()).unwrap();
//!
//! for key in 1..=30 {
//!     tree.insert(key, RecordId::new(PageId::new(key as u32), 0)).unwrap();
//! }
//! let keys: Vec<i32> = tree
//!     .open_scan(Some(10), Some(20))
//!     .unwrap()
//!     .map(|item| item.unwrap().1)
//!     .collect();
//! assert_eq!(keys, (10..=20).collect::<Vec<_>>());
//!
//! tree.close().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, Key, PageId, RecordId, Result};

pub use buffer::{BufferPool, BufferPoolStats, Frame, StatsSnapshot};
pub use index::btree::{BTreeConfig, BTreeIndex, ScanCursor, TreeStatistics, MAX_TREE_ORDER};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::{DiskManager, PageStore};
