//! Index structures built on the buffer pool.

pub mod btree;

pub use btree::{BTreeConfig, BTreeIndex, ScanCursor, TreeStatistics};
