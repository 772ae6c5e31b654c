//! B+ tree index over buffer-pool pages.
//!
//! # Components
//! - [`node`] - Typed leaf/internal views over page bytes
//! - [`BTreeIndex`] - Search, insert, delete with split/merge rebalancing
//! - [`ScanCursor`] - Forward range scans along the leaf chain
//! - [`TreeStatistics`] - Node and fill-factor report

pub mod node;
mod report;
mod scan;
mod tree;

pub use report::{FillFactor, TreeStatistics};
pub use scan::ScanCursor;
pub use tree::BTreeIndex;

use crate::common::config::DEFAULT_TREE_ORDER;
use crate::common::{Error, Result};
use node::{node_capacity, Entry, LeafEntry};

/// Largest order whose `2 * order` leaf entries fit in one page.
pub const MAX_TREE_ORDER: usize = node_capacity(LeafEntry::SIZE) / 2;

/// Shape parameters of a tree, fixed when the index is created.
///
/// Every non-root node holds between `order` and `2 * order` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeConfig {
    pub order: usize,
}

impl BTreeConfig {
    /// Validated config with the given order.
    ///
    /// # Errors
    /// `Error::InvalidOrder` unless `1 <= order <= MAX_TREE_ORDER`.
    pub fn new(order: usize) -> Result<Self> {
        let config = Self { order };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.order == 0 || self.order > MAX_TREE_ORDER {
            return Err(Error::InvalidOrder {
                order: self.order,
                max: MAX_TREE_ORDER,
            });
        }
        Ok(())
    }

    /// Most entries a node may hold.
    #[inline]
    pub fn max_entries(&self) -> usize {
        2 * self.order
    }
}

impl Default for BTreeConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_TREE_ORDER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_order_fits_page() {
        assert_eq!(MAX_TREE_ORDER, 204);
        assert!(BTreeConfig::new(MAX_TREE_ORDER).is_ok());
    }

    #[test]
    fn test_invalid_orders() {
        assert!(matches!(
            BTreeConfig::new(0),
            Err(Error::InvalidOrder { order: 0, .. })
        ));
        assert!(matches!(
            BTreeConfig::new(MAX_TREE_ORDER + 1),
            Err(Error::InvalidOrder { max: MAX_TREE_ORDER, .. })
        ));
    }

    #[test]
    fn test_default_config() {
        let config = BTreeConfig::default();
        assert_eq!(config.order, 2);
        assert_eq!(config.max_entries(), 4);
    }
}
