//! Fact store implementations for factctx.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod registry;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use factctx_config::StoreConfig;
use factctx_core::fact::CategorySet;
use std::time::Duration;

pub use in_memory::InMemoryFactStore;

#[cfg(feature = "sqlite")]
pub use registry::{StoreRegistry, canonical_location};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteFactStore;

/// Settings shared by every store instance.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Categories accepted on `add`.
    pub categories: CategorySet,
    /// Bound on waiting for a connection or a lock held by another writer.
    pub timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            categories: CategorySet::default(),
            timeout: Duration::from_millis(5000),
        }
    }
}

impl StoreOptions {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            categories: config.category_set(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}
