//! FactStore trait: durable, transactional storage of scoped facts.
//!
//! The store is the only component that touches persistent state. Every
//! write returns a structured result so producers (fact extraction, the
//! CLI, RPC tools) can never silently lose a failed write.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::fact::{Fact, FactDraft, FactFilter, FactId, FactUpdate, Scope};

/// The core FactStore trait.
///
/// Implementations: SQLite (durable), in-memory (testing, ephemeral sessions).
///
/// Contract shared by all implementations:
/// - `(scope, key)` is unique.
/// - Writers are serialized; readers never observe a partially written fact.
/// - Once a write returns `Ok`, every later `query`/`get` observes it.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a fact. Fails with `DuplicateKey` if `(scope, key)` exists.
    async fn add(&self, draft: FactDraft) -> Result<Fact, StoreError>;

    /// Replace the value, confidence and source of an existing fact.
    /// Fails with `NotFound` if no fact has this `(scope, key)`.
    async fn update(&self, scope: Scope, key: &str, update: FactUpdate)
    -> Result<Fact, StoreError>;

    /// Get a fact by id.
    async fn get(&self, id: &FactId) -> Result<Fact, StoreError>;

    /// Facts matching `filter`, in insertion order.
    async fn query(&self, filter: &FactFilter) -> Result<Vec<Fact>, StoreError>;

    /// Permanently remove a fact. Fails with `NotFound` if absent.
    async fn delete(&self, id: &FactId) -> Result<(), StoreError>;

    /// Total number of stored facts.
    async fn count(&self) -> Result<usize, StoreError>;
}
