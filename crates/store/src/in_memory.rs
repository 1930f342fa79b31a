//! In-memory fact store: useful for testing and ephemeral sessions.

use crate::StoreOptions;
use async_trait::async_trait;
use factctx_core::error::StoreError;
use factctx_core::fact::{Fact, FactDraft, FactFilter, FactId, FactUpdate, Scope};
use factctx_core::store::FactStore;
use tokio::sync::RwLock;

/// An in-memory store that keeps facts in a Vec, in insertion order.
///
/// Every mutation runs under the write half of one lock, so readers see
/// either the state before or after it.
pub struct InMemoryFactStore {
    facts: RwLock<Vec<Fact>>,
    options: StoreOptions,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            facts: RwLock::new(Vec::new()),
            options,
        }
    }
}

impl Default for InMemoryFactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn add(&self, draft: FactDraft) -> Result<Fact, StoreError> {
        draft.validate(&self.options.categories)?;
        let mut facts = self.facts.write().await;
        if facts
            .iter()
            .any(|f| f.scope == draft.scope && f.key == draft.key)
        {
            return Err(StoreError::DuplicateKey {
                scope: draft.scope,
                key: draft.key,
            });
        }
        let fact = draft.into_fact();
        facts.push(fact.clone());
        Ok(fact)
    }

    async fn update(
        &self,
        scope: Scope,
        key: &str,
        update: FactUpdate,
    ) -> Result<Fact, StoreError> {
        update.validate()?;
        let mut facts = self.facts.write().await;
        let slot = facts
            .iter_mut()
            .find(|f| f.scope == scope && f.key == key)
            .ok_or_else(|| StoreError::NotFound(format!("no fact '{key}' in scope {scope}")))?;
        *slot = update.apply(slot);
        Ok(slot.clone())
    }

    async fn get(&self, id: &FactId) -> Result<Fact, StoreError> {
        let facts = self.facts.read().await;
        facts
            .iter()
            .find(|f| &f.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("no fact with id {id}")))
    }

    async fn query(&self, filter: &FactFilter) -> Result<Vec<Fact>, StoreError> {
        let facts = self.facts.read().await;
        Ok(facts.iter().filter(|f| filter.matches(f)).cloned().collect())
    }

    async fn delete(&self, id: &FactId) -> Result<(), StoreError> {
        let mut facts = self.facts.write().await;
        let len_before = facts.len();
        facts.retain(|f| &f.id != id);
        if facts.len() == len_before {
            return Err(StoreError::NotFound(format!("no fact with id {id}")));
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.facts.read().await.len())
    }
}
