//! Store registry: one shared handle per storage location.
//!
//! Multiple logical stores (one per project or tenant) live side by side.
//! The registry caches open stores keyed by their canonical database path,
//! so two callers asking for the same file share a handle while a caller
//! asking for a different file always gets that file's store.

use crate::StoreOptions;
use crate::sqlite::SqliteFactStore;
use factctx_core::error::StoreError;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

type Slot = Arc<OnceCell<Arc<SqliteFactStore>>>;

/// Registry of open SQLite stores, keyed by canonical location.
///
/// Each location has its own slot. The map lock is only held to find or
/// insert a slot, never across an open, so a slow open of one location
/// does not hold up any other.
pub struct StoreRegistry {
    options: StoreOptions,
    stores: Mutex<HashMap<PathBuf, Slot>>,
}

impl StoreRegistry {
    /// Create an empty registry. `options` apply to every store it opens.
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Get the store for `path`, opening it on first use.
    ///
    /// Concurrent first calls for the same location produce a single
    /// handle. A failed open leaves the slot empty so a later call retries.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<Arc<SqliteFactStore>, StoreError> {
        let location = canonical_location(path.as_ref())?;
        let slot = self.slot(&location).await;

        if let Some(store) = slot.get() {
            debug!(location = %location.display(), "Reusing open fact store");
            return Ok(Arc::clone(store));
        }

        let store = slot
            .get_or_try_init(|| async {
                let store = SqliteFactStore::open(&location, self.options.clone()).await?;
                info!(location = %location.display(), "Registered fact store");
                Ok::<_, StoreError>(Arc::new(store))
            })
            .await?;
        Ok(Arc::clone(store))
    }

    async fn slot(&self, location: &Path) -> Slot {
        let mut stores = self.stores.lock().await;
        Arc::clone(stores.entry(location.to_path_buf()).or_default())
    }

    /// Locations with an open store.
    pub async fn locations(&self) -> Vec<PathBuf> {
        let mut locations: Vec<PathBuf> = self
            .stores
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(location, _)| location.clone())
            .collect();
        locations.sort();
        locations
    }

    /// Number of open stores.
    pub async fn len(&self) -> usize {
        self.stores
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Whether no store has been opened yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Resolve `path` to the absolute location used as the registry key.
///
/// Relative paths are anchored at the current directory. The longest
/// existing prefix is canonicalized (resolving symlinks) and the missing
/// remainder is appended with `.` and `..` applied lexically. Nothing is
/// created on disk.
pub fn canonical_location(path: &Path) -> Result<PathBuf, StoreError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| StoreError::Unavailable(format!("current directory: {e}")))?
            .join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing: Vec<Component<'_>> = Vec::new();
    while !existing.exists() {
        let Some(parent) = existing.parent() else {
            break;
        };
        if let Some(last) = existing.components().next_back() {
            missing.push(last);
        }
        existing = parent;
    }

    let mut location = existing.canonicalize().map_err(|e| {
        StoreError::Unavailable(format!("canonicalize {}: {e}", existing.display()))
    })?;
    for component in missing.into_iter().rev() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                location.pop();
            }
            other => location.push(other.as_os_str()),
        }
    }

    if location.file_name().is_none() {
        return Err(StoreError::Unavailable(format!(
            "{} does not name a file",
            absolute.display()
        )));
    }
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use factctx_core::fact::{FactDraft, FactFilter, Scope};
    use factctx_core::store::FactStore;

    #[tokio::test]
    async fn distinct_paths_get_distinct_stores() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(StoreOptions::default());

        let first = registry.open(dir.path().join("a.sqlite")).await.unwrap();
        let second = registry.open(dir.path().join("b.sqlite")).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        first
            .add(FactDraft::new(Scope::Project, "fact", "db_engine", "postgres"))
            .await
            .unwrap();

        // Data written through one location is never visible through another
        assert_eq!(second.count().await.unwrap(), 0);
        assert_eq!(first.count().await.unwrap(), 1);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn same_location_shares_a_handle() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(StoreOptions::default());

        let direct = dir.path().join("facts.sqlite");
        let roundabout = dir.path().join("nested").join("..").join("facts.sqlite");
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();

        let a = registry.open(&direct).await.unwrap();
        let b = registry.open(&roundabout).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn data_is_reachable_through_later_opens() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(StoreOptions::default());
        let tenant_a = dir.path().join("tenant_a").join("facts.sqlite");
        let tenant_b = dir.path().join("tenant_b").join("facts.sqlite");

        registry
            .open(&tenant_a)
            .await
            .unwrap()
            .add(FactDraft::new(Scope::Org, "fact", "owner", "team-a"))
            .await
            .unwrap();
        registry
            .open(&tenant_b)
            .await
            .unwrap()
            .add(FactDraft::new(Scope::Org, "fact", "owner", "team-b"))
            .await
            .unwrap();

        let a = registry.open(&tenant_a).await.unwrap();
        let facts = a.query(&FactFilter::all()).await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value.render(), "\"team-a\"");
    }

    #[test]
    fn resolving_a_location_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("new").join("deeper");
        let path = missing.join(".").join("x").join("..").join("facts.sqlite");

        let location = canonical_location(&path).unwrap();
        assert!(!missing.exists());
        assert_eq!(
            location,
            dir.path()
                .canonicalize()
                .unwrap()
                .join("new")
                .join("deeper")
                .join("facts.sqlite")
        );
    }

    #[test]
    fn location_must_name_a_file() {
        assert!(canonical_location(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn concurrent_first_opens_share_one_handle() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(StoreOptions::default());
        let path = dir.path().join("shared").join("facts.sqlite");

        let (a, b, c, d) = tokio::join!(
            registry.open(&path),
            registry.open(&path),
            registry.open(&path),
            registry.open(&path),
        );
        let a = a.unwrap();
        for other in [b.unwrap(), c.unwrap(), d.unwrap()] {
            assert!(Arc::ptr_eq(&a, &other));
        }
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn pending_open_does_not_block_other_locations() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(StoreOptions::default());
        let slow_path = dir.path().join("slow.sqlite");

        // Hold the slow location mid-open until released
        let slow = canonical_location(&slow_path).unwrap();
        let slot = registry.slot(&slow).await;
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let pending = tokio::spawn(async move {
            slot.get_or_try_init(|| async move {
                let _ = gate.await;
                SqliteFactStore::open(&slow, StoreOptions::default())
                    .await
                    .map(Arc::new)
            })
            .await
            .map(Arc::clone)
        });
        tokio::task::yield_now().await;

        let fast = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            registry.open(dir.path().join("fast.sqlite")),
        )
        .await
        .expect("open of another location waited on the pending one")
        .unwrap();
        assert_eq!(fast.count().await.unwrap(), 0);
        assert_eq!(registry.len().await, 1);

        release.send(()).unwrap();
        let slow_store = pending.await.unwrap().unwrap();
        let again = registry.open(&slow_path).await.unwrap();
        assert!(Arc::ptr_eq(&slow_store, &again));
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn failed_open_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(StoreOptions::default());
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let path = blocker.join("facts.sqlite");

        assert!(registry.open(&path).await.is_err());
        assert!(registry.is_empty().await);
        assert!(registry.locations().await.is_empty());

        // Once the obstacle is gone the same location opens normally
        std::fs::remove_file(&blocker).unwrap();
        let store = registry.open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn locations_are_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(StoreOptions::default());
        assert!(registry.is_empty().await);
        registry.open(dir.path().join("x.sqlite")).await.unwrap();

        let locations = registry.locations().await;
        assert_eq!(locations.len(), 1);
        assert!(locations[0].is_absolute());
        assert_eq!(
            locations[0],
            dir.path().canonicalize().unwrap().join("x.sqlite")
        );
    }
}
