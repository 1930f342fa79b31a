//! SQLite fact store.
//!
//! Uses a single SQLite database file with one `facts` table. `(scope, key)`
//! carries a UNIQUE constraint so duplicate adds fail inside the database,
//! and the integer `iid` column preserves insertion order for `query`.
//!
//! The database runs in WAL mode: readers see the last committed state while
//! a writer is active. Writers are additionally serialized in-process so a
//! mutation never interleaves with another one from the same handle.

use crate::StoreOptions;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use factctx_core::error::StoreError;
use factctx_core::fact::{Fact, FactDraft, FactFilter, FactId, FactUpdate, FactValue, Scope};
use factctx_core::store::FactStore;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// A durable SQLite fact store.
pub struct SqliteFactStore {
    pool: SqlitePool,
    location: PathBuf,
    options: StoreOptions,
    write_lock: Mutex<()>,
}

impl SqliteFactStore {
    /// Open (or create) the database file at `path`.
    ///
    /// Missing parent directories and the schema are created automatically.
    pub async fn open(path: &Path, options: StoreOptions) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Unavailable(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let connect = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(options.timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(options.timeout)
            .connect_with(connect)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self::init(pool, path.to_path_buf(), options).await?;
        info!(path = %path.display(), "SQLite fact store opened");
        Ok(store)
    }

    /// An ephemeral in-process database (useful for tests).
    ///
    /// Pinned to a single connection that is never recycled, since every
    /// SQLite connection to `:memory:` gets its own database.
    pub async fn in_memory(options: StoreOptions) -> Result<Self, StoreError> {
        let connect = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite path: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(options.timeout)
            .connect_with(connect)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        Self::init(pool, PathBuf::from(":memory:"), options).await
    }

    async fn init(
        pool: SqlitePool,
        location: PathBuf,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            location,
            options,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// The file this store was opened on (`:memory:` for ephemeral stores).
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Close the underlying pool. Later operations fail with `Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS facts (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT UNIQUE NOT NULL,
                scope       TEXT NOT NULL,
                category    TEXT NOT NULL,
                key         TEXT NOT NULL,
                value       TEXT NOT NULL,
                confidence  REAL NOT NULL,
                source      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE (scope, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("facts table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_facts_category ON facts(category)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("category index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    async fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        tokio::time::timeout(self.options.timeout, self.write_lock.lock())
            .await
            .map_err(|_| {
                StoreError::Unavailable(format!(
                    "timed out after {:?} waiting for the write lock",
                    self.options.timeout
                ))
            })
    }

    /// Parse a `Fact` from a SQLite row.
    fn row_to_fact(row: &SqliteRow) -> Result<Fact, StoreError> {
        let id: String = row.try_get("id").map_err(|e| decode_err("id", e))?;
        let scope: String = row.try_get("scope").map_err(|e| decode_err("scope", e))?;
        let category: String = row
            .try_get("category")
            .map_err(|e| decode_err("category", e))?;
        let key: String = row.try_get("key").map_err(|e| decode_err("key", e))?;
        let value: String = row.try_get("value").map_err(|e| decode_err("value", e))?;
        let confidence: f64 = row
            .try_get("confidence")
            .map_err(|e| decode_err("confidence", e))?;
        let source: String = row.try_get("source").map_err(|e| decode_err("source", e))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| decode_err("created_at", e))?;

        let scope = Scope::from_str(&scope)
            .map_err(|e| StoreError::Serialization(format!("stored scope: {e}")))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Serialization(format!("stored created_at: {e}")))?;

        Ok(Fact {
            id: FactId(id),
            scope,
            category,
            key,
            value: FactValue::from_json(&value)?,
            confidence,
            source,
            created_at,
        })
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_err(column: &str, e: sqlx::Error) -> StoreError {
    StoreError::Serialization(format!("{column} column: {e}"))
}

fn storage_err(context: &str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("{context}: {e}"))
        }
        _ => StoreError::Unavailable(format!("{context}: {e}")),
    }
}

#[async_trait]
impl FactStore for SqliteFactStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn add(&self, draft: FactDraft) -> Result<Fact, StoreError> {
        draft.validate(&self.options.categories)?;
        let fact = draft.into_fact();
        let value = fact.value.to_json()?;

        let _guard = self.lock_writes().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO facts (id, scope, category, key, value, confidence, source, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(fact.id.as_str())
        .bind(fact.scope.as_str())
        .bind(&fact.category)
        .bind(&fact.key)
        .bind(&value)
        .bind(fact.confidence)
        .bind(&fact.source)
        .bind(timestamp(&fact.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(id = %fact.id, scope = %fact.scope, key = %fact.key, "Added fact");
                Ok(fact)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateKey {
                    scope: fact.scope,
                    key: fact.key,
                })
            }
            Err(e) => Err(storage_err("INSERT failed", e)),
        }
    }

    async fn update(
        &self,
        scope: Scope,
        key: &str,
        update: FactUpdate,
    ) -> Result<Fact, StoreError> {
        update.validate()?;
        let value = update.value.to_json()?;
        let created_at = Utc::now();

        let _guard = self.lock_writes().await?;
        let row = sqlx::query(
            r#"
            UPDATE facts
            SET value = ?1, confidence = ?2, source = ?3, created_at = ?4
            WHERE scope = ?5 AND key = ?6
            RETURNING *
            "#,
        )
        .bind(&value)
        .bind(update.confidence)
        .bind(&update.source)
        .bind(timestamp(&created_at))
        .bind(scope.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("UPDATE failed", e))?;

        match row {
            Some(ref r) => {
                let fact = Self::row_to_fact(r)?;
                debug!(id = %fact.id, scope = %scope, key = %key, "Updated fact");
                Ok(fact)
            }
            None => Err(StoreError::NotFound(format!("no fact '{key}' in scope {scope}"))),
        }
    }

    async fn get(&self, id: &FactId) -> Result<Fact, StoreError> {
        let row = sqlx::query("SELECT * FROM facts WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("GET by ID", e))?;

        match row {
            Some(ref r) => Self::row_to_fact(r),
            None => Err(StoreError::NotFound(format!("no fact with id {id}"))),
        }
    }

    async fn query(&self, filter: &FactFilter) -> Result<Vec<Fact>, StoreError> {
        let mut sql = String::from("SELECT * FROM facts WHERE 1 = 1");
        if filter.scope.is_some() {
            sql.push_str(" AND scope = ?");
        }
        if filter.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        if filter.min_confidence.is_some() {
            sql.push_str(" AND confidence >= ?");
        }
        sql.push_str(" ORDER BY iid ASC");

        let mut db_query = sqlx::query(&sql);
        if let Some(scope) = filter.scope {
            db_query = db_query.bind(scope.as_str());
        }
        if let Some(category) = filter.category.as_deref() {
            db_query = db_query.bind(category);
        }
        if let Some(min) = filter.min_confidence {
            db_query = db_query.bind(min);
        }

        let rows = db_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("QUERY failed", e))?;

        rows.iter().map(Self::row_to_fact).collect()
    }

    async fn delete(&self, id: &FactId) -> Result<(), StoreError> {
        let _guard = self.lock_writes().await?;
        let result = sqlx::query("DELETE FROM facts WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("DELETE failed", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("no fact with id {id}")));
        }
        debug!(id = %id, "Deleted fact");
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM facts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_err("COUNT", e))?;

        let cnt: i64 = row.try_get("cnt").map_err(|e| decode_err("cnt", e))?;
        Ok(cnt as usize)
    }
}
