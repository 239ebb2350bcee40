//! PostgreSQL implementation of SlotStore
//!
//! Production persistence for hosts sharing one slot table:
//! - One row per key in `pidwarden_slot_cache`
//! - Optimistic concurrency via a version column
//! - Single-statement writes, so a failed write leaves the row unchanged

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};

use super::store::*;

/// PostgreSQL implementation of SlotStore
///
/// # Example
///
/// ```ignore
/// use pidwarden_pool::persistence::PostgresSlotStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/pidwarden").await?;
/// let store = PostgresSlotStore::new(pool);
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresSlotStore {
    pool: PgPool,
}

impl PostgresSlotStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and create a store
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                StoreError::Database(e.to_string())
            })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_version(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query("SELECT version FROM pidwarden_slot_cache WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(row.map(|r| r.get::<i64, _>("version")))
    }

    async fn conflict(&self, key: &str, precondition: WritePrecondition) -> StoreError {
        let actual = match self.current_version(key).await {
            Ok(actual) => actual,
            Err(e) => return e,
        };
        match precondition.check(key, actual) {
            Err(conflict) => conflict,
            // Row changed between the write and this read; report what we expected.
            Ok(()) => StoreError::ConcurrencyConflict {
                key: key.to_string(),
                expected: match precondition {
                    WritePrecondition::Version(v) => Some(v),
                    _ => None,
                },
                actual,
            },
        }
    }
}

#[async_trait]
impl SlotStore for PostgresSlotStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT value, version FROM pidwarden_slot_cache WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to read slot blob: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(row.map(|r| StoredBlob {
            data: r.get("value"),
            version: r.get("version"),
        }))
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn set(
        &self,
        key: &str,
        data: Vec<u8>,
        precondition: WritePrecondition,
    ) -> Result<i64, StoreError> {
        let query = match precondition {
            WritePrecondition::Any => sqlx::query(
                r#"
                INSERT INTO pidwarden_slot_cache (key, value, version, updated_at)
                VALUES ($1, $2, 1, NOW())
                ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value,
                    version = pidwarden_slot_cache.version + 1,
                    updated_at = NOW()
                RETURNING version
                "#,
            )
            .bind(key)
            .bind(&data),
            WritePrecondition::Absent => sqlx::query(
                r#"
                INSERT INTO pidwarden_slot_cache (key, value, version, updated_at)
                VALUES ($1, $2, 1, NOW())
                ON CONFLICT (key) DO NOTHING
                RETURNING version
                "#,
            )
            .bind(key)
            .bind(&data),
            WritePrecondition::Version(expected) => sqlx::query(
                r#"
                UPDATE pidwarden_slot_cache
                SET value = $2, version = version + 1, updated_at = NOW()
                WHERE key = $1 AND version = $3
                RETURNING version
                "#,
            )
            .bind(key)
            .bind(&data)
            .bind(expected),
        };

        let row = query.fetch_optional(&self.pool).await.map_err(|e| {
            error!("Failed to write slot blob: {}", e);
            StoreError::Database(e.to_string())
        })?;

        match row {
            Some(row) => {
                let version: i64 = row.get("version");
                debug!(%key, version, "wrote slot blob");
                Ok(version)
            }
            None => Err(self.conflict(key, precondition).await),
        }
    }
}
