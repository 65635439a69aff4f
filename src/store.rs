//! Flat record store: JSON values under namespaced string keys.
//!
//! Every record's `id` field equals its key, so prefix scans double as
//! collection listings and existence-at-key doubles as a uniqueness check.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Writes the record only if the key is vacant. Returns true when the
    /// write created the record. This is the uniqueness gate for composite
    /// keys; callers must not substitute a get-then-set sequence.
    async fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All records whose key starts with `prefix`, in no guaranteed order.
    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, StoreError>;
}

pub async fn fetch<T: DeserializeOwned>(
    store: &dyn RecordStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn fetch_prefix<T: DeserializeOwned>(
    store: &dyn RecordStore,
    prefix: &str,
) -> Result<Vec<T>, StoreError> {
    store
        .get_by_prefix(prefix)
        .await?
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(StoreError::from))
        .collect()
}

pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS records (key TEXT PRIMARY KEY, value JSONB NOT NULL)")
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT value FROM records WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|row| row.get("value")))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO records (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(&value)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, StoreError> {
        let result =
            sqlx::query("INSERT INTO records (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
                .bind(key)
                .bind(&value)
                .execute(&self.db)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM records WHERE key = $1")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, StoreError> {
        // Escape LIKE wildcards so a literal prefix match is guaranteed.
        let pattern = format!(
            "{}%",
            prefix
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let rows = sqlx::query("SELECT value FROM records WHERE key LIKE $1 ORDER BY key")
            .bind(pattern)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("value")).collect())
    }
}

/// In-process store with the same semantics as `PgStore`. Used by the test
/// suite; `set_if_absent` holds the write lock across check and insert.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.records.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.to_string(), value);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.clone())
            .collect())
    }
}
