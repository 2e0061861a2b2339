//! Key-value accessors over the `kv_store` table
//!
//! Values are stored as text. Flags are `"true"`/`"false"`; structured values
//! are JSON. A stored JSON value that no longer matches the expected shape is
//! treated as absent rather than as an error, since there is no schema
//! versioning for cached blobs.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sgc_common::{Error, Result};
use sqlx::SqlitePool;

/// Handle to the durable key-value store
///
/// Cloning is cheap (shares the connection pool).
#[derive(Clone)]
pub struct LocalStore {
    db: SqlitePool,
}

impl LocalStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Read a raw value
    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|(value,)| value))
    }

    /// Write a raw value (last writer wins)
    pub async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    /// Read a boolean flag; anything other than `"true"` reads as false
    pub async fn get_flag(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.as_deref() == Some("true"))
    }

    pub async fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        self.set_string(key, if value { "true" } else { "false" }).await
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }

    /// Remove several keys in one transaction
    pub async fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        let mut tx = self.db.begin().await.map_err(Error::Database)?;

        for key in keys {
            sqlx::query("DELETE FROM kv_store WHERE key = ?")
                .bind(*key)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    /// Read a JSON value, treating structurally incompatible data as absent
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_string(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring incompatible cached value");
                Ok(None)
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| Error::Internal(format!("Serialize {} failed: {}", key, e)))?;
        self.set_string(key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    async fn setup_test_store() -> LocalStore {
        let pool = sgc_common::db::init_in_memory_database().await.unwrap();
        LocalStore::new(pool)
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = setup_test_store().await;
        assert_eq!(store.get_string("absent").await.unwrap(), None);
        assert!(!store.get_flag("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_overwrites_without_duplicates() {
        let store = setup_test_store().await;

        store.set_string("session.phone", "+15550001").await.unwrap();
        store.set_string("session.phone", "+15550002").await.unwrap();

        assert_eq!(
            store.get_string("session.phone").await.unwrap(),
            Some("+15550002".to_string())
        );

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_store WHERE key = 'session.phone'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_flags() {
        let store = setup_test_store().await;

        store.set_flag("analysis.complete", true).await.unwrap();
        assert!(store.get_flag("analysis.complete").await.unwrap());

        store.set_flag("analysis.complete", false).await.unwrap();
        assert!(!store.get_flag("analysis.complete").await.unwrap());

        store.set_string("analysis.complete", "yes").await.unwrap();
        assert!(!store.get_flag("analysis.complete").await.unwrap());
    }

    #[tokio::test]
    async fn test_multi_remove() {
        let store = setup_test_store().await;
        store.set_string("a", "1").await.unwrap();
        store.set_string("b", "2").await.unwrap();
        store.set_string("c", "3").await.unwrap();

        store.multi_remove(&["a", "b", "missing"]).await.unwrap();

        assert!(!store.contains("a").await.unwrap());
        assert!(!store.contains("b").await.unwrap());
        assert!(store.contains("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_incompatible_json_reads_as_absent() {
        let store = setup_test_store().await;
        store.set_string("previews.generated", "[1, 2, 3]").await.unwrap();

        let map: Option<HashMap<String, String>> = store.get_json("previews.generated").await.unwrap();
        assert!(map.is_none());

        store.set_string("previews.generated", "{not json").await.unwrap();
        let map: Option<HashMap<String, String>> = store.get_json("previews.generated").await.unwrap();
        assert!(map.is_none());
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let store = setup_test_store().await;
        let mut map = HashMap::new();
        map.insert("office-0".to_string(), "aGVsbG8=".to_string());

        store.set_json("previews.generated", &map).await.unwrap();
        let loaded: HashMap<String, String> = store.get_json("previews.generated").await.unwrap().unwrap();
        assert_eq!(loaded, map);
    }
}
