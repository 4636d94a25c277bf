//! Credential Store
//!
//! Key/value persistence adapter for session credential material, backed by
//! SQLite. Each record is a string key (`creds`, `pre-key-<id>`, ...) mapped
//! to an opaque JSON value.
//!
//! Persistence here is a best-effort cache of session state, not a
//! transactional ledger: every operation logs its failure and degrades to a
//! no-op from the caller's perspective. A failed write leaves the durable
//! state stale but consistent.

use std::path::Path;

use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::error;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS credentials (
    key TEXT PRIMARY KEY,
    data TEXT NOT NULL
)";

/// SQLite-backed credential store.
///
/// Cheap to clone; all clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    /// Open (or create) the store at `path`.
    ///
    /// This is the only fallible entry point; once the pool exists, every
    /// operation is infallible from the caller's perspective.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Read the value stored under `key`, or `None` if absent.
    ///
    /// Read failures (including corrupt records) are logged and reported as
    /// absence, matching the degradation policy above.
    pub async fn read(&self, key: &str) -> Option<Value> {
        let row: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT data FROM credentials WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await;

        match row {
            Ok(Some(text)) => match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    error!(key, error = %e, "corrupt credential record, treating as absent");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!(key, error = %e, "failed to read credential record");
                None
            }
        }
    }

    /// Upsert `value` under `key`.
    ///
    /// A null value is equivalent to absence, so writing one deletes the
    /// record instead.
    pub async fn write(&self, key: &str, value: &Value) {
        if value.is_null() {
            self.delete(key).await;
            return;
        }

        let result = sqlx::query(
            "INSERT INTO credentials (key, data) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data",
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(key, error = %e, "failed to write credential record");
        }
    }

    /// Delete the record under `key`. Deleting a missing key is not an error.
    pub async fn delete(&self, key: &str) {
        let result = sqlx::query("DELETE FROM credentials WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await;

        if let Err(e) = result {
            error!(key, error = %e, "failed to delete credential record");
        }
    }

    /// Destroy every persisted record (hard reset / logout cleanup).
    pub async fn wipe_all(&self) {
        let result = sqlx::query("DELETE FROM credentials").execute(&self.pool).await;

        if let Err(e) = result {
            error!(error = %e, "failed to wipe credential store");
        }
    }

    /// Number of persisted records.
    pub async fn count(&self) -> u64 {
        let result: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM credentials")
                .fetch_one(&self.pool)
                .await;

        match result {
            Ok(n) => n as u64,
            Err(e) => {
                error!(error = %e, "failed to count credential records");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open_test_store() -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(&dir.path().join("session.db"))
            .await
            .expect("failed to open test store");
        (dir, store)
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let (_dir, store) = open_test_store().await;
        let value = json!({"keyId": 7, "public": [1, 2, 3]});

        store.write("pre-key-7", &value).await;

        assert_eq!(store.read("pre-key-7").await, Some(value));
    }

    #[tokio::test]
    async fn test_read_absent_key_is_none() {
        let (_dir, store) = open_test_store().await;

        assert_eq!(store.read("no-such-key").await, None);
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_value() {
        let (_dir, store) = open_test_store().await;

        store.write("session-1", &json!({"v": 1})).await;
        store.write("session-1", &json!({"v": 2})).await;

        assert_eq!(store.read("session-1").await, Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let (_dir, store) = open_test_store().await;

        store.write("sender-key-a", &json!("blob")).await;
        store.delete("sender-key-a").await;

        assert_eq!(store.read("sender-key-a").await, None);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_not_an_error() {
        let (_dir, store) = open_test_store().await;

        // Must not panic or log past the store layer.
        store.delete("never-existed").await;
    }

    #[tokio::test]
    async fn test_null_write_deletes_instead() {
        let (_dir, store) = open_test_store().await;

        store.write("app-state-sync-key-x", &json!({"some": "data"})).await;
        store.write("app-state-sync-key-x", &Value::Null).await;

        assert_eq!(store.read("app-state-sync-key-x").await, None);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_wipe_all_destroys_everything() {
        let (_dir, store) = open_test_store().await;

        store.write("creds", &json!({"registrationId": 42})).await;
        store.write("pre-key-1", &json!("a")).await;
        store.write("pre-key-2", &json!("b")).await;
        assert_eq!(store.count().await, 3);

        store.wipe_all().await;

        assert_eq!(store.count().await, 0);
        assert_eq!(store.read("creds").await, None);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.db");

        {
            let store = CredentialStore::open(&path).await.unwrap();
            store.write("creds", &json!({"registrationId": 99})).await;
        }

        let store = CredentialStore::open(&path).await.unwrap();
        assert_eq!(
            store.read("creds").await,
            Some(json!({"registrationId": 99}))
        );
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_distinct_keys() {
        let (_dir, store) = open_test_store().await;

        let writes = (0..16).map(|i| {
            let store = store.clone();
            async move {
                store.write(&format!("pre-key-{i}"), &json!(i)).await;
            }
        });
        futures::future::join_all(writes).await;

        assert_eq!(store.count().await, 16);
    }
}
