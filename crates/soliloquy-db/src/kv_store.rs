//! `SQLite` implementation of the `KeyValueStore` port.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use soliloquy_core::{KeyValueStore, StorageError};

/// Key-value store backed by one `SQLite` table.
///
/// Each write is a single statement, so individual keys are always
/// consistent; multi-key sequencing is left to callers.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensure the table exists, for pools not created by `setup_database`.
    pub async fn ensure_table(&self) -> Result<(), StorageError> {
        crate::setup::create_schema(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    /// All keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let pattern = format!("{}%", escape_like(prefix));
        let rows = sqlx::query("SELECT key FROM kv_store WHERE key LIKE ? ESCAPE '\\' ORDER BY key")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(rows.iter().map(|r| r.get("key")).collect())
    }
}

fn storage_error(err: sqlx::Error) -> StorageError {
    tracing::warn!(target: "soliloquy.db", error = %err, "SQLite operation failed");
    StorageError::Backend(err.to_string())
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let updated_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        sqlx::query("INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(&updated_at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    async fn store() -> SqliteKeyValueStore {
        SqliteKeyValueStore::new(setup_test_database().await.unwrap())
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = store().await;
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert!(!store.contains("nope").await.unwrap());
    }

    #[tokio::test]
    async fn set_replaces_and_remove_is_idempotent() {
        let store = store().await;
        store.set("preferences.darkMode", "true").await.unwrap();
        store.set("preferences.darkMode", "false").await.unwrap();
        assert_eq!(
            store.get("preferences.darkMode").await.unwrap().as_deref(),
            Some("false")
        );

        store.remove("preferences.darkMode").await.unwrap();
        store.remove("preferences.darkMode").await.unwrap();
        assert!(!store.contains("preferences.darkMode").await.unwrap());
    }

    #[tokio::test]
    async fn prefix_listing_escapes_wildcards() {
        let store = store().await;
        store.set("messages_1", "[]").await.unwrap();
        store.set("messages_2", "[]").await.unwrap();
        store.set("messagesX3", "[]").await.unwrap();
        store.set("data.chatSessions", "[]").await.unwrap();

        let keys = store.keys_with_prefix("messages_").await.unwrap();
        assert_eq!(keys, vec!["messages_1", "messages_2"]);
    }
}
