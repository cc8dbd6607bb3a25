//! SQLite-backed key-value store

use crate::kv::{KeyChange, KeyValueStore, Subscribers};
use crate::schema;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tab_warden_core::{Result, StorageError};
use tokio::sync::mpsc;
use tokio_rusqlite::Connection;
use tracing::warn;

fn backend_err(details: impl std::fmt::Display) -> StorageError {
    StorageError::Backend {
        details: details.to_string(),
    }
}

/// Durable [`KeyValueStore`] over a single SQLite table.
pub struct SqliteKvStore {
    connection: Arc<Connection>,
    subscribers: Arc<Subscribers>,
}

impl SqliteKvStore {
    /// Open (or create) a store at the given path.
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = Connection::open(path)
            .await
            .map_err(|e| backend_err(format!("failed to open database: {e}")))?;
        Self::from_connection(connection).await
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self> {
        let connection = Connection::open(":memory:")
            .await
            .map_err(|e| backend_err(format!("failed to create in-memory database: {e}")))?;
        Self::from_connection(connection).await
    }

    async fn from_connection(connection: Connection) -> Result<Self> {
        let store = Self {
            connection: Arc::new(connection),
            subscribers: Arc::new(Subscribers::default()),
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.connection
            .call(|conn| {
                conn.execute_batch(schema::SCHEMA_SQL)?;
                Ok(())
            })
            .await
            .map_err(|e| backend_err(format!("failed to initialize schema: {e}")))?;
        Ok(())
    }

    async fn read_existing(&self, keys: Vec<String>) -> Result<HashMap<String, Value>> {
        let rows: Vec<(String, String)> = self
            .connection
            .call(move |conn| {
                let mut stmt = conn.prepare_cached("SELECT key, value FROM kv_store WHERE key = ?1")?;
                let mut out = Vec::new();
                for key in &keys {
                    let row: Option<String> = stmt
                        .query_row([key], |row| row.get(0))
                        .map(Some)
                        .or_else(|e| match e {
                            rusqlite::Error::QueryReturnedNoRows => Ok(None),
                            other => Err(other),
                        })?;
                    if let Some(value) = row {
                        out.push((key.clone(), value));
                    }
                }
                Ok(out)
            })
            .await
            .map_err(|e| backend_err(format!("failed to read keys: {e}")))?;

        let mut decoded = HashMap::new();
        for (key, raw) in rows {
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    decoded.insert(key, value);
                }
                Err(err) => {
                    // A corrupt row is dropped rather than poisoning every
                    // read; the next batch write replaces it.
                    warn!(key, error = %err, "dropping undecodable kv row");
                }
            }
        }
        Ok(decoded)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        self.read_existing(keys.iter().map(|k| k.to_string()).collect())
            .await
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = entries.keys().cloned().collect();
        let old_values = self.read_existing(keys).await?;

        let encoded: Vec<(String, String)> = entries
            .iter()
            .map(|(key, value)| {
                serde_json::to_string(value)
                    .map(|raw| (key.clone(), raw))
                    .map_err(|source| StorageError::Serialization { source })
            })
            .collect::<std::result::Result<_, _>>()?;

        self.connection
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(
                        "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?1, ?2)",
                    )?;
                    for (key, raw) in &encoded {
                        stmt.execute(rusqlite::params![key, raw])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| backend_err(format!("failed to write keys: {e}")))?;

        let changes: Vec<KeyChange> = entries
            .into_iter()
            .filter_map(|(key, value)| {
                let old = old_values.get(&key).cloned();
                if old.as_ref() == Some(&value) {
                    None
                } else {
                    Some(KeyChange {
                        key,
                        old,
                        new: Some(value),
                    })
                }
            })
            .collect();
        self.subscribers.notify(&changes).await;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let owned: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let old_values = self.read_existing(owned.clone()).await?;

        self.connection
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached("DELETE FROM kv_store WHERE key = ?1")?;
                    for key in &owned {
                        stmt.execute([key])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| backend_err(format!("failed to remove keys: {e}")))?;

        let changes: Vec<KeyChange> = old_values
            .into_iter()
            .map(|(key, old)| KeyChange {
                key,
                old: Some(old),
                new: None,
            })
            .collect();
        self.subscribers.notify(&changes).await;
        Ok(())
    }

    async fn subscribe(&self) -> mpsc::UnboundedReceiver<KeyChange> {
        self.subscribers.register().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn persists_across_reads() {
        let store = SqliteKvStore::in_memory().await.unwrap();
        store
            .set(HashMap::from([
                ("settings".to_string(), json!({"aging_enabled": true})),
                ("schema_version".to_string(), json!(2)),
            ]))
            .await
            .unwrap();

        let got = store.get(&["settings", "schema_version"]).await.unwrap();
        assert_eq!(got["schema_version"], json!(2));
        assert_eq!(got["settings"]["aging_enabled"], json!(true));
    }

    #[tokio::test]
    async fn remove_deletes_rows() {
        let store = SqliteKvStore::in_memory().await.unwrap();
        store
            .set(HashMap::from([("k".to_string(), json!([1, 2, 3]))]))
            .await
            .unwrap();
        store.remove(&["k"]).await.unwrap();
        assert!(store.get(&["k"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifies_on_change() {
        let store = SqliteKvStore::in_memory().await.unwrap();
        let mut changes = store.subscribe().await;
        store
            .set(HashMap::from([("k".to_string(), json!("v"))]))
            .await
            .unwrap();
        let change = changes.recv().await.unwrap();
        assert_eq!(change.key, "k");
        assert_eq!(change.new, Some(json!("v")));
    }
}
