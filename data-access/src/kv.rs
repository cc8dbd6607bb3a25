//! Key-value store trait and the in-memory implementation

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tab_warden_core::Result;
use tokio::sync::{mpsc, RwLock};

/// A change notification for one key.
#[derive(Debug, Clone)]
pub struct KeyChange {
    pub key: String,
    /// Value before the write, `None` if the key was absent.
    pub old: Option<Value>,
    /// Value after the write, `None` if the key was removed.
    pub new: Option<Value>,
}

/// Asynchronous key-value store of JSON-shaped blobs.
///
/// The core tolerates concurrent reads but never issues two concurrent
/// writes to the same key; subscribers receive one [`KeyChange`] per key
/// actually changed by a `set` or `remove`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;

    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Register a change listener. Receivers that fall behind or drop are
    /// silently pruned.
    async fn subscribe(&self) -> mpsc::UnboundedReceiver<KeyChange>;
}

/// Shared subscriber bookkeeping used by both store implementations.
#[derive(Default)]
pub(crate) struct Subscribers {
    senders: RwLock<Vec<mpsc::UnboundedSender<KeyChange>>>,
}

impl Subscribers {
    pub(crate) async fn register(&self) -> mpsc::UnboundedReceiver<KeyChange> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.write().await.push(sender);
        receiver
    }

    pub(crate) async fn notify(&self, changes: &[KeyChange]) {
        if changes.is_empty() {
            return;
        }
        let mut senders = self.senders.write().await;
        senders.retain(|sender| {
            changes
                .iter()
                .all(|change| sender.send(change.clone()).is_ok())
        });
    }
}

/// In-memory [`KeyValueStore`] used by tests and ephemeral profiles.
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Value>>,
    subscribers: Arc<Subscribers>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            subscribers: Arc::new(Subscribers::default()),
        }
    }

    /// Snapshot of the whole store, for test assertions.
    pub async fn dump(&self) -> HashMap<String, Value> {
        self.entries.read().await.clone()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, new_entries: HashMap<String, Value>) -> Result<()> {
        let mut changes = Vec::new();
        {
            let mut entries = self.entries.write().await;
            for (key, value) in new_entries {
                let old = entries.insert(key.clone(), value.clone());
                if old.as_ref() != Some(&value) {
                    changes.push(KeyChange {
                        key,
                        old,
                        new: Some(value),
                    });
                }
            }
        }
        self.subscribers.notify(&changes).await;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut changes = Vec::new();
        {
            let mut entries = self.entries.write().await;
            for key in keys {
                if let Some(old) = entries.remove(*key) {
                    changes.push(KeyChange {
                        key: key.to_string(),
                        old: Some(old),
                        new: None,
                    });
                }
            }
        }
        self.subscribers.notify(&changes).await;
        Ok(())
    }

    async fn subscribe(&self) -> mpsc::UnboundedReceiver<KeyChange> {
        self.subscribers.register().await
    }
}
