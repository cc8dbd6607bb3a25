//! Batched end-of-cycle state writes
//!
//! An evaluation cycle mutates the tab and window registries many times;
//! persisting on every mutation would thrash the store and interleave
//! writers. Instead the cycle collects everything into a [`StateBatch`]
//! and commits once, making the batch the sole writer of the registry
//! keys.

use crate::kv::KeyValueStore;
use crate::schema::*;
use serde_json::Value;
use std::collections::HashMap;
use tab_warden_core::*;

/// Accumulates registry snapshots for a single `set` call.
#[derive(Default)]
pub struct StateBatch {
    entries: HashMap<String, Value>,
}

impl StateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tab_meta(mut self, tab_meta: &HashMap<TabId, TabMeta>) -> Result<Self> {
        self.entries.insert(
            KEY_TAB_META.to_string(),
            serde_json::to_value(tab_meta).map_err(StorageError::from)?,
        );
        Ok(self)
    }

    pub fn window_state(
        mut self,
        window_state: &HashMap<WindowId, WindowState>,
    ) -> Result<Self> {
        self.entries.insert(
            KEY_WINDOW_STATE.to_string(),
            serde_json::to_value(window_state).map_err(StorageError::from)?,
        );
        Ok(self)
    }

    pub fn active_time(mut self, state: &ActiveTimeState) -> Result<Self> {
        self.entries.insert(
            KEY_ACTIVE_TIME.to_string(),
            serde_json::to_value(state).map_err(StorageError::from)?,
        );
        Ok(self)
    }

    pub fn bookmark_state(mut self, state: &BookmarkFolderState) -> Result<Self> {
        self.entries.insert(
            KEY_BOOKMARK_STATE.to_string(),
            serde_json::to_value(state).map_err(StorageError::from)?,
        );
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every collected key in one store call.
    pub async fn commit(self, kv: &dyn KeyValueStore) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        kv.set(self.entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    #[tokio::test]
    async fn commits_all_keys_at_once() {
        let store = MemoryKvStore::new();
        let mut subscriber = store.subscribe().await;

        let tab_meta = HashMap::from([(
            TabId(1),
            TabMeta {
                tab_id: TabId(1),
                window_id: WindowId(1),
                url: "https://a/".to_string(),
                refresh_active_time: 0,
                refresh_wall_time: 0,
                status: TabStatus::Green,
                group_id: None,
                is_special_group: false,
            },
        )]);
        let windows: HashMap<WindowId, WindowState> =
            HashMap::from([(WindowId(1), WindowState::default())]);

        StateBatch::new()
            .tab_meta(&tab_meta)
            .unwrap()
            .window_state(&windows)
            .unwrap()
            .commit(&store)
            .await
            .unwrap();

        let mut keys = vec![
            subscriber.recv().await.unwrap().key,
            subscriber.recv().await.unwrap().key,
        ];
        keys.sort();
        assert_eq!(keys, vec![KEY_TAB_META, KEY_WINDOW_STATE]);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = MemoryKvStore::new();
        StateBatch::new().commit(&store).await.unwrap();
        assert!(store.dump().await.is_empty());
    }
}
