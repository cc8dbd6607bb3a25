//! Typed repository over the key-value store
//!
//! The only code that knows key names and blob shapes. Loads are lenient:
//! a missing or undecodable blob yields the type's default (the next batch
//! write repairs the stored copy). Saves of settings validate first; the
//! registries are written through [`crate::batch::StateBatch`] at the end
//! of each evaluation cycle.

use crate::kv::KeyValueStore;
use crate::schema::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tab_warden_core::*;
use tracing::{error, warn};

/// Typed access to every persisted entity.
pub struct StateRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl StateRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// The underlying store, for subscription wiring and batch commits.
    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    fn decode_or_default<T>(&self, key: &str, blob: Option<Value>) -> T
    where
        T: DeserializeOwned + Default,
    {
        match blob {
            Some(value) => match serde_json::from_value(value) {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!(key, error = %err, "stored blob failed to decode, using default");
                    T::default()
                }
            },
            None => T::default(),
        }
    }

    async fn load_value(&self, key: &str) -> Result<Option<Value>> {
        let mut got = self.kv.get(&[key]).await?;
        Ok(got.remove(key))
    }

    async fn store_value(&self, key: &str, value: Value) -> Result<()> {
        self.kv
            .set(HashMap::from([(key.to_string(), value)]))
            .await
    }

    // --- settings ---

    /// Load settings, migrating a v1 blob in place.
    ///
    /// A fresh install persists the defaults and the current schema
    /// version. A blob stored under `schema_version < 2` runs through the
    /// additive migration and the upgraded copy is written back.
    pub async fn load_settings(&self) -> Result<Settings> {
        let mut got = self.kv.get(&[KEY_SCHEMA_VERSION, KEY_SETTINGS]).await?;
        let version = got
            .get(KEY_SCHEMA_VERSION)
            .and_then(Value::as_u64)
            .map(|v| v as u32);
        let blob = got.remove(KEY_SETTINGS);

        let settings = match (version, blob) {
            (Some(v), Some(blob)) if v >= SCHEMA_VERSION => match serde_json::from_value(blob) {
                Ok(settings) => return Ok(settings),
                Err(err) => {
                    error!(error = %err, "v{v} settings blob undecodable, resetting to defaults");
                    Settings::default()
                }
            },
            (_, Some(blob)) => migrate_to_v2(&blob),
            (_, None) => Settings::default(),
        };

        self.persist_settings(&settings).await?;
        Ok(settings)
    }

    /// Validate and persist a settings blob.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        self.persist_settings(settings).await
    }

    async fn persist_settings(&self, settings: &Settings) -> Result<()> {
        let blob = serde_json::to_value(settings).map_err(StorageError::from)?;
        self.kv
            .set(HashMap::from([
                (KEY_SETTINGS.to_string(), blob),
                (KEY_SCHEMA_VERSION.to_string(), Value::from(SCHEMA_VERSION)),
            ]))
            .await
    }

    // --- registries ---

    pub async fn load_tab_meta(&self) -> Result<HashMap<TabId, TabMeta>> {
        let blob = self.load_value(KEY_TAB_META).await?;
        Ok(self.decode_or_default(KEY_TAB_META, blob))
    }

    pub async fn save_tab_meta(&self, tab_meta: &HashMap<TabId, TabMeta>) -> Result<()> {
        let blob = serde_json::to_value(tab_meta).map_err(StorageError::from)?;
        self.store_value(KEY_TAB_META, blob).await
    }

    pub async fn load_window_state(&self) -> Result<HashMap<WindowId, WindowState>> {
        let blob = self.load_value(KEY_WINDOW_STATE).await?;
        Ok(self.decode_or_default(KEY_WINDOW_STATE, blob))
    }

    pub async fn save_window_state(
        &self,
        window_state: &HashMap<WindowId, WindowState>,
    ) -> Result<()> {
        let blob = serde_json::to_value(window_state).map_err(StorageError::from)?;
        self.store_value(KEY_WINDOW_STATE, blob).await
    }

    // --- accumulator & bookmark state ---

    pub async fn load_active_time(&self) -> Result<ActiveTimeState> {
        let blob = self.load_value(KEY_ACTIVE_TIME).await?;
        Ok(self.decode_or_default(KEY_ACTIVE_TIME, blob))
    }

    pub async fn save_active_time(&self, state: &ActiveTimeState) -> Result<()> {
        let blob = serde_json::to_value(state).map_err(StorageError::from)?;
        self.store_value(KEY_ACTIVE_TIME, blob).await
    }

    pub async fn load_bookmark_state(&self) -> Result<BookmarkFolderState> {
        let blob = self.load_value(KEY_BOOKMARK_STATE).await?;
        Ok(self.decode_or_default(KEY_BOOKMARK_STATE, blob))
    }

    pub async fn save_bookmark_state(&self, state: &BookmarkFolderState) -> Result<()> {
        let blob = serde_json::to_value(state).map_err(StorageError::from)?;
        self.store_value(KEY_BOOKMARK_STATE, blob).await
    }
}
