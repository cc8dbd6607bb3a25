//! Persisted key names and the SQLite schema

/// Settings schema version marker.
pub const KEY_SCHEMA_VERSION: &str = "schema_version";
/// The settings blob (see `tab_warden_core::Settings`).
pub const KEY_SETTINGS: &str = "settings";
/// Map of tab id to `TabMeta`.
pub const KEY_TAB_META: &str = "tab_meta";
/// Map of window id to `WindowState`.
pub const KEY_WINDOW_STATE: &str = "window_state";
/// `ActiveTimeState` of the focus-time accumulator.
pub const KEY_ACTIVE_TIME: &str = "active_time";
/// `BookmarkFolderState` of the bookmark writer.
pub const KEY_BOOKMARK_STATE: &str = "bookmark_state";

/// SQL schema for the SQLite-backed key-value store
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
