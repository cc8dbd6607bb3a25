//! Typed settings blob, validation, and the v1 -> v2 migration
//!
//! The settings UI writes a validated blob into the key-value store; the
//! core only ever reads it back through this model. Migration is additive:
//! fields the stored blob already has are never overwritten, missing
//! fields gain their defaults.

use crate::errors::SettingsError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current settings schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Which clock drives a tab's age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    /// Age counts only milliseconds during which a browser window was focused.
    Active,
    /// Age counts wall-clock milliseconds since the last refresh.
    Wallclock,
}

impl Default for TimeMode {
    fn default() -> Self {
        TimeMode::Active
    }
}

/// The ordered transition thresholds, in milliseconds of age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub green_to_yellow_ms: i64,
    pub yellow_to_red_ms: i64,
    pub red_to_gone_ms: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            green_to_yellow_ms: 3_600_000,       // 1 hour
            yellow_to_red_ms: 28_800_000,        // 8 hours
            red_to_gone_ms: 86_400_000,          // 24 hours
        }
    }
}

impl Thresholds {
    /// Thresholds must be strictly increasing and positive, even while the
    /// corresponding transitions are disabled.
    pub fn is_valid(&self) -> bool {
        self.green_to_yellow_ms > 0
            && self.yellow_to_red_ms > self.green_to_yellow_ms
            && self.red_to_gone_ms > self.yellow_to_red_ms
    }
}

fn default_true() -> bool {
    true
}

fn default_folder_name() -> String {
    "Closed Tabs".to_string()
}

fn default_auto_name_delay() -> u32 {
    5
}

/// The v2 settings blob.
///
/// Every field carries a serde default so that a v1 blob (or a blob from a
/// future additive version) deserializes cleanly; [`migrate_to_v2`] is the
/// canonical upgrade path because it also persists the coalesced result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub time_mode: TimeMode,
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Master switch for the aging machinery (phases 1-5 of a cycle).
    #[serde(default = "default_true")]
    pub aging_enabled: bool,
    /// Moves aged ungrouped tabs into the special groups.
    #[serde(default = "default_true")]
    pub tab_sorting_enabled: bool,
    /// Reorders user groups into zones.
    #[serde(default = "default_true")]
    pub tabgroup_sorting_enabled: bool,
    /// Recolors user groups to match their status.
    #[serde(default = "default_true")]
    pub tabgroup_coloring_enabled: bool,
    /// Appends the freshest member's age to user group titles.
    #[serde(default)]
    pub show_group_age_enabled: bool,

    #[serde(default = "default_true")]
    pub green_to_yellow_enabled: bool,
    #[serde(default = "default_true")]
    pub yellow_to_red_enabled: bool,
    #[serde(default = "default_true")]
    pub red_to_gone_enabled: bool,

    /// Places newly created tabs next to their opener.
    #[serde(default = "default_true")]
    pub auto_group_enabled: bool,
    /// Suggests names for groups left unnamed past the delay.
    #[serde(default = "default_true")]
    pub auto_group_naming_enabled: bool,
    /// Bookmarks gone work before closing it.
    #[serde(default = "default_true")]
    pub bookmark_enabled: bool,

    /// Title of the yellow special group. May be empty.
    #[serde(default)]
    pub yellow_group_name: String,
    /// Title of the red special group. May be empty.
    #[serde(default)]
    pub red_group_name: String,
    /// Folder under "Other Bookmarks" that receives closed work.
    #[serde(default = "default_folder_name")]
    pub bookmark_folder_name: String,
    /// Minutes a group must sit unnamed before auto-naming fires.
    #[serde(default = "default_auto_name_delay")]
    pub auto_name_delay_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        // The serde defaults are authoritative; route through them so the
        // two cannot drift apart.
        serde_json::from_value(Value::Object(serde_json::Map::new()))
            .expect("empty object deserializes via field defaults")
    }
}

impl Settings {
    /// Validate the invariants enforced at every save boundary.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.thresholds.is_valid() {
            return Err(SettingsError::ThresholdOrder {
                green_to_yellow_ms: self.thresholds.green_to_yellow_ms,
                yellow_to_red_ms: self.thresholds.yellow_to_red_ms,
                red_to_gone_ms: self.thresholds.red_to_gone_ms,
            });
        }
        if self.bookmark_folder_name.trim().is_empty() {
            return Err(SettingsError::EmptyFolderName);
        }
        if self.auto_name_delay_minutes == 0 {
            return Err(SettingsError::InvalidAutoNameDelay {
                minutes: self.auto_name_delay_minutes,
            });
        }
        Ok(())
    }

    /// Auto-name delay in milliseconds.
    pub fn auto_name_delay_ms(&self) -> i64 {
        i64::from(self.auto_name_delay_minutes) * 60_000
    }

    /// The configured title for a special-group slot.
    pub fn special_group_name(&self, kind: crate::types::SpecialKind) -> &str {
        match kind {
            crate::types::SpecialKind::Yellow => &self.yellow_group_name,
            crate::types::SpecialKind::Red => &self.red_group_name,
        }
    }
}

/// Overlay `stored` onto `defaults`, keeping every stored value and adding
/// defaults only for absent keys. Nested objects merge recursively.
fn coalesce(defaults: &mut serde_json::Map<String, Value>, stored: &serde_json::Map<String, Value>) {
    for (key, value) in stored {
        match (defaults.get_mut(key), value) {
            (Some(Value::Object(d)), Value::Object(s)) => coalesce(d, s),
            // Stored nulls count as absent (nullish-coalesce semantics).
            (_, Value::Null) => {}
            _ => {
                defaults.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Migrate a stored settings blob of any prior schema version to v2.
///
/// Additive only: existing values survive byte-for-byte, new fields gain
/// their defaults. Applying this to an already-v2 blob is the identity.
/// A non-object blob is treated as wholly absent and yields the defaults.
pub fn migrate_to_v2(stored: &Value) -> Settings {
    let mut merged = match serde_json::to_value(Settings::default()) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    if let Value::Object(stored_map) = stored {
        coalesce(&mut merged, stored_map);
    }
    match serde_json::from_value(Value::Object(merged)) {
        Ok(settings) => settings,
        Err(err) => {
            // Spec: migration failure falls back to defaults for the
            // affected fields; a blob this malformed resets everything.
            tracing::error!(error = %err, "settings migration failed, applying defaults");
            Settings::default()
        }
    }
}
