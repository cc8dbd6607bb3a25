use thiserror::Error;

/// Browser surface errors.
///
/// `NotFound` is an expected race: the user (or the browser itself) removed
/// the entity between our read and our write. Phase logic skips the item
/// and continues; anything else is a transport-level failure.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("bookmark node not found: {id}")]
    BookmarkNotFound { id: String },

    #[error("browser call failed: {details}")]
    Backend { details: String },
}

impl BrowserError {
    /// Whether this failure is the expected entity-vanished race.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BrowserError::NotFound { .. } | BrowserError::BookmarkNotFound { .. }
        )
    }
}

/// Key-value store errors. The core logs these and keeps its in-memory
/// state authoritative; the next cycle's batch write retries.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failure: {details}")]
    Backend { details: String },

    #[error("stored value for {key} failed to decode: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

/// Settings validation errors, rejected at the save boundary.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(
        "thresholds must be strictly increasing: {green_to_yellow_ms} / {yellow_to_red_ms} / {red_to_gone_ms}"
    )]
    ThresholdOrder {
        green_to_yellow_ms: i64,
        yellow_to_red_ms: i64,
        red_to_gone_ms: i64,
    },

    #[error("bookmark folder name must not be empty")]
    EmptyFolderName,

    #[error("auto-name delay must be positive, got {minutes}")]
    InvalidAutoNameDelay { minutes: u32 },
}

/// Bookmark writer errors. Never block the corresponding tab close.
#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("bookmark folder unavailable: {details}")]
    FolderUnavailable { details: String },

    #[error("bookmark write failed: {source}")]
    Write {
        #[from]
        source: BrowserError,
    },
}

/// Main error type for the tab lifecycle manager.
#[derive(Debug, Error)]
pub enum TabWardenError {
    #[error("browser error: {source}")]
    Browser {
        #[from]
        source: BrowserError,
    },

    #[error("storage error: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },

    #[error("settings error: {source}")]
    Settings {
        #[from]
        source: SettingsError,
    },

    #[error("bookmark error: {source}")]
    Bookmark {
        #[from]
        source: BookmarkError,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TabWardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguished() {
        let err = BrowserError::NotFound {
            entity: "tab",
            id: 12,
        };
        assert!(err.is_not_found());
        let err = BrowserError::Backend {
            details: "socket closed".into(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn errors_convert_into_top_level() {
        fn takes_result(r: Result<()>) -> bool {
            r.is_err()
        }
        let inner: std::result::Result<(), BrowserError> = Err(BrowserError::Backend {
            details: "x".into(),
        });
        assert!(takes_result(inner.map_err(Into::into)));
    }
}
