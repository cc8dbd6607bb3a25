/// Centralized error reporting
///
/// Classifies failures by severity (browser races are routine, storage
/// trouble is not), logs them accordingly, and keeps a bounded ring of
/// recent entries for diagnostics.
use std::sync::Arc;
use tab_warden_core::TabWardenError;
use tokio::sync::RwLock;
use tracing::{error, warn};

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that affects functionality
    Error,
    /// Expected race or recoverable failure
    Warning,
}

/// Error entry for tracking
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub error: String,
    pub severity: ErrorSeverity,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub context: String,
}

/// Centralized error reporter
pub struct ErrorReporter {
    /// Recent errors for diagnostics
    recent_errors: Arc<RwLock<Vec<ErrorEntry>>>,
    /// Maximum number of errors to keep
    max_errors: usize,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            recent_errors: Arc::new(RwLock::new(Vec::new())),
            max_errors: 100,
        }
    }

    /// Classify, log, and record an error.
    pub async fn report(&self, error: &TabWardenError, context: &str) {
        let severity = Self::classify(error);
        match severity {
            ErrorSeverity::Error => error!("{context}: {error}"),
            ErrorSeverity::Warning => warn!("{context}: {error}"),
        }

        let entry = ErrorEntry {
            error: error.to_string(),
            severity,
            timestamp: chrono::Utc::now(),
            context: context.to_string(),
        };
        self.record(entry).await;
    }

    fn classify(error: &TabWardenError) -> ErrorSeverity {
        match error {
            // Entity-vanished races and bookmark trouble are routine.
            TabWardenError::Browser { .. } => ErrorSeverity::Warning,
            TabWardenError::Bookmark { .. } => ErrorSeverity::Warning,
            TabWardenError::Storage { .. } => ErrorSeverity::Error,
            TabWardenError::Settings { .. } => ErrorSeverity::Error,
        }
    }

    async fn record(&self, entry: ErrorEntry) {
        let mut errors = self.recent_errors.write().await;
        errors.push(entry);
        if errors.len() > self.max_errors {
            let excess = errors.len() - self.max_errors;
            errors.drain(0..excess);
        }
    }

    /// Get recent errors
    pub async fn recent(&self) -> Vec<ErrorEntry> {
        self.recent_errors.read().await.clone()
    }

    /// Get error statistics
    pub async fn stats(&self) -> ErrorStatistics {
        let errors = self.recent_errors.read().await;
        let mut stats = ErrorStatistics {
            total: errors.len(),
            errors: 0,
            warnings: 0,
        };
        for entry in errors.iter() {
            match entry.severity {
                ErrorSeverity::Error => stats.errors += 1,
                ErrorSeverity::Warning => stats.warnings += 1,
            }
        }
        stats
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate counts over the recent-error ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorStatistics {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tab_warden_core::BrowserError;

    #[tokio::test]
    async fn not_found_is_a_warning() {
        let reporter = ErrorReporter::new();
        let err = TabWardenError::Browser {
            source: BrowserError::NotFound {
                entity: "tab",
                id: 3,
            },
        };
        reporter.report(&err, "phase 2").await;

        let stats = reporter.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn ring_is_bounded() {
        let reporter = ErrorReporter::new();
        for i in 0..150 {
            let err = TabWardenError::Browser {
                source: BrowserError::NotFound {
                    entity: "tab",
                    id: i,
                },
            };
            reporter.report(&err, "loop").await;
        }
        assert_eq!(reporter.stats().await.total, 100);
    }
}
