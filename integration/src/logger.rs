/// Unified logger for centralized logging configuration
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Include thread IDs
    pub include_thread_ids: bool,

    /// Include target module paths
    pub include_targets: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            include_thread_ids: false,
            include_targets: true,
        }
    }
}

/// Unified logger
pub struct UnifiedLogger;

impl UnifiedLogger {
    /// Initialize the global logger. Safe to call more than once; only
    /// the first call wins.
    pub fn init(config: LoggerConfig) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let console_layer = fmt::layer()
            .with_target(config.include_targets)
            .with_thread_ids(config.include_thread_ids)
            .with_ansi(true);

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(console_layer);

        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::info!("logging initialized");
        }
    }

    /// Initialize with default configuration
    pub fn init_default() {
        Self::init(LoggerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_config_default() {
        let config = LoggerConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.include_targets);
    }

    #[test]
    fn repeated_init_is_harmless() {
        UnifiedLogger::init_default();
        UnifiedLogger::init_default();
    }
}
