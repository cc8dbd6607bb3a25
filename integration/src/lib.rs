//! Application wiring for the tab lifecycle manager
//!
//! Chooses the storage backend, boots the engine, and pumps host events
//! into the router. The browser surface itself is injected; production
//! builds hand in the real adapter, tests the mock.

use browser_connector::BrowserApi;
use data_access::{KeyValueStore, MemoryKvStore, SqliteKvStore, StateRepository};
use lifecycle::LifecycleEngine;
use std::sync::Arc;
use tab_warden_core::*;

pub mod application;
pub mod error_handler;
pub mod logger;

pub use application::Application;
pub use error_handler::{ErrorReporter, ErrorSeverity, ErrorStatistics};
pub use logger::{LoggerConfig, UnifiedLogger};

/// Application configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AppConfig {
    /// Key-value database path; `None` keeps state in memory.
    pub database_path: Option<std::path::PathBuf>,

    /// Log level
    pub log_level: String,

    /// Initialize the global logger on startup.
    pub init_logging: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: "info".to_string(),
            init_logging: true,
        }
    }
}

/// Application context that holds all initialized components
pub struct AppContext {
    /// The scheduler core.
    pub engine: Arc<LifecycleEngine>,

    /// Typed state repository over the key-value store.
    pub repo: Arc<StateRepository>,

    /// The injected browser surface.
    pub browser: Arc<dyn BrowserApi>,

    /// Centralized error reporting.
    pub error_reporter: Arc<ErrorReporter>,

    /// Application configuration.
    pub config: AppConfig,
}

impl AppContext {
    /// Create the context: storage, repository, engine.
    pub async fn new(
        config: AppConfig,
        browser: Arc<dyn BrowserApi>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let kv: Arc<dyn KeyValueStore> = match &config.database_path {
            Some(path) => Arc::new(SqliteKvStore::open(path).await?),
            None => Arc::new(MemoryKvStore::new()),
        };
        let repo = Arc::new(StateRepository::new(kv));
        let engine = LifecycleEngine::new(browser.clone(), repo.clone(), clock);
        let error_reporter = Arc::new(ErrorReporter::new());

        Ok(Self {
            engine,
            repo,
            browser,
            error_reporter,
            config,
        })
    }
}
