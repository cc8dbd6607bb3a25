/// Main application module
///
/// Boots the engine and keeps the event loops running: one pump feeding
/// host browser events into the router, one watcher turning key-value
/// settings changes into `SettingsChanged` events.
use crate::{AppConfig, AppContext, UnifiedLogger};
use browser_connector::BrowserApi;
use data_access::schema::KEY_SETTINGS;
use std::sync::Arc;
use tab_warden_core::*;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Main application
pub struct Application {
    context: Arc<AppContext>,
    events: mpsc::UnboundedSender<BrowserEvent>,
}

impl Application {
    /// Create and initialize the application around an injected browser
    /// surface.
    pub async fn new(config: AppConfig, browser: Arc<dyn BrowserApi>) -> Result<Self> {
        Self::with_clock(config, browser, Arc::new(SystemClock)).await
    }

    /// Same as [`Application::new`] with an explicit clock (tests drive a
    /// manual one).
    pub async fn with_clock(
        config: AppConfig,
        browser: Arc<dyn BrowserApi>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.init_logging {
            UnifiedLogger::init_default();
        }

        info!("starting tab lifecycle manager");
        let context = Arc::new(AppContext::new(config, browser, clock).await?);

        context.engine.startup().await?;
        info!("engine startup complete");

        // Pump host events into the router.
        let (events, mut event_rx) = mpsc::unbounded_channel::<BrowserEvent>();
        {
            let engine = context.engine.clone();
            tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    engine.handle_event(event).await;
                }
            });
        }

        // Watch the store for settings writes (our own and the UI's).
        {
            let engine = context.engine.clone();
            let mut changes = context.repo.kv().subscribe().await;
            tokio::spawn(async move {
                while let Some(change) = changes.recv().await {
                    if change.key != KEY_SETTINGS {
                        continue;
                    }
                    let Some(new) = change.new else { continue };
                    let new: Settings = match serde_json::from_value(new) {
                        Ok(settings) => settings,
                        Err(err) => {
                            warn!(error = %err, "ignoring undecodable settings write");
                            continue;
                        }
                    };
                    let old = change
                        .old
                        .and_then(|value| serde_json::from_value::<Settings>(value).ok());
                    engine
                        .handle_event(BrowserEvent::SettingsChanged {
                            old: old.map(Box::new),
                            new: Box::new(new),
                        })
                        .await;
                }
            });
        }

        Ok(Self { context, events })
    }

    /// Sender the host adapter uses to deliver browser events.
    pub fn events(&self) -> mpsc::UnboundedSender<BrowserEvent> {
        self.events.clone()
    }

    /// Run one evaluation cycle immediately (awaits completion).
    pub async fn run_cycle_now(&self) {
        self.context.engine.run_cycle().await;
    }

    /// Shutdown the application, flushing state.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down");
        self.context.engine.persist_now().await;
        Ok(())
    }

    /// Get application context
    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_connector::mock::MockBrowser;

    fn test_config() -> AppConfig {
        AppConfig {
            database_path: None,
            log_level: "debug".to_string(),
            init_logging: false,
        }
    }

    #[tokio::test]
    async fn test_application_creation() {
        let browser = Arc::new(MockBrowser::new());
        let app = Application::new(test_config(), browser).await;
        assert!(app.is_ok());
    }

    #[tokio::test]
    async fn test_application_lifecycle() {
        let browser = Arc::new(MockBrowser::new());
        let app = Application::new(test_config(), browser.clone()).await.unwrap();

        // Startup registered the evaluation alarm.
        assert_eq!(browser.alarm_period().await, Some(lifecycle::ALARM_PERIOD_MS));

        let result = app.shutdown().await;
        assert!(result.is_ok());
    }
}
