/// End-to-end integration tests: full application wiring over the mock
/// browser, the event pump, the settings watcher, and durable storage.
use browser_connector::mock::MockBrowser;
use data_access::schema::{KEY_SCHEMA_VERSION, KEY_SETTINGS};
use data_access::{KeyValueStore, SqliteKvStore};
use integration::*;
use std::sync::Arc;
use tab_warden_core::*;
use tempfile::TempDir;

fn test_config() -> AppConfig {
    AppConfig {
        database_path: None,
        log_level: "debug".to_string(),
        init_logging: false,
    }
}

fn tab(id: i64, window: i64, url: &str, title: &str) -> TabSnapshot {
    TabSnapshot {
        id: TabId(id),
        window_id: WindowId(window),
        index: 0,
        url: url.to_string(),
        title: title.to_string(),
        pinned: false,
        discarded: false,
        active: false,
        group_id: None,
        opener_tab_id: None,
    }
}

/// Let spawned pump/watcher tasks run until `check` passes or we give up.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::task::yield_now().await;
    }
    false
}

#[tokio::test]
async fn startup_reconciles_live_tabs() {
    let browser = Arc::new(MockBrowser::new());
    browser.seed_window(WindowId(1)).await;
    browser.seed_tab(tab(1, 1, "https://a/", "A")).await;
    browser.seed_tab(tab(2, 1, "https://b/", "B")).await;

    let app = Application::new(test_config(), browser).await.unwrap();
    let snapshot = app.context().engine.tab_meta_snapshot().await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[&TabId(1)].status, TabStatus::Green);
    assert_eq!(snapshot[&TabId(2)].url, "https://b/");
}

#[tokio::test]
async fn event_pump_tracks_created_tabs() {
    let browser = Arc::new(MockBrowser::new());
    browser.seed_window(WindowId(1)).await;
    let app = Application::new(test_config(), browser.clone()).await.unwrap();

    browser.seed_tab(tab(7, 1, "https://new/", "New")).await;
    let snapshot = browser.tab(TabId(7)).await.unwrap();
    app.events()
        .send(BrowserEvent::TabCreated { tab: snapshot })
        .unwrap();

    let engine = app.context().engine.clone();
    let tracked = eventually(|| {
        let engine = engine.clone();
        async move { engine.tab_meta_snapshot().await.contains_key(&TabId(7)) }
    })
    .await;
    assert!(tracked);
}

#[tokio::test]
async fn settings_writes_reach_the_engine() {
    let browser = Arc::new(MockBrowser::new());
    browser.seed_window(WindowId(1)).await;
    let app = Application::new(test_config(), browser).await.unwrap();

    let mut updated = app.context().engine.settings_snapshot().await;
    updated.yellow_group_name = "Stale".to_string();
    app.context().repo.save_settings(&updated).await.unwrap();

    let engine = app.context().engine.clone();
    let adopted = eventually(|| {
        let engine = engine.clone();
        async move { engine.settings_snapshot().await.yellow_group_name == "Stale" }
    })
    .await;
    assert!(adopted);
}

#[tokio::test]
async fn durable_store_carries_schema_and_settings() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("state.db");

    {
        let browser = Arc::new(MockBrowser::new());
        let config = AppConfig {
            database_path: Some(db_path.clone()),
            ..test_config()
        };
        let app = Application::new(config, browser).await.unwrap();
        app.shutdown().await.unwrap();
    }

    // A fresh store handle sees the migrated schema and the settings blob.
    let store = SqliteKvStore::open(&db_path).await.unwrap();
    let stored = store.get(&[KEY_SCHEMA_VERSION, KEY_SETTINGS]).await.unwrap();
    assert_eq!(stored[KEY_SCHEMA_VERSION], serde_json::json!(SCHEMA_VERSION));
    let settings: Settings = serde_json::from_value(stored[KEY_SETTINGS].clone()).unwrap();
    assert!(settings.validate().is_ok());
}

#[tokio::test]
async fn cycle_via_application_closes_gone_tabs() {
    let browser = Arc::new(MockBrowser::new());
    browser.seed_window(WindowId(1)).await;
    browser.seed_tab(tab(1, 1, "https://a/", "A")).await;

    let clock = ManualClock::new(1_700_000_000_000);
    let app = Application::with_clock(test_config(), browser.clone(), clock.clone())
        .await
        .unwrap();

    // Configure tight thresholds on the wall clock, then outlive them.
    let mut settings = app.context().engine.settings_snapshot().await;
    settings.time_mode = TimeMode::Wallclock;
    settings.thresholds = Thresholds {
        green_to_yellow_ms: 1_000,
        yellow_to_red_ms: 2_000,
        red_to_gone_ms: 3_000,
    };
    app.context().repo.save_settings(&settings).await.unwrap();
    let engine = app.context().engine.clone();
    let adopted = eventually(|| {
        let engine = engine.clone();
        async move { engine.settings_snapshot().await.thresholds.red_to_gone_ms == 3_000 }
    })
    .await;
    assert!(adopted);

    clock.advance(5_000);
    app.run_cycle_now().await;

    // The settings watcher may still own the in-flight cycle; wait for
    // the rerun it queued. The registry empties only after the browser
    // removals were issued.
    let engine = app.context().engine.clone();
    let closed = eventually(|| {
        let engine = engine.clone();
        async move { engine.tab_meta_snapshot().await.is_empty() }
    })
    .await;
    assert!(closed);
    assert!(browser.tab(TabId(1)).await.is_none());
}
