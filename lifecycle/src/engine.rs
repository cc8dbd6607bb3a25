//! The lifecycle engine
//!
//! One `LifecycleEngine` exists per host process. It owns the tab and
//! window registries behind a single lock, caches the settings blob,
//! holds the re-entrancy guard for evaluation cycles, and wires the
//! collaborators (browser surface, key-value repository, bookmark
//! writer) together. Event handling lives in `router`, the cycle itself
//! in `cycle`, and settings side effects in `dispatcher`.

use crate::active_time::ActiveTimeClock;
use crate::bookmarks::BookmarkWriter;
use crate::tab_registry::TabRegistry;
use crate::titles::effective_title;
use crate::window_registry::WindowRegistry;
use browser_connector::BrowserApi;
use data_access::{StateBatch, StateRepository};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tab_warden_core::*;
use tokio::sync::Mutex;
use tracing::{error, warn};

/// Default evaluation alarm period.
pub const ALARM_PERIOD_MS: i64 = 30_000;

/// Debounce window for event-driven evaluation requests.
pub const EVAL_DEBOUNCE_MS: u64 = 300;

/// Everything mutable the engine owns, behind one lock. Handlers mutate
/// it in short suspension-free sections; the cycle persists it through
/// the end-of-cycle batch.
pub struct EngineState {
    pub settings: Settings,
    pub tabs: TabRegistry,
    pub windows: WindowRegistry,
    pub active_time: ActiveTimeClock,
    /// Tabs restored from a discard whose next navigation refresh is
    /// suppressed. One-shot per entry.
    pub restored_from_discard: HashSet<TabId>,
}

#[derive(Default)]
struct CycleFlags {
    in_progress: bool,
    pending: bool,
}

pub struct LifecycleEngine {
    pub(crate) browser: Arc<dyn BrowserApi>,
    pub(crate) repo: Arc<StateRepository>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) bookmarks: BookmarkWriter,
    pub(crate) state: Mutex<EngineState>,
    flags: std::sync::Mutex<CycleFlags>,
    debounce_generation: AtomicU64,
    /// Back-reference for the debounce sleeper task.
    weak_self: Weak<LifecycleEngine>,
}

impl LifecycleEngine {
    pub fn new(
        browser: Arc<dyn BrowserApi>,
        repo: Arc<StateRepository>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let bookmarks = BookmarkWriter::new(browser.clone(), repo.clone());
        Arc::new_cyclic(|weak| Self {
            browser,
            repo,
            clock,
            bookmarks,
            state: Mutex::new(EngineState {
                settings: Settings::default(),
                tabs: TabRegistry::new(),
                windows: WindowRegistry::new(),
                active_time: ActiveTimeClock::default(),
                restored_from_discard: HashSet::new(),
            }),
            flags: std::sync::Mutex::new(CycleFlags::default()),
            debounce_generation: AtomicU64::new(0),
            weak_self: weak.clone(),
        })
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Boot sequence: load and migrate settings, reconcile the tab
    /// registry against live tabs, recover the active-time clock,
    /// rediscover special groups, persist the repaired state, and
    /// re-register the evaluation alarm.
    pub async fn startup(&self) -> Result<()> {
        let settings = self.repo.load_settings().await?;
        let stored_tabs = self.repo.load_tab_meta().await.unwrap_or_else(|err| {
            warn!(error = %err, "tab registry unreadable, starting empty");
            HashMap::new()
        });
        let stored_windows = self.repo.load_window_state().await.unwrap_or_else(|err| {
            warn!(error = %err, "window registry unreadable, starting empty");
            HashMap::new()
        });
        let stored_active = self.repo.load_active_time().await.unwrap_or_else(|err| {
            warn!(error = %err, "active time unreadable, starting at zero");
            ActiveTimeState::default()
        });

        let now = self.now();
        let active_time = ActiveTimeClock::recover(stored_active, now);

        let live_tabs = self.browser.query_tabs(None).await?;
        let live_windows = self.browser.query_windows().await?;

        let mut tabs = TabRegistry::from_map(stored_tabs);
        tabs.reconcile(&live_tabs, active_time.current(now), now);

        let mut windows = WindowRegistry::from_map(stored_windows);
        self.rediscover_special_groups(&mut windows, &live_windows, &settings)
            .await;

        // Re-derive special membership flags now that slots are settled.
        let ids: Vec<TabId> = tabs.as_map().keys().copied().collect();
        for tab_id in ids {
            let membership = tabs.get(tab_id).map(|meta| (meta.window_id, meta.group_id));
            let Some((window_id, group_id)) = membership else {
                continue;
            };
            let is_special = group_id
                .map(|g| windows.is_special(window_id, g))
                .unwrap_or(false);
            if let Some(meta) = tabs.get_mut(tab_id) {
                meta.is_special_group = is_special;
            }
        }

        {
            let mut state = self.state.lock().await;
            state.settings = settings;
            state.tabs = tabs;
            state.windows = windows;
            state.active_time = active_time;
            state.restored_from_discard.clear();
            self.flush_registries(&mut state).await;
        }

        if let Err(err) = self.browser.clear_alarm().await {
            warn!(error = %err, "failed to clear stale alarm");
        }
        if let Err(err) = self.browser.schedule_alarm(ALARM_PERIOD_MS).await {
            warn!(error = %err, "failed to schedule evaluation alarm");
        }
        Ok(())
    }

    /// Validate stored special-group slots against live groups; a missing
    /// group is rediscovered by title and color, otherwise the slot is
    /// cleared. Window entries for closed windows are dropped.
    async fn rediscover_special_groups(
        &self,
        windows: &mut WindowRegistry,
        live_windows: &[WindowId],
        settings: &Settings,
    ) {
        let known: Vec<WindowId> = windows.as_map().keys().copied().collect();
        for window in known {
            if !live_windows.contains(&window) {
                windows.remove_window(window);
            }
        }

        for &window in live_windows {
            let live_groups = match self.browser.query_groups(window).await {
                Ok(groups) => groups,
                Err(err) => {
                    warn!(window = %window, error = %err, "failed to list groups");
                    continue;
                }
            };
            for kind in [SpecialKind::Yellow, SpecialKind::Red] {
                let slot = windows.special(window, kind);
                let still_live = slot
                    .map(|gid| live_groups.iter().any(|g| g.id == gid))
                    .unwrap_or(false);
                if still_live {
                    continue;
                }
                let configured = settings.special_group_name(kind);
                let rediscovered = live_groups.iter().find(|g| {
                    g.color == kind.color() && effective_title(&g.title) == configured.trim()
                });
                if slot.is_some() || rediscovered.is_some() {
                    windows.set_special(window, kind, rediscovered.map(|g| g.id));
                }
            }
        }
    }

    /// Request an evaluation cycle.
    ///
    /// Event-driven requests are debounced; a burst of moves collapses
    /// into one cycle. Alarm- and dispatcher-driven requests run (and are
    /// awaited) immediately, serialized behind any in-flight cycle by the
    /// re-entrancy guard.
    pub async fn request_eval(&self, debounced: bool) {
        if !debounced {
            self.run_cycle().await;
            return;
        }
        let generation = self.debounce_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(engine) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(EVAL_DEBOUNCE_MS)).await;
            if engine.debounce_generation.load(Ordering::SeqCst) == generation {
                engine.run_cycle().await;
            }
        });
    }

    /// Run an evaluation cycle to completion under the re-entrancy
    /// guard: at most one cycle in flight, at most one queued.
    pub async fn run_cycle(&self) {
        {
            let mut flags = self.flags.lock().expect("cycle flags poisoned");
            if flags.in_progress {
                flags.pending = true;
                return;
            }
            flags.in_progress = true;
        }
        loop {
            if let Err(err) = self.run_cycle_inner().await {
                error!(error = %err, "evaluation cycle aborted");
            }
            let run_again = {
                let mut flags = self.flags.lock().expect("cycle flags poisoned");
                if flags.pending {
                    flags.pending = false;
                    true
                } else {
                    flags.in_progress = false;
                    false
                }
            };
            if !run_again {
                break;
            }
        }
    }

    /// Persist both registries and the active-time snapshot in one batch.
    /// Store failures are logged; in-memory state stays authoritative and
    /// the next cycle retries.
    pub(crate) async fn flush_registries(&self, state: &mut EngineState) {
        let now = self.now();
        let snapshot = state.active_time.snapshot(now);
        let batch = StateBatch::new()
            .tab_meta(state.tabs.as_map())
            .and_then(|b| b.window_state(state.windows.as_map()))
            .and_then(|b| b.active_time(&snapshot));
        match batch {
            Ok(batch) => {
                if let Err(err) = batch.commit(self.repo.kv().as_ref()).await {
                    warn!(error = %err, "state flush failed, retrying next cycle");
                }
            }
            Err(err) => warn!(error = %err, "state snapshot failed to serialize"),
        }
    }

    /// Persist registries and active time outside a cycle (shutdown).
    pub async fn persist_now(&self) {
        let mut state = self.state.lock().await;
        self.flush_registries(&mut state).await;
    }

    // --- snapshots for tests and diagnostics ---

    pub async fn tab_meta_snapshot(&self) -> HashMap<TabId, TabMeta> {
        self.state.lock().await.tabs.as_map().clone()
    }

    pub async fn window_state_snapshot(&self) -> HashMap<WindowId, WindowState> {
        self.state.lock().await.windows.as_map().clone()
    }

    pub async fn settings_snapshot(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    pub async fn active_time_now(&self) -> i64 {
        let state = self.state.lock().await;
        state.active_time.current(self.now())
    }
}
