// End-to-end scheduler scenarios against the mock browser: the aging
// ladder with bookmark-then-close, the age cap, navigation refreshes,
// discard-restore suppression, zone sorting, placement policy, naming,
// and the reactive settings side effects.

use browser_connector::mock::{BrowserOp, MockBrowser};
use browser_connector::BrowserApi;
use data_access::{MemoryKvStore, StateRepository};
use lifecycle::{LifecycleEngine, ALARM_PERIOD_MS};
use std::collections::HashMap;
use std::sync::Arc;
use tab_warden_core::*;

/// Fixed wall-clock origin for every scenario.
const BASE_MS: i64 = 1_700_000_000_000;

fn scenario_settings() -> Settings {
    let mut settings = Settings::default();
    settings.time_mode = TimeMode::Wallclock;
    settings.thresholds = Thresholds {
        green_to_yellow_ms: 2_000,
        yellow_to_red_ms: 4_000,
        red_to_gone_ms: 6_000,
    };
    settings.auto_group_enabled = false;
    settings.auto_group_naming_enabled = false;
    settings.show_group_age_enabled = false;
    settings
}

struct Harness {
    browser: Arc<MockBrowser>,
    repo: Arc<StateRepository>,
    clock: Arc<ManualClock>,
    engine: Arc<LifecycleEngine>,
}

impl Harness {
    async fn new(settings: Settings) -> Self {
        let browser = Arc::new(MockBrowser::new());
        browser.seed_window(WindowId(1)).await;
        let repo = Arc::new(StateRepository::new(Arc::new(MemoryKvStore::new())));
        repo.save_settings(&settings).await.unwrap();
        let clock = ManualClock::new(BASE_MS);
        let engine = LifecycleEngine::new(browser.clone(), repo.clone(), clock.clone());
        Self {
            browser,
            repo,
            clock,
            engine,
        }
    }

    async fn boot(&self) {
        self.engine.startup().await.unwrap();
        self.browser.clear_ops().await;
    }

    async fn seed_tab(&self, id: i64, url: &str, title: &str, group: Option<GroupId>) {
        self.browser
            .seed_tab(TabSnapshot {
                id: TabId(id),
                window_id: WindowId(1),
                index: 0,
                url: url.to_string(),
                title: title.to_string(),
                pinned: false,
                discarded: false,
                active: false,
                group_id: group,
                opener_tab_id: None,
            })
            .await;
    }

    async fn seed_group(&self, id: i64, title: &str, color: GroupColor) {
        self.browser
            .seed_group(GroupSnapshot {
                id: GroupId(id),
                window_id: WindowId(1),
                title: title.to_string(),
                color,
                collapsed: false,
            })
            .await;
    }

    async fn special(&self, kind: SpecialKind) -> Option<GroupId> {
        self.engine
            .window_state_snapshot()
            .await
            .get(&WindowId(1))
            .and_then(|w| w.special_groups.get(kind))
    }

    async fn meta(&self, id: i64) -> Option<TabMeta> {
        self.engine.tab_meta_snapshot().await.get(&TabId(id)).cloned()
    }

    /// Index of the first op matching the predicate.
    async fn op_position(&self, pred: impl Fn(&BrowserOp) -> bool) -> Option<usize> {
        self.browser.ops().await.iter().position(pred)
    }
}

// --- S1: green -> yellow -> red -> gone with bookmark (active mode) ---

#[tokio::test]
async fn tab_walks_the_aging_ladder_and_is_bookmarked_on_close() {
    let mut settings = scenario_settings();
    settings.time_mode = TimeMode::Active;
    let h = Harness::new(settings).await;
    h.seed_tab(1, "https://example.com", "Example", None).await;
    h.boot().await;
    h.engine
        .handle_event(BrowserEvent::WindowFocusChanged {
            window_id: Some(WindowId(1)),
        })
        .await;

    // 2 500 ms of focused time: yellow, moved into the yellow special group.
    h.clock.advance(2_500);
    h.engine.run_cycle().await;
    let meta = h.meta(1).await.unwrap();
    assert_eq!(meta.status, TabStatus::Yellow);
    assert!(meta.is_special_group);
    let yellow = h.special(SpecialKind::Yellow).await.unwrap();
    assert_eq!(meta.group_id, Some(yellow));
    let group = h.browser.group(yellow).await.unwrap();
    assert_eq!(group.color, GroupColor::Yellow);
    assert_eq!(group.title, "");

    // 4 500 ms: red, moved to the red special group, yellow slot cleaned.
    h.clock.advance(2_000);
    h.engine.run_cycle().await;
    let meta = h.meta(1).await.unwrap();
    assert_eq!(meta.status, TabStatus::Red);
    let red = h.special(SpecialKind::Red).await.unwrap();
    assert_eq!(meta.group_id, Some(red));
    assert_eq!(h.special(SpecialKind::Yellow).await, None);
    assert_eq!(h.browser.group(red).await.unwrap().color, GroupColor::Red);

    // 7 000 ms: gone. Bookmark lands at the folder root, then the tab
    // closes; the record is dropped.
    h.clock.advance(2_500);
    h.engine.run_cycle().await;
    assert!(h.meta(1).await.is_none());
    assert!(h.browser.tab(TabId(1)).await.is_none());
    assert_eq!(h.special(SpecialKind::Red).await, None);

    let root = h.browser.other_bookmarks_root().await.unwrap();
    let folder = h.browser.bookmark_by_title(&root, "Closed Tabs").await.unwrap();
    let children = h.browser.bookmark_children(&folder.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].title, "Example");
    assert_eq!(children[0].url.as_deref(), Some("https://example.com"));

    // Bookmark-then-close ordering.
    let bookmark_at = h
        .op_position(|op| {
            matches!(op, BrowserOp::CreatedBookmark { url: Some(url), .. } if url == "https://example.com")
        })
        .await
        .expect("bookmark op");
    let remove_at = h
        .op_position(|op| matches!(op, BrowserOp::RemovedTab { tab } if *tab == TabId(1)))
        .await
        .expect("remove op");
    assert!(bookmark_at < remove_at);
}

// --- S2: a whole user group ages to gone ---

#[tokio::test]
async fn user_group_goes_gone_into_a_subfolder() {
    let h = Harness::new(scenario_settings()).await;
    h.seed_group(10, "Work", GroupColor::Grey).await;
    h.seed_tab(1, "https://a/", "A", Some(GroupId(10))).await;
    h.seed_tab(2, "https://b/", "B", Some(GroupId(10))).await;
    h.boot().await;

    h.clock.advance(7_000);
    h.engine.run_cycle().await;

    assert!(h.engine.tab_meta_snapshot().await.is_empty());
    assert!(h.browser.tab(TabId(1)).await.is_none());
    assert!(h.browser.tab(TabId(2)).await.is_none());

    let root = h.browser.other_bookmarks_root().await.unwrap();
    let folder = h.browser.bookmark_by_title(&root, "Closed Tabs").await.unwrap();
    let sub = h.browser.bookmark_by_title(&folder.id, "Work").await.unwrap();
    let mut urls: Vec<String> = h
        .browser
        .bookmark_children(&sub.id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|node| node.url)
        .collect();
    urls.sort();
    assert_eq!(urls, vec!["https://a/", "https://b/"]);
}

// --- S3: age cap on aging resume ---

#[tokio::test]
async fn age_cap_applies_on_aging_resume() {
    let mut settings = scenario_settings();
    settings.aging_enabled = false;
    settings.thresholds.red_to_gone_ms = 60_000;
    settings.red_to_gone_enabled = false;
    let h = Harness::new(settings.clone()).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    // Half a million ms pass with aging off.
    h.clock.advance(500_000);
    let mut enabled = settings.clone();
    enabled.aging_enabled = true;
    h.engine
        .handle_event(BrowserEvent::SettingsChanged {
            old: Some(Box::new(settings)),
            new: Box::new(enabled),
        })
        .await;

    // The cap clamps the observable age to red_to_gone + 60 000 exactly.
    let now = BASE_MS + 500_000;
    let meta = h.meta(1).await.unwrap();
    assert_eq!(now - meta.refresh_wall_time, 120_000);
    // Capped at red: the gone transition is disabled, the tab survives.
    assert_eq!(meta.status, TabStatus::Red);
    assert!(h.browser.tab(TabId(1)).await.is_some());

    // One alarm later: still red, still open.
    h.clock.advance(ALARM_PERIOD_MS);
    h.engine.run_cycle().await;
    let meta = h.meta(1).await.unwrap();
    assert_eq!(meta.status, TabStatus::Red);
    assert!(h.browser.tab(TabId(1)).await.is_some());
}

// --- S4: navigation resets and ungroups ---

#[tokio::test]
async fn navigation_refreshes_and_leaves_special_group() {
    let h = Harness::new(scenario_settings()).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    h.clock.advance(2_500);
    h.engine.run_cycle().await;
    let yellow = h.special(SpecialKind::Yellow).await.unwrap();
    assert_eq!(h.meta(1).await.unwrap().group_id, Some(yellow));

    h.engine
        .handle_event(BrowserEvent::NavigationCommitted { tab_id: TabId(1) })
        .await;

    let meta = h.meta(1).await.unwrap();
    assert_eq!(meta.status, TabStatus::Green);
    assert_eq!(meta.refresh_wall_time, BASE_MS + 2_500);
    assert_eq!(meta.group_id, None);
    // The emptied yellow group's slot is cleared.
    assert_eq!(h.special(SpecialKind::Yellow).await, None);
    assert!(h.browser.tab(TabId(1)).await.unwrap().group_id.is_none());
}

// --- S5: discard restore suppresses exactly one refresh ---

#[tokio::test]
async fn discard_restore_suppresses_the_next_refresh() {
    let h = Harness::new(scenario_settings()).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    h.clock.advance(2_500);
    h.engine.run_cycle().await;
    let yellow = h.special(SpecialKind::Yellow).await.unwrap();

    // The browser discards and auto-restores the tab, then commits the
    // restoring navigation.
    h.engine
        .handle_event(BrowserEvent::TabDiscardChanged {
            tab_id: TabId(1),
            discarded: true,
        })
        .await;
    h.engine
        .handle_event(BrowserEvent::TabDiscardChanged {
            tab_id: TabId(1),
            discarded: false,
        })
        .await;
    h.engine
        .handle_event(BrowserEvent::NavigationCommitted { tab_id: TabId(1) })
        .await;

    let meta = h.meta(1).await.unwrap();
    assert_eq!(meta.refresh_wall_time, BASE_MS);
    assert_eq!(meta.status, TabStatus::Yellow);
    assert_eq!(meta.group_id, Some(yellow));

    // The suppression is one-shot: a second navigation refreshes.
    h.engine
        .handle_event(BrowserEvent::NavigationCommitted { tab_id: TabId(1) })
        .await;
    let meta = h.meta(1).await.unwrap();
    assert_eq!(meta.status, TabStatus::Green);
    assert_eq!(meta.refresh_wall_time, BASE_MS + 2_500);
}

// --- S6: zone sort with intra-zone stability ---

#[tokio::test]
async fn zone_sort_keeps_incumbents_and_appends_arrivals() {
    let h = Harness::new(scenario_settings()).await;
    h.seed_group(21, "A", GroupColor::Grey).await;
    h.seed_group(22, "B", GroupColor::Grey).await;
    h.seed_group(23, "C", GroupColor::Grey).await;
    h.seed_tab(1, "https://a/", "A", Some(GroupId(21))).await;
    h.seed_tab(2, "https://b/", "B", Some(GroupId(22))).await;
    h.seed_tab(3, "https://c/", "C", Some(GroupId(23))).await;
    // Stagger ages: A fresh, B 1 500 ms old, C 2 500 ms old (yellow).
    let mut stored = HashMap::new();
    for (id, refresh) in [(1, BASE_MS), (2, BASE_MS - 1_500), (3, BASE_MS - 2_500)] {
        stored.insert(
            TabId(id),
            TabMeta {
                tab_id: TabId(id),
                window_id: WindowId(1),
                url: format!("https://{}/", ["a", "b", "c"][(id - 1) as usize]),
                refresh_active_time: 0,
                refresh_wall_time: refresh,
                status: TabStatus::Green,
                group_id: None,
                is_special_group: false,
            },
        );
    }
    h.repo.save_tab_meta(&stored).await.unwrap();
    h.boot().await;

    // First cycle records zones: A, B green; C yellow. Order unchanged.
    h.engine.run_cycle().await;
    assert_eq!(
        h.browser.group_order_of(WindowId(1)).await,
        vec![GroupId(21), GroupId(22), GroupId(23)]
    );

    // B crosses into yellow: it appends at the yellow zone's right edge,
    // the incumbent C keeps its position.
    h.clock.advance(1_000);
    h.engine.run_cycle().await;
    assert_eq!(
        h.browser.group_order_of(WindowId(1)).await,
        vec![GroupId(21), GroupId(23), GroupId(22)]
    );

    // Zone ordering invariant: green zone strictly before yellow.
    let zones = h
        .engine
        .window_state_snapshot()
        .await
        .get(&WindowId(1))
        .unwrap()
        .group_zones
        .clone();
    assert_eq!(zones.get(&GroupId(21)), Some(&Zone::Green));
    assert_eq!(zones.get(&GroupId(22)), Some(&Zone::Yellow));
    assert_eq!(zones.get(&GroupId(23)), Some(&Zone::Yellow));
}

// --- group coloring ---

#[tokio::test]
async fn groups_are_colored_by_freshest_member() {
    let h = Harness::new(scenario_settings()).await;
    h.seed_group(30, "Mixed", GroupColor::Grey).await;
    h.seed_tab(1, "https://old/", "Old", Some(GroupId(30))).await;
    h.seed_tab(2, "https://new/", "New", Some(GroupId(30))).await;
    h.boot().await;

    // Make tab 1 red-aged while tab 2 stays green via a refresh.
    h.clock.advance(4_500);
    h.engine
        .handle_event(BrowserEvent::NavigationCommitted { tab_id: TabId(2) })
        .await;
    h.engine.run_cycle().await;

    // Freshest member is green, so the group is green.
    assert_eq!(
        h.browser.group(GroupId(30)).await.unwrap().color,
        GroupColor::Green
    );
    // Members of user groups never migrate to special groups.
    assert_eq!(h.special(SpecialKind::Red).await, None);
}

// --- idempotence: a second cycle repeats nothing ---

#[tokio::test]
async fn second_cycle_issues_no_mutations() {
    let h = Harness::new(scenario_settings()).await;
    h.seed_group(10, "Work", GroupColor::Grey).await;
    h.seed_tab(1, "https://a/", "A", Some(GroupId(10))).await;
    h.seed_tab(2, "https://b/", "B", None).await;
    h.boot().await;

    h.clock.advance(7_000);
    h.engine.run_cycle().await;
    h.browser.clear_ops().await;

    h.engine.run_cycle().await;
    assert!(h.browser.ops().await.is_empty());
}

// --- bookmark toggle off still closes ---

#[tokio::test]
async fn bookmark_disabled_closes_without_bookmarks() {
    let mut settings = scenario_settings();
    settings.bookmark_enabled = false;
    let h = Harness::new(settings).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    h.clock.advance(7_000);
    h.engine.run_cycle().await;

    assert!(h.browser.tab(TabId(1)).await.is_none());
    assert_eq!(
        h.op_position(|op| matches!(op, BrowserOp::CreatedBookmark { .. }))
            .await,
        None
    );
}

#[tokio::test]
async fn unbookmarkable_urls_are_closed_but_not_bookmarked() {
    let h = Harness::new(scenario_settings()).await;
    h.seed_tab(1, "about:blank", "blank", None).await;
    h.boot().await;

    h.clock.advance(7_000);
    h.engine.run_cycle().await;

    assert!(h.browser.tab(TabId(1)).await.is_none());
    assert_eq!(
        h.op_position(
            |op| matches!(op, BrowserOp::CreatedBookmark { url: Some(_), .. })
        )
        .await,
        None
    );
}

// --- placement policy ---

#[tokio::test]
async fn new_tab_joins_openers_named_group() {
    let mut settings = scenario_settings();
    settings.auto_group_enabled = true;
    let h = Harness::new(settings).await;
    h.seed_group(30, "Docs", GroupColor::Blue).await;
    h.seed_tab(1, "https://docs/", "Docs home", Some(GroupId(30))).await;
    h.boot().await;

    h.seed_tab(2, "https://docs/page", "Page", None).await;
    let mut created = h.browser.tab(TabId(2)).await.unwrap();
    created.opener_tab_id = Some(TabId(1));
    h.engine
        .handle_event(BrowserEvent::TabCreated { tab: created })
        .await;

    assert_eq!(h.browser.tab(TabId(2)).await.unwrap().group_id, Some(GroupId(30)));
}

#[tokio::test]
async fn new_tab_pairs_with_ungrouped_opener() {
    let mut settings = scenario_settings();
    settings.auto_group_enabled = true;
    let h = Harness::new(settings).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    h.seed_tab(2, "https://a/child", "Child", None).await;
    let mut created = h.browser.tab(TabId(2)).await.unwrap();
    created.opener_tab_id = Some(TabId(1));
    h.engine
        .handle_event(BrowserEvent::TabCreated { tab: created })
        .await;

    let opener_group = h.browser.tab(TabId(1)).await.unwrap().group_id;
    let child_group = h.browser.tab(TabId(2)).await.unwrap().group_id;
    assert!(opener_group.is_some());
    assert_eq!(opener_group, child_group);
    // The fresh pair group is uncolored and unnamed.
    let group = h.browser.group(opener_group.unwrap()).await.unwrap();
    assert_eq!(group.color, GroupColor::Grey);
    assert_eq!(group.title, "");
}

#[tokio::test]
async fn new_tab_without_opener_parks_left_of_unpinned_region() {
    let mut settings = scenario_settings();
    settings.auto_group_enabled = true;
    let h = Harness::new(settings).await;
    h.browser
        .seed_tab(TabSnapshot {
            id: TabId(9),
            window_id: WindowId(1),
            index: 0,
            url: "https://pinned/".to_string(),
            title: "Pinned".to_string(),
            pinned: true,
            discarded: false,
            active: false,
            group_id: None,
            opener_tab_id: None,
        })
        .await;
    h.seed_tab(8, "https://old/", "Old", None).await;
    h.boot().await;

    h.seed_tab(2, "https://new/", "New", None).await;
    let created = h.browser.tab(TabId(2)).await.unwrap();
    h.engine
        .handle_event(BrowserEvent::TabCreated { tab: created })
        .await;

    assert_eq!(
        h.browser.strip_of(WindowId(1)).await,
        vec![TabId(9), TabId(2), TabId(8)]
    );
}

// --- trivial group dissolution ---

#[tokio::test]
async fn orphaned_pair_group_is_dissolved() {
    let mut settings = scenario_settings();
    settings.auto_group_enabled = true;
    let h = Harness::new(settings).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    h.seed_tab(2, "https://a/child", "Child", None).await;
    let mut created = h.browser.tab(TabId(2)).await.unwrap();
    created.opener_tab_id = Some(TabId(1));
    h.engine
        .handle_event(BrowserEvent::TabCreated { tab: created })
        .await;
    let group = h.browser.tab(TabId(1)).await.unwrap().group_id.unwrap();

    // Close the opener; the pair group now holds one tab and no name.
    h.browser.remove_tab(TabId(1)).await.unwrap();
    h.engine
        .handle_event(BrowserEvent::TabRemoved {
            tab_id: TabId(1),
            window_id: WindowId(1),
        })
        .await;
    h.engine.run_cycle().await;

    assert!(h.browser.tab(TabId(2)).await.unwrap().group_id.is_none());
    assert!(h.browser.group(group).await.is_none());
}

// --- auto-naming ---

#[tokio::test]
async fn unnamed_group_is_auto_named_after_the_delay() {
    // Default (hour-scale) thresholds so nothing ages away while the
    // naming delay elapses.
    let mut settings = Settings::default();
    settings.time_mode = TimeMode::Wallclock;
    settings.auto_group_enabled = false;
    settings.auto_group_naming_enabled = true;
    settings.auto_name_delay_minutes = 1;
    let h = Harness::new(settings).await;
    h.seed_group(40, "", GroupColor::Grey).await;
    h.seed_tab(1, "https://a/", "Rust async book", Some(GroupId(40))).await;
    h.seed_tab(2, "https://b/", "Rust ownership guide", Some(GroupId(40))).await;
    h.boot().await;

    // First sighting only starts the timer.
    h.engine.run_cycle().await;
    assert_eq!(h.browser.group(GroupId(40)).await.unwrap().title, "");

    h.clock.advance(61_000);
    h.engine.run_cycle().await;
    assert_eq!(h.browser.group(GroupId(40)).await.unwrap().title, "Rust");

    // The echo of our own write is not a user edit.
    let group = h.browser.group(GroupId(40)).await.unwrap();
    h.engine
        .handle_event(BrowserEvent::GroupUpdated { group })
        .await;
    let windows = h.engine.window_state_snapshot().await;
    let naming = windows
        .get(&WindowId(1))
        .unwrap()
        .group_naming
        .get(&GroupId(40))
        .unwrap();
    assert_eq!(naming.user_edit_lock_until, None);
    assert_eq!(naming.last_candidate.as_deref(), Some("Rust"));
}

#[tokio::test]
async fn user_edit_lock_defers_auto_naming() {
    let mut settings = Settings::default();
    settings.time_mode = TimeMode::Wallclock;
    settings.auto_group_enabled = false;
    settings.auto_group_naming_enabled = true;
    settings.auto_name_delay_minutes = 1;
    let h = Harness::new(settings).await;
    h.seed_group(40, "", GroupColor::Grey).await;
    h.seed_tab(1, "https://a/", "Rust async book", Some(GroupId(40))).await;
    h.seed_tab(2, "https://b/", "Rust ownership guide", Some(GroupId(40))).await;
    h.boot().await;

    h.engine.run_cycle().await; // timer starts

    // Past the delay, but the user just touched the title.
    h.clock.advance(61_000);
    let group = h.browser.group(GroupId(40)).await.unwrap();
    h.engine
        .handle_event(BrowserEvent::GroupUpdated { group })
        .await;
    h.engine.run_cycle().await;
    assert_eq!(h.browser.group(GroupId(40)).await.unwrap().title, "");

    // Lock expired: naming proceeds.
    h.clock.advance(20_000);
    h.engine.run_cycle().await;
    assert_eq!(h.browser.group(GroupId(40)).await.unwrap().title, "Rust");
}

// --- age suffixes ---

#[tokio::test]
async fn age_suffix_is_appended_and_stripped() {
    let mut settings = Settings::default();
    settings.time_mode = TimeMode::Wallclock;
    settings.auto_group_enabled = false;
    settings.auto_group_naming_enabled = false;
    settings.show_group_age_enabled = true;
    let h = Harness::new(settings.clone()).await;
    h.seed_group(50, "News", GroupColor::Grey).await;
    h.seed_tab(1, "https://news/", "Headlines", Some(GroupId(50))).await;
    h.boot().await;

    h.clock.advance(5 * 60_000);
    h.engine.run_cycle().await;
    assert_eq!(h.browser.group(GroupId(50)).await.unwrap().title, "News (5m)");

    // Turning the toggle off strips every suffix immediately.
    let mut off = settings.clone();
    off.show_group_age_enabled = false;
    h.engine
        .handle_event(BrowserEvent::SettingsChanged {
            old: Some(Box::new(settings)),
            new: Box::new(off),
        })
        .await;
    assert_eq!(h.browser.group(GroupId(50)).await.unwrap().title, "News");
}

// --- reactive settings: sorting off dissolves special groups ---

#[tokio::test]
async fn disabling_tab_sorting_dissolves_special_groups() {
    let settings = scenario_settings();
    let h = Harness::new(settings.clone()).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    h.clock.advance(2_500);
    h.engine.run_cycle().await;
    assert!(h.special(SpecialKind::Yellow).await.is_some());

    let mut off = settings.clone();
    off.tab_sorting_enabled = false;
    h.engine
        .handle_event(BrowserEvent::SettingsChanged {
            old: Some(Box::new(settings)),
            new: Box::new(off),
        })
        .await;

    assert_eq!(h.special(SpecialKind::Yellow).await, None);
    let meta = h.meta(1).await.unwrap();
    assert_eq!(meta.group_id, None);
    // Status is untouched; only the container went away.
    assert_eq!(meta.status, TabStatus::Yellow);
    assert!(h.browser.tab(TabId(1)).await.unwrap().group_id.is_none());
}

// --- reactive settings: special group renames ---

#[tokio::test]
async fn special_group_name_change_retitles_live_groups() {
    let settings = scenario_settings();
    let h = Harness::new(settings.clone()).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    h.clock.advance(2_500);
    h.engine.run_cycle().await;
    let yellow = h.special(SpecialKind::Yellow).await.unwrap();

    let mut renamed = settings.clone();
    renamed.yellow_group_name = "Stale".to_string();
    h.engine
        .handle_event(BrowserEvent::SettingsChanged {
            old: Some(Box::new(settings)),
            new: Box::new(renamed),
        })
        .await;
    assert_eq!(h.browser.group(yellow).await.unwrap().title, "Stale");

    // The echoed update is consumed, not treated as a user edit.
    let group = h.browser.group(yellow).await.unwrap();
    h.engine
        .handle_event(BrowserEvent::GroupUpdated { group })
        .await;
    // A genuine user rename flows back into settings.
    let mut group = h.browser.group(yellow).await.unwrap();
    group.title = "Old stuff".to_string();
    h.engine
        .handle_event(BrowserEvent::GroupUpdated { group })
        .await;
    let stored = h.repo.load_settings().await.unwrap();
    assert_eq!(stored.yellow_group_name, "Old stuff");
}

// --- startup rediscovery ---

#[tokio::test]
async fn startup_rediscovers_special_group_by_title_and_color() {
    let mut settings = scenario_settings();
    settings.yellow_group_name = "Stale".to_string();
    let h = Harness::new(settings).await;
    h.seed_group(60, "Stale", GroupColor::Yellow).await;
    h.seed_tab(1, "https://a/", "A", Some(GroupId(60))).await;
    h.boot().await;

    assert_eq!(h.special(SpecialKind::Yellow).await, Some(GroupId(60)));
    assert!(h.meta(1).await.unwrap().is_special_group);
}

#[tokio::test]
async fn startup_reconciles_renumbered_tabs_by_url() {
    let h = Harness::new(scenario_settings()).await;
    // Stored record for tab 5; live session renumbered it to 12.
    let mut stored = HashMap::new();
    stored.insert(
        TabId(5),
        TabMeta {
            tab_id: TabId(5),
            window_id: WindowId(1),
            url: "https://kept/".to_string(),
            refresh_active_time: 0,
            refresh_wall_time: BASE_MS - 3_000,
            status: TabStatus::Yellow,
            group_id: None,
            is_special_group: false,
        },
    );
    h.repo.save_tab_meta(&stored).await.unwrap();
    h.seed_tab(12, "https://kept/", "Kept", None).await;
    h.boot().await;

    let snapshot = h.engine.tab_meta_snapshot().await;
    assert!(snapshot.get(&TabId(5)).is_none());
    let meta = snapshot.get(&TabId(12)).unwrap();
    assert_eq!(meta.refresh_wall_time, BASE_MS - 3_000);
    assert_eq!(meta.status, TabStatus::Yellow);
}

// --- aging master switch gates the whole ladder ---

#[tokio::test]
async fn aging_disabled_freezes_statuses_and_layout() {
    let mut settings = scenario_settings();
    settings.aging_enabled = false;
    let h = Harness::new(settings).await;
    h.seed_tab(1, "https://a/", "A", None).await;
    h.boot().await;

    h.clock.advance(500_000);
    h.engine.run_cycle().await;

    let meta = h.meta(1).await.unwrap();
    assert_eq!(meta.status, TabStatus::Green);
    assert_eq!(meta.group_id, None);
    assert!(h.browser.tab(TabId(1)).await.is_some());
    assert_eq!(h.special(SpecialKind::Yellow).await, None);
}
