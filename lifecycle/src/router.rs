//! Event router (C6)
//!
//! The only place that matches over [`BrowserEvent`]. Handlers mutate the
//! registries in short critical sections, never run the evaluation
//! algorithm inline, and finish by requesting a (debounced) cycle from
//! the engine.

use crate::engine::LifecycleEngine;
use crate::titles::effective_title;
use tab_warden_core::*;
use tracing::{debug, warn};

impl LifecycleEngine {
    /// Dispatch one host event.
    pub async fn handle_event(&self, event: BrowserEvent) {
        match event {
            BrowserEvent::TabCreated { tab } => self.on_tab_created(tab).await,
            BrowserEvent::TabRemoved { tab_id, window_id } => {
                self.on_tab_removed(tab_id, window_id).await
            }
            BrowserEvent::TabPinnedChanged { tab_id, pinned } => {
                self.on_pinned_changed(tab_id, pinned).await
            }
            BrowserEvent::TabGroupChanged { tab_id, group_id } => {
                self.on_tab_group_changed(tab_id, group_id).await
            }
            BrowserEvent::TabDiscardChanged { tab_id, discarded } => {
                self.on_discard_changed(tab_id, discarded).await
            }
            BrowserEvent::NavigationCommitted { tab_id }
            | BrowserEvent::HistoryStateUpdated { tab_id } => self.on_navigation(tab_id).await,
            BrowserEvent::GroupUpdated { group } => self.on_group_updated(group).await,
            BrowserEvent::GroupRemoved { group_id, window_id } => {
                self.on_group_removed(group_id, window_id).await
            }
            BrowserEvent::WindowFocusChanged { window_id } => {
                self.on_focus_changed(window_id).await
            }
            BrowserEvent::WindowRemoved { window_id } => self.on_window_removed(window_id).await,
            BrowserEvent::AlarmFired => self.request_eval(false).await,
            BrowserEvent::SettingsChanged { old, new } => {
                self.apply_settings_change(old.as_deref(), &new).await
            }
        }
    }

    async fn on_tab_created(&self, tab: TabSnapshot) {
        if tab.pinned {
            return;
        }
        let auto_group = {
            let mut state = self.state.lock().await;
            let now = self.now();
            let active = state.active_time.current(now);
            state.tabs.track_new(&tab, active, now);
            state.settings.auto_group_enabled
        };
        if auto_group {
            self.place_new_tab(&tab).await;
        }
        self.request_eval(true).await;
    }

    /// Placement policy for a newly created tab: join the opener's named
    /// group, pair up with an ungrouped opener in a fresh group, or move
    /// to the leftmost non-pinned position.
    async fn place_new_tab(&self, tab: &TabSnapshot) {
        let opener = match tab.opener_tab_id {
            Some(opener_id) => match self.browser.get_tab(opener_id).await {
                Ok(opener) => Some(opener),
                Err(TabWardenError::Browser { source }) if source.is_not_found() => None,
                Err(err) => {
                    warn!(tab = %tab.id, error = %err, "opener lookup failed");
                    None
                }
            },
            None => None,
        };

        if let Some(opener) = &opener {
            if let Some(group_id) = opener.group_id {
                let special = {
                    let state = self.state.lock().await;
                    state.windows.is_special(opener.window_id, group_id)
                };
                let named = match self.browser.get_group(group_id).await {
                    Ok(group) => !effective_title(&group.title).is_empty(),
                    Err(_) => false,
                };
                if !special && named {
                    match self.browser.group_tabs(&[tab.id], Some(group_id)).await {
                        Ok(_) => {
                            let mut state = self.state.lock().await;
                            state
                                .tabs
                                .on_group_membership_change(tab.id, Some(group_id), false);
                        }
                        Err(err) => {
                            warn!(tab = %tab.id, error = %err, "failed to join opener group")
                        }
                    }
                    return;
                }
                // Opener in a special or unnamed group: fall through to
                // the leftmost placement.
            } else if !opener.pinned {
                match self.browser.group_tabs(&[opener.id, tab.id], None).await {
                    Ok(group_id) => {
                        let mut state = self.state.lock().await;
                        state.windows.note_extension_created(group_id);
                        state
                            .tabs
                            .on_group_membership_change(opener.id, Some(group_id), false);
                        state
                            .tabs
                            .on_group_membership_change(tab.id, Some(group_id), false);
                    }
                    Err(err) => {
                        warn!(tab = %tab.id, error = %err, "failed to pair with opener")
                    }
                }
                return;
            }
        }

        // No usable opener: park at the left edge of the non-pinned
        // region.
        let pinned_count = match self.browser.query_tabs(Some(tab.window_id)).await {
            Ok(tabs) => tabs.iter().filter(|t| t.pinned).count() as i32,
            Err(err) => {
                warn!(window = %tab.window_id, error = %err, "failed to count pinned tabs");
                return;
            }
        };
        if let Err(err) = self.browser.move_tab(tab.id, pinned_count).await {
            warn!(tab = %tab.id, error = %err, "failed to move new tab leftmost");
        }
    }

    async fn on_tab_removed(&self, tab_id: TabId, window_id: WindowId) {
        {
            let mut state = self.state.lock().await;
            if let Some(old) = state.tabs.on_remove(tab_id) {
                if old.is_special_group {
                    if let Some(group_id) = old.group_id {
                        if state.tabs.members_of(group_id).is_empty() {
                            state.windows.forget_group(window_id, group_id);
                        }
                    }
                }
            }
            state.restored_from_discard.remove(&tab_id);
        }
        self.request_eval(true).await;
    }

    async fn on_pinned_changed(&self, tab_id: TabId, pinned: bool) {
        if pinned {
            let mut state = self.state.lock().await;
            state.tabs.on_remove(tab_id);
        } else {
            match self.browser.get_tab(tab_id).await {
                Ok(tab) => {
                    let mut state = self.state.lock().await;
                    let now = self.now();
                    let active = state.active_time.current(now);
                    state.tabs.on_pinned_change(&tab, false, active, now);
                }
                Err(err) => warn!(tab = %tab_id, error = %err, "unpinned tab vanished"),
            }
        }
        self.request_eval(true).await;
    }

    async fn on_tab_group_changed(&self, tab_id: TabId, group_id: Option<GroupId>) {
        {
            let mut state = self.state.lock().await;
            let Some(window_id) = state.tabs.get(tab_id).map(|meta| meta.window_id) else {
                return; // pinned or untracked
            };
            let is_special = group_id
                .map(|g| state.windows.is_special(window_id, g))
                .unwrap_or(false);
            state
                .tabs
                .on_group_membership_change(tab_id, group_id, is_special);
        }
        self.request_eval(true).await;
    }

    async fn on_discard_changed(&self, tab_id: TabId, discarded: bool) {
        if !discarded {
            let mut state = self.state.lock().await;
            state.restored_from_discard.insert(tab_id);
        }
    }

    /// Navigation commit or history-state update: a refresh, unless the
    /// tab just came back from a discard (one-shot suppression).
    async fn on_navigation(&self, tab_id: TabId) {
        let special_membership = {
            let mut state = self.state.lock().await;
            if state.restored_from_discard.remove(&tab_id) {
                debug!(tab = %tab_id, "suppressed refresh after discard restore");
                None
            } else {
                let now = self.now();
                let active = state.active_time.current(now);
                state.tabs.on_refresh(tab_id, active, now);
                let membership = state.tabs.get(tab_id).and_then(|meta| {
                    meta.is_special_group
                        .then_some((meta.window_id, meta.group_id?))
                });
                if membership.is_some() {
                    state.tabs.on_group_membership_change(tab_id, None, false);
                }
                membership
            }
        };

        match self.browser.get_tab(tab_id).await {
            Ok(tab) => {
                let mut state = self.state.lock().await;
                state.tabs.set_url(tab_id, &tab.url);
            }
            Err(TabWardenError::Browser { source }) if source.is_not_found() => {}
            Err(err) => warn!(tab = %tab_id, error = %err, "failed to read committed URL"),
        }

        // A refreshed tab leaves its special group; green work does not
        // belong in the yellow or red containers.
        if let Some((window_id, group_id)) = special_membership {
            if let Err(err) = self.browser.ungroup_tabs(&[tab_id]).await {
                warn!(tab = %tab_id, error = %err, "failed to release refreshed tab");
            }
            let mut state = self.state.lock().await;
            if state.tabs.members_of(group_id).is_empty() {
                state.windows.forget_group(window_id, group_id);
            }
        }

        self.request_eval(true).await;
    }

    async fn on_group_updated(&self, group: GroupSnapshot) {
        let write_back = {
            let mut state = self.state.lock().await;
            if state.windows.consume_expected_title(group.id, &group.title) {
                return; // our own write coming back around
            }
            let now = self.now();
            state
                .windows
                .apply_user_edit_lock(group.window_id, group.id, now);

            state
                .windows
                .kind_of_special(group.window_id, group.id)
                .filter(|kind| state.settings.special_group_name(*kind) != group.title)
                .map(|kind| (kind, state.settings.clone()))
        };

        // A user rename of a special group becomes the configured name.
        if let Some((kind, settings)) = write_back {
            let mut updated = settings;
            match kind {
                SpecialKind::Yellow => updated.yellow_group_name = group.title.clone(),
                SpecialKind::Red => updated.red_group_name = group.title.clone(),
            }
            if let Err(err) = self.repo.save_settings(&updated).await {
                warn!(group = %group.id, error = %err, "failed to adopt special group rename");
            }
        }
    }

    async fn on_group_removed(&self, group_id: GroupId, window_id: WindowId) {
        let mut state = self.state.lock().await;
        state.windows.forget_group(window_id, group_id);
        for member in state.tabs.members_of(group_id) {
            state.tabs.on_group_membership_change(member, None, false);
        }
    }

    async fn on_focus_changed(&self, window_id: Option<WindowId>) {
        let snapshot = {
            let mut state = self.state.lock().await;
            let now = self.now();
            state.active_time.handle_focus_change(window_id, now);
            state.active_time.snapshot(now)
        };
        if let Err(err) = self.repo.save_active_time(&snapshot).await {
            warn!(error = %err, "failed to persist active time");
        }
    }

    async fn on_window_removed(&self, window_id: WindowId) {
        let mut state = self.state.lock().await;
        state.tabs.remove_window(window_id);
        state.windows.remove_window(window_id);
    }
}
