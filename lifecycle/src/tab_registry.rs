//! Per-tab metadata registry (C3)
//!
//! Owns the `TabMeta` map. Pinned tabs never enter it. All methods are
//! synchronous; the engine serializes access and persists snapshots
//! through the end-of-cycle batch.

use std::collections::{HashMap, HashSet};
use tab_warden_core::{GroupId, TabId, TabMeta, TabSnapshot, TabStatus, WindowId};
use tracing::debug;

#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: HashMap<TabId, TabMeta>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(tabs: HashMap<TabId, TabMeta>) -> Self {
        Self { tabs }
    }

    pub fn as_map(&self) -> &HashMap<TabId, TabMeta> {
        &self.tabs
    }

    pub fn get(&self, tab_id: TabId) -> Option<&TabMeta> {
        self.tabs.get(&tab_id)
    }

    pub fn get_mut(&mut self, tab_id: TabId) -> Option<&mut TabMeta> {
        self.tabs.get_mut(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Tabs of one window.
    pub fn in_window(&self, window: WindowId) -> Vec<&TabMeta> {
        let mut tabs: Vec<&TabMeta> = self
            .tabs
            .values()
            .filter(|meta| meta.window_id == window)
            .collect();
        tabs.sort_by_key(|meta| meta.tab_id);
        tabs
    }

    /// Member tab ids of a group.
    pub fn members_of(&self, group: GroupId) -> Vec<TabId> {
        let mut members: Vec<TabId> = self
            .tabs
            .values()
            .filter(|meta| meta.group_id == Some(group))
            .map(|meta| meta.tab_id)
            .collect();
        members.sort();
        members
    }

    /// Start tracking a newly created (or newly unpinned) tab as fresh
    /// green. Pinned tabs are ignored.
    pub fn track_new(&mut self, tab: &TabSnapshot, active_now_ms: i64, wall_now_ms: i64) {
        if tab.pinned {
            return;
        }
        self.tabs.insert(
            tab.id,
            TabMeta {
                tab_id: tab.id,
                window_id: tab.window_id,
                url: tab.url.clone(),
                refresh_active_time: active_now_ms,
                refresh_wall_time: wall_now_ms,
                status: TabStatus::Green,
                group_id: tab.group_id,
                is_special_group: false,
            },
        );
    }

    /// A pinned toggle either evicts the record or readmits the tab fresh.
    pub fn on_pinned_change(
        &mut self,
        tab: &TabSnapshot,
        pinned: bool,
        active_now_ms: i64,
        wall_now_ms: i64,
    ) {
        if pinned {
            self.tabs.remove(&tab.id);
        } else {
            self.track_new(tab, active_now_ms, wall_now_ms);
        }
    }

    /// Update group membership. `is_special` reflects whether the new
    /// group is one of the window's special groups.
    pub fn on_group_membership_change(
        &mut self,
        tab_id: TabId,
        new_group: Option<GroupId>,
        is_special: bool,
    ) {
        if let Some(meta) = self.tabs.get_mut(&tab_id) {
            meta.group_id = new_group;
            meta.is_special_group = new_group.is_some() && is_special;
        }
    }

    /// Reset the age clock: both refresh stamps to now, status to green.
    /// Returns false if the tab is not tracked.
    pub fn on_refresh(&mut self, tab_id: TabId, active_now_ms: i64, wall_now_ms: i64) -> bool {
        match self.tabs.get_mut(&tab_id) {
            Some(meta) => {
                meta.refresh_active_time = active_now_ms;
                meta.refresh_wall_time = wall_now_ms;
                meta.status = TabStatus::Green;
                true
            }
            None => false,
        }
    }

    /// Record the last committed URL.
    pub fn set_url(&mut self, tab_id: TabId, url: &str) {
        if let Some(meta) = self.tabs.get_mut(&tab_id) {
            meta.url = url.to_string();
        }
    }

    /// Drop a record, returning it so the caller can clean up
    /// special-group slots.
    pub fn on_remove(&mut self, tab_id: TabId) -> Option<TabMeta> {
        self.tabs.remove(&tab_id)
    }

    /// Drop every record of a closed window.
    pub fn remove_window(&mut self, window: WindowId) {
        self.tabs.retain(|_, meta| meta.window_id != window);
    }

    /// Reconcile stored records against the live tab list.
    ///
    /// Matching is by tab id first; stored records with no id match are
    /// matched by URL to absorb the id renumbering a session restore
    /// causes. Matched records keep their refresh stamps and status but
    /// take id, window, group, and URL from live data. Unmatched stored
    /// records are dropped; unmatched live non-pinned tabs become fresh
    /// green. `is_special_group` flags are cleared here and re-derived by
    /// the engine against the window registry.
    pub fn reconcile(&mut self, live: &[TabSnapshot], active_now_ms: i64, wall_now_ms: i64) {
        let mut old = std::mem::take(&mut self.tabs);
        let mut claimed: HashSet<TabId> = HashSet::new();

        // Pass 1: id matches.
        for tab in live.iter().filter(|t| !t.pinned) {
            if let Some(stored) = old.remove(&tab.id) {
                claimed.insert(tab.id);
                self.tabs.insert(tab.id, Self::adopt(stored, tab));
            }
        }

        // Pass 2: URL matches for renumbered tabs.
        for tab in live.iter().filter(|t| !t.pinned) {
            if claimed.contains(&tab.id) {
                continue;
            }
            let url_match = old
                .iter()
                .find(|(_, stored)| stored.url == tab.url)
                .map(|(id, _)| *id);
            if let Some(old_id) = url_match {
                let stored = old.remove(&old_id).expect("key just found");
                claimed.insert(tab.id);
                debug!(old_id = %old_id, new_id = %tab.id, "reconciled tab by URL");
                self.tabs.insert(tab.id, Self::adopt(stored, tab));
            } else {
                claimed.insert(tab.id);
                self.track_new(tab, active_now_ms, wall_now_ms);
            }
        }

        if !old.is_empty() {
            debug!(dropped = old.len(), "dropped stale tab records");
        }
    }

    fn adopt(stored: TabMeta, live: &TabSnapshot) -> TabMeta {
        TabMeta {
            tab_id: live.id,
            window_id: live.window_id,
            url: live.url.clone(),
            group_id: live.group_id,
            is_special_group: false,
            ..stored
        }
    }
}
