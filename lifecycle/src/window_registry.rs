//! Per-window state registry (C4)
//!
//! Owns `WindowState` (persisted) plus two process-wide side channels that
//! live and die with the host process: the expected-title-write markers
//! and the set of groups this core itself created. Both exist so the
//! group-updated handler can tell the core's own writes apart from user
//! edits.

use std::collections::{HashMap, HashSet};
use tab_warden_core::{GroupId, GroupNaming, SpecialKind, WindowId, WindowState};

/// How long a user title edit locks out auto-naming.
pub const USER_EDIT_LOCK_MS: i64 = 15_000;

#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: HashMap<WindowId, WindowState>,
    /// One-shot `(group, title)` markers for writes the core is about to
    /// issue. Never persisted.
    expected_titles: HashSet<(GroupId, String)>,
    /// Groups created by the core (placement policy). Never persisted.
    extension_created: HashSet<GroupId>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(windows: HashMap<WindowId, WindowState>) -> Self {
        Self {
            windows,
            ..Self::default()
        }
    }

    pub fn as_map(&self) -> &HashMap<WindowId, WindowState> {
        &self.windows
    }

    pub fn get(&self, window: WindowId) -> Option<&WindowState> {
        self.windows.get(&window)
    }

    /// Lazily create the state for a window on first touch.
    pub fn ensure(&mut self, window: WindowId) -> &mut WindowState {
        self.windows.entry(window).or_default()
    }

    pub fn remove_window(&mut self, window: WindowId) {
        self.windows.remove(&window);
    }

    // --- special groups ---

    pub fn special(&self, window: WindowId, kind: SpecialKind) -> Option<GroupId> {
        self.windows
            .get(&window)
            .and_then(|state| state.special_groups.get(kind))
    }

    pub fn set_special(&mut self, window: WindowId, kind: SpecialKind, group: Option<GroupId>) {
        self.ensure(window).special_groups.set(kind, group);
    }

    /// Which special slot of `window` the group occupies, if any.
    pub fn kind_of_special(&self, window: WindowId, group: GroupId) -> Option<SpecialKind> {
        self.windows
            .get(&window)
            .and_then(|state| state.special_groups.kind_of(group))
    }

    /// Search every window for a special slot holding `group`.
    pub fn special_anywhere(&self, group: GroupId) -> Option<(WindowId, SpecialKind)> {
        self.windows.iter().find_map(|(window, state)| {
            state.special_groups.kind_of(group).map(|kind| (*window, kind))
        })
    }

    /// Whether `group` is a special group in `window`.
    pub fn is_special(&self, window: WindowId, group: GroupId) -> bool {
        self.kind_of_special(window, group).is_some()
    }

    // --- group bookkeeping ---

    /// Forget every trace of a group that no longer exists.
    pub fn forget_group(&mut self, window: WindowId, group: GroupId) {
        if let Some(state) = self.windows.get_mut(&window) {
            if let Some(kind) = state.special_groups.kind_of(group) {
                state.special_groups.set(kind, None);
            }
            state.group_zones.remove(&group);
            state.group_naming.remove(&group);
        }
        self.extension_created.remove(&group);
        self.expected_titles.retain(|(g, _)| *g != group);
    }

    pub fn naming_mut(&mut self, window: WindowId, group: GroupId) -> &mut GroupNaming {
        self.ensure(window).group_naming.entry(group).or_default()
    }

    /// An inbound title change that is not one of our own writes: lock
    /// auto-naming for a while and drop the remembered candidate.
    pub fn apply_user_edit_lock(&mut self, window: WindowId, group: GroupId, now_ms: i64) {
        let naming = self.naming_mut(window, group);
        naming.user_edit_lock_until = Some(now_ms + USER_EDIT_LOCK_MS);
        naming.last_candidate = None;
    }

    // --- expected-title-write markers ---

    /// Record that the core is about to write `title` to `group`.
    /// Deduplicated by `(group, title)`; consumed by the next matching
    /// inbound update.
    pub fn mark_expected_title_write(&mut self, group: GroupId, title: &str) {
        self.expected_titles.insert((group, title.to_string()));
    }

    /// Consume a marker if the inbound update matches one. Returns true
    /// when the update was self-inflicted.
    pub fn consume_expected_title(&mut self, group: GroupId, title: &str) -> bool {
        self.expected_titles.remove(&(group, title.to_string()))
    }

    // --- extension-created groups ---

    pub fn note_extension_created(&mut self, group: GroupId) {
        self.extension_created.insert(group);
    }

    pub fn is_extension_created(&self, group: GroupId) -> bool {
        self.extension_created.contains(&group)
    }
}
