//! Browser and storage events routed through the core
//!
//! Every host callback is expressed as one variant of [`BrowserEvent`];
//! the event router is the only place that matches over it.

use crate::settings::Settings;
use crate::types::{GroupId, GroupSnapshot, TabId, TabSnapshot, WindowId};

/// An event delivered by the host (browser callbacks, the periodic alarm,
/// or a key-value change notification for the settings blob).
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    /// A tab was created. `tab` is the creation-time snapshot.
    TabCreated { tab: TabSnapshot },

    /// A tab was closed by the browser or the user.
    TabRemoved { tab_id: TabId, window_id: WindowId },

    /// A tab's pinned flag flipped.
    TabPinnedChanged { tab_id: TabId, pinned: bool },

    /// A tab joined or left a group. `group_id` is `None` when ungrouped.
    TabGroupChanged {
        tab_id: TabId,
        group_id: Option<GroupId>,
    },

    /// A tab's discarded flag flipped. `discarded = false` marks the tab
    /// as just-restored, suppressing the next navigation refresh.
    TabDiscardChanged { tab_id: TabId, discarded: bool },

    /// A top-level navigation committed in the tab.
    NavigationCommitted { tab_id: TabId },

    /// The tab rewrote its history state (single-page navigation).
    HistoryStateUpdated { tab_id: TabId },

    /// A group's visible attributes changed (title, color, collapsed).
    GroupUpdated { group: GroupSnapshot },

    /// A group ceased to exist.
    GroupRemoved { group_id: GroupId, window_id: WindowId },

    /// Window focus moved. `None` means no browser window has focus.
    WindowFocusChanged { window_id: Option<WindowId> },

    /// A window was closed.
    WindowRemoved { window_id: WindowId },

    /// The periodic evaluation alarm fired.
    AlarmFired,

    /// The stored settings blob changed. `old` is `None` on first write.
    SettingsChanged {
        old: Option<Box<Settings>>,
        new: Box<Settings>,
    },
}
