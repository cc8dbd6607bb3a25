//! Shared types for the tab lifecycle manager
//!
//! Everything persisted to the key-value store or exchanged with the
//! browser surface lives here so that all workspace members agree on the
//! same shapes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Browser-session tab identifier.
///
/// Stable for the lifetime of a browser session; renumbered after a
/// session restore (reconciliation absorbs that by URL matching).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

/// Browser-session window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

/// Browser-session tab-group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

/// Bookmark node identifier (string-shaped in the browser API).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(pub String);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tab age status, ordered green < yellow < red < gone.
///
/// `Gone` is transient: it is computed during an evaluation cycle to drive
/// the bookmark-then-close protocol and is never written back into a
/// [`TabMeta`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Green,
    Yellow,
    Red,
    Gone,
}

impl TabStatus {
    /// Whether this status is one that may be persisted into tab metadata.
    pub fn is_persistable(self) -> bool {
        self != TabStatus::Gone
    }

    /// The zone a tab of this status belongs to. `Gone` has no zone.
    pub fn zone(self) -> Option<Zone> {
        match self {
            TabStatus::Green => Some(Zone::Green),
            TabStatus::Yellow => Some(Zone::Yellow),
            TabStatus::Red => Some(Zone::Red),
            TabStatus::Gone => None,
        }
    }
}

/// The visible region of the tab strip a user group is sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

impl Zone {
    /// The group color a zone maps to when coloring is enabled.
    pub fn color(self) -> GroupColor {
        match self {
            Zone::Green => GroupColor::Green,
            Zone::Yellow => GroupColor::Yellow,
            Zone::Red => GroupColor::Red,
        }
    }
}

/// Which of the two core-managed special groups a slot refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialKind {
    Yellow,
    Red,
}

impl SpecialKind {
    pub fn color(self) -> GroupColor {
        match self {
            SpecialKind::Yellow => GroupColor::Yellow,
            SpecialKind::Red => GroupColor::Red,
        }
    }

    /// The tab status that routes an ungrouped tab into this slot.
    pub fn status(self) -> TabStatus {
        match self {
            SpecialKind::Yellow => TabStatus::Yellow,
            SpecialKind::Red => TabStatus::Red,
        }
    }
}

/// Tab-group colors supported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

/// Per-tab metadata tracked by the core. One record per non-pinned tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabMeta {
    pub tab_id: TabId,
    pub window_id: WindowId,
    /// Last committed URL. Used for reconciliation after a session restore
    /// renumbers tab ids.
    pub url: String,
    /// Active-time counter reading at the last refresh, in ms.
    pub refresh_active_time: i64,
    /// Wall-clock reading at the last refresh, in ms since the epoch.
    pub refresh_wall_time: i64,
    pub status: TabStatus,
    pub group_id: Option<GroupId>,
    /// True iff `group_id` references one of the window's special groups.
    pub is_special_group: bool,
}

/// Auto-naming bookkeeping for a single user group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupNaming {
    /// Wall-clock ms when the group was first observed without a name.
    pub first_unnamed_seen_at: Option<i64>,
    /// Wall-clock ms of the last auto-name write.
    pub last_auto_named_at: Option<i64>,
    /// The last candidate the suggester produced for this group.
    pub last_candidate: Option<String>,
    /// A user edit locks out auto-naming until this wall-clock ms.
    pub user_edit_lock_until: Option<i64>,
}

/// The two special-group slots of a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecialSlots {
    pub yellow: Option<GroupId>,
    pub red: Option<GroupId>,
}

impl SpecialSlots {
    pub fn get(&self, kind: SpecialKind) -> Option<GroupId> {
        match kind {
            SpecialKind::Yellow => self.yellow,
            SpecialKind::Red => self.red,
        }
    }

    pub fn set(&mut self, kind: SpecialKind, group: Option<GroupId>) {
        match kind {
            SpecialKind::Yellow => self.yellow = group,
            SpecialKind::Red => self.red = group,
        }
    }

    /// Whether `group` occupies either slot.
    pub fn contains(&self, group: GroupId) -> bool {
        self.yellow == Some(group) || self.red == Some(group)
    }

    /// The slot `group` occupies, if any.
    pub fn kind_of(&self, group: GroupId) -> Option<SpecialKind> {
        if self.yellow == Some(group) {
            Some(SpecialKind::Yellow)
        } else if self.red == Some(group) {
            Some(SpecialKind::Red)
        } else {
            None
        }
    }
}

/// Per-window bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    /// The core-managed yellow/red container groups, if created.
    pub special_groups: SpecialSlots,
    /// Zone each user group was assigned in the last completed cycle.
    /// Never contains special groups.
    pub group_zones: HashMap<GroupId, Zone>,
    /// Delayed auto-naming bookkeeping per user group.
    pub group_naming: HashMap<GroupId, GroupNaming>,
}

/// Persisted state of the active-time accumulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveTimeState {
    /// Total focused milliseconds accumulated so far.
    pub accumulated_ms: i64,
    /// Wall-clock ms when the current focus span began, if focused.
    pub focus_start_time: Option<i64>,
    /// Wall-clock ms of the last persistence write.
    pub last_persisted_at: i64,
}

/// Persisted state of the bookmark writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkFolderState {
    /// Bookmark node id of the target folder, once resolved.
    pub folder_id: Option<BookmarkId>,
}

/// Live tab data as reported by the browser surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: TabId,
    pub window_id: WindowId,
    /// Position within the window's tab strip.
    pub index: i32,
    pub url: String,
    pub title: String,
    pub pinned: bool,
    pub discarded: bool,
    pub active: bool,
    pub group_id: Option<GroupId>,
    /// The tab that opened this one, if the browser reported it.
    pub opener_tab_id: Option<TabId>,
}

/// Live tab-group data as reported by the browser surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: GroupId,
    pub window_id: WindowId,
    pub title: String,
    pub color: GroupColor,
    pub collapsed: bool,
}

/// A node in the browser's bookmark tree. Folders carry no URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkNode {
    pub id: BookmarkId,
    pub parent_id: Option<BookmarkId>,
    pub title: String,
    pub url: Option<String>,
    pub index: u32,
}

impl BookmarkNode {
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}
