//! Browser surface trait

use async_trait::async_trait;
use tab_warden_core::*;

/// Right-append sentinel for tab and group move calls.
pub const END_INDEX: i32 = -1;

/// Attributes of a group the core may rewrite. `None` leaves the attribute
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupUpdate {
    pub title: Option<String>,
    pub color: Option<GroupColor>,
    pub collapsed: Option<bool>,
}

impl GroupUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn color(color: GroupColor) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: GroupColor) -> Self {
        self.color = Some(color);
        self
    }
}

/// The browser API surface the core depends on.
///
/// Every mutating call races with the user; implementations surface an
/// entity that vanished mid-flight as [`BrowserError::NotFound`] so phase
/// logic can skip the item and move on.
#[async_trait]
pub trait BrowserApi: Send + Sync {
    // --- tabs ---

    /// All tabs, optionally restricted to one window, in strip order.
    async fn query_tabs(&self, window: Option<WindowId>) -> Result<Vec<TabSnapshot>>;

    async fn get_tab(&self, tab_id: TabId) -> Result<TabSnapshot>;

    async fn create_tab(&self, window_id: WindowId, url: &str) -> Result<TabSnapshot>;

    /// Move a tab within its window. [`END_INDEX`] appends on the right.
    async fn move_tab(&self, tab_id: TabId, index: i32) -> Result<()>;

    async fn remove_tab(&self, tab_id: TabId) -> Result<()>;

    /// Add tabs to `group`, or create a fresh group containing them when
    /// `group` is `None`. Returns the group id.
    async fn group_tabs(&self, tab_ids: &[TabId], group: Option<GroupId>) -> Result<GroupId>;

    async fn ungroup_tabs(&self, tab_ids: &[TabId]) -> Result<()>;

    // --- windows & groups ---

    async fn query_windows(&self) -> Result<Vec<WindowId>>;

    /// Groups of a window, left to right.
    async fn query_groups(&self, window_id: WindowId) -> Result<Vec<GroupSnapshot>>;

    async fn get_group(&self, group_id: GroupId) -> Result<GroupSnapshot>;

    async fn update_group(&self, group_id: GroupId, update: GroupUpdate) -> Result<GroupSnapshot>;

    /// Move a group within its window. [`END_INDEX`] appends on the right.
    async fn move_group(&self, group_id: GroupId, index: i32) -> Result<()>;

    // --- bookmarks ---

    /// The id of the "Other Bookmarks" root folder.
    async fn other_bookmarks_root(&self) -> Result<BookmarkId>;

    /// Create a bookmark (`url = Some`) or folder (`url = None`).
    async fn create_bookmark(
        &self,
        parent_id: &BookmarkId,
        title: &str,
        url: Option<&str>,
    ) -> Result<BookmarkNode>;

    async fn get_bookmark(&self, id: &BookmarkId) -> Result<BookmarkNode>;

    async fn bookmark_children(&self, id: &BookmarkId) -> Result<Vec<BookmarkNode>>;

    async fn rename_bookmark(&self, id: &BookmarkId, title: &str) -> Result<BookmarkNode>;

    // --- alarms ---

    /// Replace the periodic evaluation alarm with one of the given period.
    async fn schedule_alarm(&self, period_ms: i64) -> Result<()>;

    async fn clear_alarm(&self) -> Result<()>;
}
