//! In-memory browser implementation for tests
//!
//! `MockBrowser` models the pieces of browser state the core manipulates:
//! per-window tab strips, tab groups with a left-to-right order, and a
//! bookmark tree rooted at "Other Bookmarks". Every mutating call is
//! recorded in an operation log so tests can assert ordering, most
//! importantly that bookmark creation precedes tab removal.

use crate::traits::{BrowserApi, GroupUpdate, END_INDEX};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tab_warden_core::*;
use tokio::sync::RwLock;

/// Bookmark node id of the "Other Bookmarks" root.
pub const OTHER_BOOKMARKS_ID: &str = "2";

/// A recorded mutating browser call.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserOp {
    MovedTab { tab: TabId, index: i32 },
    RemovedTab { tab: TabId },
    Grouped { tabs: Vec<TabId>, group: GroupId },
    Ungrouped { tabs: Vec<TabId> },
    UpdatedGroup {
        group: GroupId,
        title: Option<String>,
        color: Option<GroupColor>,
    },
    MovedGroup { group: GroupId, index: i32 },
    CreatedBookmark {
        parent: BookmarkId,
        title: String,
        url: Option<String>,
    },
    RenamedBookmark { id: BookmarkId, title: String },
    ScheduledAlarm { period_ms: i64 },
    ClearedAlarm,
}

#[derive(Default)]
struct MockState {
    windows: Vec<WindowId>,
    /// Tab ids per window in strip order.
    strips: HashMap<WindowId, Vec<TabId>>,
    tabs: HashMap<TabId, TabSnapshot>,
    groups: HashMap<GroupId, GroupSnapshot>,
    /// Group ids per window, left to right.
    group_order: HashMap<WindowId, Vec<GroupId>>,
    bookmarks: HashMap<BookmarkId, BookmarkNode>,
    children: HashMap<BookmarkId, Vec<BookmarkId>>,
    next_tab_id: i64,
    next_group_id: i64,
    next_bookmark_id: i64,
    alarm_period_ms: Option<i64>,
    ops: Vec<BrowserOp>,
}

impl MockState {
    fn ensure_window(&mut self, window_id: WindowId) {
        if !self.windows.contains(&window_id) {
            self.windows.push(window_id);
        }
        self.strips.entry(window_id).or_default();
        self.group_order.entry(window_id).or_default();
    }

    fn snapshot_tab(&self, tab_id: TabId) -> Option<TabSnapshot> {
        let tab = self.tabs.get(&tab_id)?;
        let index = self
            .strips
            .get(&tab.window_id)
            .and_then(|strip| strip.iter().position(|t| *t == tab_id))
            .unwrap_or(0) as i32;
        let mut snapshot = tab.clone();
        snapshot.index = index;
        Some(snapshot)
    }

    /// Drop groups that lost their last member, as the browser does.
    fn prune_empty_groups(&mut self) {
        let live: Vec<GroupId> = self.groups.keys().copied().collect();
        for group_id in live {
            let populated = self
                .tabs
                .values()
                .any(|t| t.group_id == Some(group_id));
            if !populated {
                if let Some(group) = self.groups.remove(&group_id) {
                    if let Some(order) = self.group_order.get_mut(&group.window_id) {
                        order.retain(|g| *g != group_id);
                    }
                }
            }
        }
    }
}

/// In-memory [`BrowserApi`] implementation.
pub struct MockBrowser {
    state: Arc<RwLock<MockState>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        let mut state = MockState::default();
        let root = BookmarkId(OTHER_BOOKMARKS_ID.to_string());
        state.bookmarks.insert(
            root.clone(),
            BookmarkNode {
                id: root.clone(),
                parent_id: None,
                title: "Other Bookmarks".to_string(),
                url: None,
                index: 0,
            },
        );
        state.children.insert(root, Vec::new());
        state.next_tab_id = 1;
        state.next_group_id = 1;
        state.next_bookmark_id = 100;
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    // --- seeding helpers for tests ---

    pub async fn seed_window(&self, window_id: WindowId) {
        self.state.write().await.ensure_window(window_id);
    }

    /// Insert a tab at the right end of its window's strip. The snapshot's
    /// `index` field is ignored; strip position is authoritative.
    pub async fn seed_tab(&self, tab: TabSnapshot) {
        let mut state = self.state.write().await;
        state.ensure_window(tab.window_id);
        state.next_tab_id = state.next_tab_id.max(tab.id.0 + 1);
        state.strips.get_mut(&tab.window_id).unwrap().push(tab.id);
        state.tabs.insert(tab.id, tab);
    }

    /// Insert a group at the right end of its window's group order.
    pub async fn seed_group(&self, group: GroupSnapshot) {
        let mut state = self.state.write().await;
        state.ensure_window(group.window_id);
        state.next_group_id = state.next_group_id.max(group.id.0 + 1);
        state.group_order.get_mut(&group.window_id).unwrap().push(group.id);
        state.groups.insert(group.id, group);
    }

    /// Remove a bookmark node out from under the core, as a user would.
    pub async fn delete_bookmark(&self, id: &BookmarkId) {
        let mut state = self.state.write().await;
        if let Some(node) = state.bookmarks.remove(id) {
            if let Some(parent) = node.parent_id {
                if let Some(siblings) = state.children.get_mut(&parent) {
                    siblings.retain(|c| c != id);
                }
            }
            state.children.remove(id);
        }
    }

    // --- inspection helpers for tests ---

    pub async fn tab(&self, tab_id: TabId) -> Option<TabSnapshot> {
        self.state.read().await.snapshot_tab(tab_id)
    }

    pub async fn group(&self, group_id: GroupId) -> Option<GroupSnapshot> {
        self.state.read().await.groups.get(&group_id).cloned()
    }

    /// Left-to-right group ids of a window.
    pub async fn group_order_of(&self, window_id: WindowId) -> Vec<GroupId> {
        self.state
            .read()
            .await
            .group_order
            .get(&window_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Strip order of a window.
    pub async fn strip_of(&self, window_id: WindowId) -> Vec<TabId> {
        self.state
            .read()
            .await
            .strips
            .get(&window_id)
            .cloned()
            .unwrap_or_default()
    }

    /// First child of `parent` whose title matches, if any.
    pub async fn bookmark_by_title(
        &self,
        parent: &BookmarkId,
        title: &str,
    ) -> Option<BookmarkNode> {
        let state = self.state.read().await;
        let children = state.children.get(parent)?;
        children
            .iter()
            .filter_map(|id| state.bookmarks.get(id))
            .find(|node| node.title == title)
            .cloned()
    }

    pub async fn alarm_period(&self) -> Option<i64> {
        self.state.read().await.alarm_period_ms
    }

    /// The recorded mutating calls, in order.
    pub async fn ops(&self) -> Vec<BrowserOp> {
        self.state.read().await.ops.clone()
    }

    pub async fn clear_ops(&self) {
        self.state.write().await.ops.clear();
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

fn tab_not_found(id: TabId) -> TabWardenError {
    BrowserError::NotFound {
        entity: "tab",
        id: id.0,
    }
    .into()
}

fn group_not_found(id: GroupId) -> TabWardenError {
    BrowserError::NotFound {
        entity: "group",
        id: id.0,
    }
    .into()
}

fn bookmark_not_found(id: &BookmarkId) -> TabWardenError {
    BrowserError::BookmarkNotFound { id: id.0.clone() }.into()
}

#[async_trait]
impl BrowserApi for MockBrowser {
    async fn query_tabs(&self, window: Option<WindowId>) -> Result<Vec<TabSnapshot>> {
        let state = self.state.read().await;
        let windows: Vec<WindowId> = match window {
            Some(w) => vec![w],
            None => state.windows.clone(),
        };
        let mut out = Vec::new();
        for w in windows {
            if let Some(strip) = state.strips.get(&w) {
                for tab_id in strip {
                    if let Some(snapshot) = state.snapshot_tab(*tab_id) {
                        out.push(snapshot);
                    }
                }
            }
        }
        Ok(out)
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabSnapshot> {
        self.state
            .read()
            .await
            .snapshot_tab(tab_id)
            .ok_or_else(|| tab_not_found(tab_id))
    }

    async fn create_tab(&self, window_id: WindowId, url: &str) -> Result<TabSnapshot> {
        let mut state = self.state.write().await;
        state.ensure_window(window_id);
        let id = TabId(state.next_tab_id);
        state.next_tab_id += 1;
        let tab = TabSnapshot {
            id,
            window_id,
            index: 0,
            url: url.to_string(),
            title: String::new(),
            pinned: false,
            discarded: false,
            active: false,
            group_id: None,
            opener_tab_id: None,
        };
        state.strips.get_mut(&window_id).unwrap().push(id);
        state.tabs.insert(id, tab);
        Ok(state.snapshot_tab(id).unwrap())
    }

    async fn move_tab(&self, tab_id: TabId, index: i32) -> Result<()> {
        let mut state = self.state.write().await;
        let window_id = state
            .tabs
            .get(&tab_id)
            .map(|t| t.window_id)
            .ok_or_else(|| tab_not_found(tab_id))?;
        let strip = state.strips.get_mut(&window_id).unwrap();
        strip.retain(|t| *t != tab_id);
        let at = if index == END_INDEX {
            strip.len()
        } else {
            (index.max(0) as usize).min(strip.len())
        };
        strip.insert(at, tab_id);
        state.ops.push(BrowserOp::MovedTab { tab: tab_id, index });
        Ok(())
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<()> {
        let mut state = self.state.write().await;
        let tab = state
            .tabs
            .remove(&tab_id)
            .ok_or_else(|| tab_not_found(tab_id))?;
        if let Some(strip) = state.strips.get_mut(&tab.window_id) {
            strip.retain(|t| *t != tab_id);
        }
        state.prune_empty_groups();
        state.ops.push(BrowserOp::RemovedTab { tab: tab_id });
        Ok(())
    }

    async fn group_tabs(&self, tab_ids: &[TabId], group: Option<GroupId>) -> Result<GroupId> {
        let mut state = self.state.write().await;
        let group_id = match group {
            Some(existing) => {
                if !state.groups.contains_key(&existing) {
                    return Err(group_not_found(existing));
                }
                existing
            }
            None => {
                let first = tab_ids
                    .first()
                    .ok_or_else(|| tab_not_found(TabId(-1)))?;
                let window_id = state
                    .tabs
                    .get(first)
                    .map(|t| t.window_id)
                    .ok_or_else(|| tab_not_found(*first))?;
                let id = GroupId(state.next_group_id);
                state.next_group_id += 1;
                state.groups.insert(
                    id,
                    GroupSnapshot {
                        id,
                        window_id,
                        title: String::new(),
                        color: GroupColor::Grey,
                        collapsed: false,
                    },
                );
                state.group_order.get_mut(&window_id).unwrap().push(id);
                id
            }
        };
        for tab_id in tab_ids {
            let tab = state
                .tabs
                .get_mut(tab_id)
                .ok_or_else(|| tab_not_found(*tab_id))?;
            tab.group_id = Some(group_id);
        }
        state.prune_empty_groups();
        state.ops.push(BrowserOp::Grouped {
            tabs: tab_ids.to_vec(),
            group: group_id,
        });
        Ok(group_id)
    }

    async fn ungroup_tabs(&self, tab_ids: &[TabId]) -> Result<()> {
        let mut state = self.state.write().await;
        for tab_id in tab_ids {
            if let Some(tab) = state.tabs.get_mut(tab_id) {
                tab.group_id = None;
            }
        }
        state.prune_empty_groups();
        state.ops.push(BrowserOp::Ungrouped {
            tabs: tab_ids.to_vec(),
        });
        Ok(())
    }

    async fn query_windows(&self) -> Result<Vec<WindowId>> {
        Ok(self.state.read().await.windows.clone())
    }

    async fn query_groups(&self, window_id: WindowId) -> Result<Vec<GroupSnapshot>> {
        let state = self.state.read().await;
        let order = state.group_order.get(&window_id).cloned().unwrap_or_default();
        Ok(order
            .iter()
            .filter_map(|id| state.groups.get(id).cloned())
            .collect())
    }

    async fn get_group(&self, group_id: GroupId) -> Result<GroupSnapshot> {
        self.state
            .read()
            .await
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| group_not_found(group_id))
    }

    async fn update_group(&self, group_id: GroupId, update: GroupUpdate) -> Result<GroupSnapshot> {
        let mut state = self.state.write().await;
        let group = state
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| group_not_found(group_id))?;
        if let Some(title) = &update.title {
            group.title = title.clone();
        }
        if let Some(color) = update.color {
            group.color = color;
        }
        if let Some(collapsed) = update.collapsed {
            group.collapsed = collapsed;
        }
        let snapshot = group.clone();
        state.ops.push(BrowserOp::UpdatedGroup {
            group: group_id,
            title: update.title,
            color: update.color,
        });
        Ok(snapshot)
    }

    async fn move_group(&self, group_id: GroupId, index: i32) -> Result<()> {
        let mut state = self.state.write().await;
        let window_id = state
            .groups
            .get(&group_id)
            .map(|g| g.window_id)
            .ok_or_else(|| group_not_found(group_id))?;
        let order = state.group_order.get_mut(&window_id).unwrap();
        order.retain(|g| *g != group_id);
        let at = if index == END_INDEX {
            order.len()
        } else {
            (index.max(0) as usize).min(order.len())
        };
        order.insert(at, group_id);
        state.ops.push(BrowserOp::MovedGroup {
            group: group_id,
            index,
        });
        Ok(())
    }

    async fn other_bookmarks_root(&self) -> Result<BookmarkId> {
        Ok(BookmarkId(OTHER_BOOKMARKS_ID.to_string()))
    }

    async fn create_bookmark(
        &self,
        parent_id: &BookmarkId,
        title: &str,
        url: Option<&str>,
    ) -> Result<BookmarkNode> {
        let mut state = self.state.write().await;
        if !state.bookmarks.contains_key(parent_id) {
            return Err(bookmark_not_found(parent_id));
        }
        let id = BookmarkId(format!("bm{}", state.next_bookmark_id));
        state.next_bookmark_id += 1;
        let index = state
            .children
            .get(parent_id)
            .map(|c| c.len() as u32)
            .unwrap_or(0);
        let node = BookmarkNode {
            id: id.clone(),
            parent_id: Some(parent_id.clone()),
            title: title.to_string(),
            url: url.map(str::to_string),
            index,
        };
        state.bookmarks.insert(id.clone(), node.clone());
        state.children.entry(parent_id.clone()).or_default().push(id.clone());
        if node.is_folder() {
            state.children.entry(id).or_default();
        }
        state.ops.push(BrowserOp::CreatedBookmark {
            parent: parent_id.clone(),
            title: title.to_string(),
            url: url.map(str::to_string),
        });
        Ok(node)
    }

    async fn get_bookmark(&self, id: &BookmarkId) -> Result<BookmarkNode> {
        self.state
            .read()
            .await
            .bookmarks
            .get(id)
            .cloned()
            .ok_or_else(|| bookmark_not_found(id))
    }

    async fn bookmark_children(&self, id: &BookmarkId) -> Result<Vec<BookmarkNode>> {
        let state = self.state.read().await;
        let children = state
            .children
            .get(id)
            .ok_or_else(|| bookmark_not_found(id))?;
        Ok(children
            .iter()
            .filter_map(|c| state.bookmarks.get(c).cloned())
            .collect())
    }

    async fn rename_bookmark(&self, id: &BookmarkId, title: &str) -> Result<BookmarkNode> {
        let mut state = self.state.write().await;
        let node = state
            .bookmarks
            .get_mut(id)
            .ok_or_else(|| bookmark_not_found(id))?;
        node.title = title.to_string();
        let snapshot = node.clone();
        state.ops.push(BrowserOp::RenamedBookmark {
            id: id.clone(),
            title: title.to_string(),
        });
        Ok(snapshot)
    }

    async fn schedule_alarm(&self, period_ms: i64) -> Result<()> {
        let mut state = self.state.write().await;
        state.alarm_period_ms = Some(period_ms);
        state.ops.push(BrowserOp::ScheduledAlarm { period_ms });
        Ok(())
    }

    async fn clear_alarm(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.alarm_period_ms = None;
        state.ops.push(BrowserOp::ClearedAlarm);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tab(id: i64, window: i64, url: &str) -> TabSnapshot {
        TabSnapshot {
            id: TabId(id),
            window_id: WindowId(window),
            index: 0,
            url: url.to_string(),
            title: format!("tab {id}"),
            pinned: false,
            discarded: false,
            active: false,
            group_id: None,
            opener_tab_id: None,
        }
    }

    #[tokio::test]
    async fn grouping_creates_and_prunes() {
        let browser = MockBrowser::new();
        browser.seed_tab(make_tab(1, 1, "https://a/")).await;
        browser.seed_tab(make_tab(2, 1, "https://b/")).await;

        let group = browser.group_tabs(&[TabId(1), TabId(2)], None).await.unwrap();
        assert_eq!(browser.group_order_of(WindowId(1)).await, vec![group]);

        browser.ungroup_tabs(&[TabId(1), TabId(2)]).await.unwrap();
        assert!(browser.group_order_of(WindowId(1)).await.is_empty());
        assert!(browser.get_group(group).await.is_err());
    }

    #[tokio::test]
    async fn removing_last_member_drops_group() {
        let browser = MockBrowser::new();
        browser.seed_tab(make_tab(1, 1, "https://a/")).await;
        let group = browser.group_tabs(&[TabId(1)], None).await.unwrap();
        browser.remove_tab(TabId(1)).await.unwrap();
        assert!(browser.get_group(group).await.is_err());
    }

    #[tokio::test]
    async fn move_group_to_end() {
        let browser = MockBrowser::new();
        browser.seed_tab(make_tab(1, 1, "https://a/")).await;
        browser.seed_tab(make_tab(2, 1, "https://b/")).await;
        let g1 = browser.group_tabs(&[TabId(1)], None).await.unwrap();
        let g2 = browser.group_tabs(&[TabId(2)], None).await.unwrap();
        assert_eq!(browser.group_order_of(WindowId(1)).await, vec![g1, g2]);
        browser.move_group(g1, END_INDEX).await.unwrap();
        assert_eq!(browser.group_order_of(WindowId(1)).await, vec![g2, g1]);
    }

    #[tokio::test]
    async fn bookmarks_form_a_tree() {
        let browser = MockBrowser::new();
        let root = browser.other_bookmarks_root().await.unwrap();
        let folder = browser
            .create_bookmark(&root, "Closed Tabs", None)
            .await
            .unwrap();
        assert!(folder.is_folder());
        browser
            .create_bookmark(&folder.id, "Example", Some("https://example.com"))
            .await
            .unwrap();
        let children = browser.bookmark_children(&folder.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].url.as_deref(), Some("https://example.com"));
    }

    #[tokio::test]
    async fn missing_entities_surface_as_not_found() {
        let browser = MockBrowser::new();
        let err = browser.get_tab(TabId(99)).await.unwrap_err();
        match err {
            TabWardenError::Browser { source } => assert!(source.is_not_found()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn op_log_preserves_order() {
        let browser = MockBrowser::new();
        browser.seed_tab(make_tab(1, 1, "https://a/")).await;
        let root = browser.other_bookmarks_root().await.unwrap();
        browser
            .create_bookmark(&root, "Example", Some("https://a/"))
            .await
            .unwrap();
        browser.remove_tab(TabId(1)).await.unwrap();
        let ops = browser.ops().await;
        let bookmark_at = ops
            .iter()
            .position(|op| matches!(op, BrowserOp::CreatedBookmark { .. }))
            .unwrap();
        let remove_at = ops
            .iter()
            .position(|op| matches!(op, BrowserOp::RemovedTab { .. }))
            .unwrap();
        assert!(bookmark_at < remove_at);
    }
}
