//! Bookmark writer
//!
//! Writes closed work under a named folder in "Other Bookmarks". Folder
//! resolution is resilient: the stored folder id is tried first, then a
//! title scan of "Other Bookmarks", then creation. When the live folder
//! was renamed externally, the live title is mirrored back into settings.
//! Failures here never block a tab close; the caller logs and proceeds.

use browser_connector::BrowserApi;
use data_access::StateRepository;
use std::sync::Arc;
use tab_warden_core::*;
use tracing::{debug, info, warn};

/// URLs that are never worth bookmarking.
const UNBOOKMARKABLE: &[&str] = &["about:blank", "chrome://newtab", "chrome://newtab/"];

/// Whether a URL qualifies for a bookmark.
pub fn is_bookmarkable(url: &str) -> bool {
    !url.is_empty() && !UNBOOKMARKABLE.contains(&url)
}

/// Title used for a sub-folder of a group that has no name.
pub const UNNAMED_GROUP_FOLDER: &str = "(unnamed)";

pub struct BookmarkWriter {
    browser: Arc<dyn BrowserApi>,
    repo: Arc<StateRepository>,
}

impl BookmarkWriter {
    pub fn new(browser: Arc<dyn BrowserApi>, repo: Arc<StateRepository>) -> Self {
        Self { browser, repo }
    }

    /// Resolve the configured folder, creating it if needed, and return
    /// its id. Mirrors an external rename of the live folder back into
    /// settings.
    pub async fn resolve_folder(&self, settings: &Settings) -> Result<BookmarkId> {
        let folder_name = settings.bookmark_folder_name.as_str();
        let mut state = self.repo.load_bookmark_state().await.unwrap_or_default();

        if let Some(stored_id) = state.folder_id.clone() {
            match self.browser.get_bookmark(&stored_id).await {
                Ok(node) if node.is_folder() => {
                    if node.title != folder_name {
                        self.mirror_live_title(settings, &node.title).await;
                    }
                    return Ok(stored_id);
                }
                Ok(_) => {
                    debug!(id = %stored_id.0, "stored folder id points at a non-folder");
                }
                Err(TabWardenError::Browser { source }) if source.is_not_found() => {
                    debug!(id = %stored_id.0, "stored bookmark folder vanished");
                }
                Err(err) => return Err(err),
            }
        }

        let root = self.browser.other_bookmarks_root().await?;
        let children = self.browser.bookmark_children(&root).await?;
        let folder = match children
            .into_iter()
            .find(|node| node.is_folder() && node.title == folder_name)
        {
            Some(existing) => existing,
            None => {
                info!(folder = folder_name, "creating bookmark folder");
                self.browser.create_bookmark(&root, folder_name, None).await?
            }
        };

        state.folder_id = Some(folder.id.clone());
        if let Err(err) = self.repo.save_bookmark_state(&state).await {
            warn!(error = %err, "failed to persist bookmark folder id");
        }
        Ok(folder.id)
    }

    /// The user renamed the live folder; adopt that name in settings so
    /// the two stay consistent.
    async fn mirror_live_title(&self, settings: &Settings, live_title: &str) {
        if live_title.trim().is_empty() {
            return;
        }
        let mut updated = settings.clone();
        updated.bookmark_folder_name = live_title.to_string();
        match self.repo.save_settings(&updated).await {
            Ok(()) => info!(folder = live_title, "adopted externally renamed bookmark folder"),
            Err(err) => warn!(error = %err, "failed to mirror bookmark folder rename"),
        }
    }

    /// Bookmark a single tab directly under `folder`. Unbookmarkable URLs
    /// are skipped silently; a whitespace-only title falls back to the
    /// URL.
    pub async fn write_tab(&self, folder: &BookmarkId, tab: &TabSnapshot) -> Result<()> {
        if !is_bookmarkable(&tab.url) {
            return Ok(());
        }
        let title = if tab.title.trim().is_empty() {
            tab.url.as_str()
        } else {
            tab.title.as_str()
        };
        self.browser
            .create_bookmark(folder, title, Some(&tab.url))
            .await?;
        Ok(())
    }

    /// Bookmark a whole group: a sub-folder under `folder` holding one
    /// bookmark per bookmarkable member.
    pub async fn write_group(
        &self,
        folder: &BookmarkId,
        group_title: &str,
        tabs: &[TabSnapshot],
    ) -> Result<()> {
        let folder_title = if group_title.trim().is_empty() {
            UNNAMED_GROUP_FOLDER
        } else {
            group_title
        };
        let sub_folder = self
            .browser
            .create_bookmark(folder, folder_title, None)
            .await?;
        for tab in tabs {
            if let Err(err) = self.write_tab(&sub_folder.id, tab).await {
                warn!(tab = %tab.id, error = %err, "failed to bookmark group member");
            }
        }
        Ok(())
    }
}
