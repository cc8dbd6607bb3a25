//! Reactive settings dispatcher (C8)
//!
//! Compares the pre- and post-change settings blobs and runs the
//! immediate side effects before chaining into an evaluation cycle. The
//! final request is serialized behind any in-flight cycle by the
//! engine's re-entrancy guard.

use crate::engine::LifecycleEngine;
use crate::titles::strip_age_suffix;
use browser_connector::GroupUpdate;
use tab_warden_core::*;
use tracing::{info, warn};

/// Grace added on top of the gone threshold when capping ages.
const AGE_CAP_GRACE_MS: i64 = 60_000;

impl LifecycleEngine {
    /// Apply a settings change: swap the cached blob, run the
    /// side-effect table, then request an evaluation.
    pub async fn apply_settings_change(&self, old: Option<&Settings>, new: &Settings) {
        let old = {
            let mut state = self.state.lock().await;
            let old = old.cloned().unwrap_or_else(|| state.settings.clone());
            state.settings = new.clone();
            old
        };

        if !old.aging_enabled && new.aging_enabled {
            self.cap_ages(new).await;
        }

        if old.tab_sorting_enabled && !new.tab_sorting_enabled {
            self.dissolve_special_groups().await;
        }

        if old.yellow_group_name != new.yellow_group_name {
            self.retitle_special_groups(SpecialKind::Yellow, &new.yellow_group_name)
                .await;
        }
        if old.red_group_name != new.red_group_name {
            self.retitle_special_groups(SpecialKind::Red, &new.red_group_name)
                .await;
        }

        if old.show_group_age_enabled && !new.show_group_age_enabled {
            self.strip_all_age_suffixes().await;
        }

        {
            let mut state = self.state.lock().await;
            self.flush_registries(&mut state).await;
        }
        self.request_eval(false).await;
    }

    /// Age cap on aging resume: no tab may look older than the gone
    /// threshold plus one minute of grace, on either time base.
    async fn cap_ages(&self, settings: &Settings) {
        let now = self.now();
        let mut state = self.state.lock().await;
        let active = state.active_time.current(now);
        let wall_cap = now - (settings.thresholds.red_to_gone_ms + AGE_CAP_GRACE_MS);
        let active_cap = active - (settings.thresholds.red_to_gone_ms + AGE_CAP_GRACE_MS);

        let ids: Vec<TabId> = state.tabs.as_map().keys().copied().collect();
        let mut capped = 0usize;
        for tab_id in ids {
            if let Some(meta) = state.tabs.get_mut(tab_id) {
                let before = (meta.refresh_wall_time, meta.refresh_active_time);
                meta.refresh_wall_time = meta.refresh_wall_time.max(wall_cap);
                meta.refresh_active_time = meta.refresh_active_time.max(active_cap);
                if (meta.refresh_wall_time, meta.refresh_active_time) != before {
                    capped += 1;
                }
            }
        }
        if capped > 0 {
            info!(capped, "capped tab ages on aging resume");
        }
    }

    /// Tab sorting turned off: empty both special groups in every window
    /// and clear their slots. The loose tabs keep their statuses.
    async fn dissolve_special_groups(&self) {
        let slots: Vec<(WindowId, SpecialKind, GroupId)> = {
            let state = self.state.lock().await;
            state
                .windows
                .as_map()
                .iter()
                .flat_map(|(window, window_state)| {
                    [SpecialKind::Yellow, SpecialKind::Red]
                        .into_iter()
                        .filter_map(move |kind| {
                            window_state
                                .special_groups
                                .get(kind)
                                .map(|group| (*window, kind, group))
                        })
                })
                .collect()
        };

        for (window, kind, group_id) in slots {
            let members = {
                let state = self.state.lock().await;
                state.tabs.members_of(group_id)
            };
            if !members.is_empty() {
                if let Err(err) = self.browser.ungroup_tabs(&members).await {
                    warn!(group = %group_id, error = %err, "failed to empty special group");
                }
            }
            let mut state = self.state.lock().await;
            for member in members {
                state.tabs.on_group_membership_change(member, None, false);
            }
            state.windows.forget_group(window, group_id);
            info!(window = %window, ?kind, "dissolved special group");
        }
    }

    /// A special-group name changed in settings: push the new title to
    /// every live slot of that kind.
    async fn retitle_special_groups(&self, kind: SpecialKind, title: &str) {
        let slots: Vec<GroupId> = {
            let state = self.state.lock().await;
            state
                .windows
                .as_map()
                .values()
                .filter_map(|window_state| window_state.special_groups.get(kind))
                .collect()
        };
        for group_id in slots {
            {
                let mut state = self.state.lock().await;
                state.windows.mark_expected_title_write(group_id, title);
            }
            if let Err(err) = self
                .browser
                .update_group(group_id, GroupUpdate::title(title))
                .await
            {
                warn!(group = %group_id, error = %err, "failed to retitle special group");
            }
        }
    }

    /// One-shot sweep stripping the age suffix from every group title
    /// when the toggle turns off.
    async fn strip_all_age_suffixes(&self) {
        let windows = match self.browser.query_windows().await {
            Ok(windows) => windows,
            Err(err) => {
                warn!(error = %err, "cannot list windows for suffix sweep");
                return;
            }
        };
        for window in windows {
            let groups = match self.browser.query_groups(window).await {
                Ok(groups) => groups,
                Err(err) => {
                    warn!(window = %window, error = %err, "cannot list groups for suffix sweep");
                    continue;
                }
            };
            for group in groups {
                let stripped = strip_age_suffix(&group.title);
                if stripped == group.title {
                    continue;
                }
                let stripped = stripped.to_string();
                {
                    let mut state = self.state.lock().await;
                    state.windows.mark_expected_title_write(group.id, &stripped);
                }
                if let Err(err) = self
                    .browser
                    .update_group(group.id, GroupUpdate::title(stripped))
                    .await
                {
                    warn!(group = %group.id, error = %err, "suffix strip failed");
                }
            }
        }
    }
}
