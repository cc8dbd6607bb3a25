//! The evaluation cycle (C7)
//!
//! `run_cycle_inner` is the only code path that rewrites layout. It runs
//! to completion under the engine's re-entrancy guard, processing each
//! window independently through the phases: status transitions, special
//! group placement, group coloring, bookmark-then-close, zone sort,
//! trivial-group dissolution, auto-naming, and age suffixes. Individual
//! browser-call failures are logged and skipped; live state is re-read at
//! the start of every phase that depends on positions.

use crate::engine::LifecycleEngine;
use crate::naming::suggest_group_name;
use crate::status::{evaluate_window, tab_age_ms};
use crate::titles::{append_age_suffix, effective_title, strip_age_suffix};
use browser_connector::{GroupUpdate, END_INDEX};
use std::collections::{HashMap, HashSet};
use tab_warden_core::*;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

impl LifecycleEngine {
    pub(crate) async fn run_cycle_inner(&self) -> Result<()> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", id = %cycle_id);
        async {
            let windows = self.browser.query_windows().await?;
            for window in windows {
                if let Err(err) = self.run_window_cycle(window).await {
                    warn!(window = %window, error = %err, "window evaluation failed, skipping");
                }
            }
            let mut state = self.state.lock().await;
            self.flush_registries(&mut state).await;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn run_window_cycle(&self, window: WindowId) -> Result<()> {
        let settings = self.state.lock().await.settings.clone();
        let now = self.now();

        if settings.aging_enabled {
            // Phase 1: status transitions. Gone is never written to a
            // record; it only feeds the close set.
            let gone = self.apply_status_transitions(window, &settings, now).await;

            // Phase 2: route aged ungrouped tabs into the special groups.
            if settings.tab_sorting_enabled {
                self.place_aged_tabs(window, &settings, &gone).await;
            }

            // Phase 3: group statuses and colors.
            let group_statuses = self.evaluate_groups(window, &settings, &gone).await?;

            // Phase 4: bookmark-then-close.
            self.close_gone(window, &settings, &gone, &group_statuses)
                .await;

            // Phase 5: zone sort.
            if settings.tabgroup_sorting_enabled || settings.tab_sorting_enabled {
                self.zone_sort(window, &settings, &group_statuses).await;
            }
        }

        // Phase 6: dissolve trivial groups this core created.
        self.dissolve_trivial_groups(window).await;

        // Phase 7: delayed auto-naming.
        if settings.auto_group_naming_enabled {
            self.auto_name_groups(window, &settings, now).await;
        }

        // Phase 8: age-in-title suffixes.
        if settings.show_group_age_enabled && settings.aging_enabled {
            self.refresh_age_suffixes(window, &settings, now).await;
        }

        Ok(())
    }

    // --- phase 1 ---

    async fn apply_status_transitions(
        &self,
        window: WindowId,
        settings: &Settings,
        now: i64,
    ) -> HashSet<TabId> {
        let mut gone = HashSet::new();
        let mut state = self.state.lock().await;
        let active = state.active_time.current(now);
        let changes = evaluate_window(state.tabs.as_map(), window, active, now, settings);
        for change in changes {
            if change.new == TabStatus::Gone {
                gone.insert(change.tab_id);
            } else if let Some(meta) = state.tabs.get_mut(change.tab_id) {
                debug!(tab = %change.tab_id, ?change.old, ?change.new, "status transition");
                meta.status = change.new;
            }
        }
        gone
    }

    // --- phase 2 ---

    async fn place_aged_tabs(
        &self,
        window: WindowId,
        settings: &Settings,
        gone: &HashSet<TabId>,
    ) {
        let candidates: Vec<(TabId, TabStatus, Option<GroupId>, bool)> = {
            let state = self.state.lock().await;
            state
                .tabs
                .in_window(window)
                .into_iter()
                .filter(|meta| !gone.contains(&meta.tab_id))
                .filter(|meta| meta.group_id.is_none() || meta.is_special_group)
                .map(|meta| (meta.tab_id, meta.status, meta.group_id, meta.is_special_group))
                .collect()
        };

        for (tab_id, status, group_id, is_special) in candidates {
            match status {
                TabStatus::Yellow => {
                    self.ensure_in_special(window, SpecialKind::Yellow, tab_id, group_id, settings)
                        .await
                }
                TabStatus::Red => {
                    self.ensure_in_special(window, SpecialKind::Red, tab_id, group_id, settings)
                        .await
                }
                TabStatus::Green | TabStatus::Gone => {
                    if is_special {
                        self.release_from_special(window, tab_id, group_id).await;
                    }
                }
            }
        }
    }

    /// Move a tab into the window's special group of `kind`, creating the
    /// group on first use.
    async fn ensure_in_special(
        &self,
        window: WindowId,
        kind: SpecialKind,
        tab_id: TabId,
        current_group: Option<GroupId>,
        settings: &Settings,
    ) {
        // Validate the stored slot against live state.
        let slot = {
            let state = self.state.lock().await;
            state.windows.special(window, kind)
        };
        let slot = match slot {
            Some(group_id) => match self.browser.get_group(group_id).await {
                Ok(group) if group.window_id == window => Some(group_id),
                _ => {
                    let mut state = self.state.lock().await;
                    state.windows.forget_group(window, group_id);
                    None
                }
            },
            None => None,
        };

        if slot.is_some() && slot == current_group {
            return;
        }

        let joined = match slot {
            Some(group_id) => match self.browser.group_tabs(&[tab_id], Some(group_id)).await {
                Ok(_) => {
                    let mut state = self.state.lock().await;
                    state
                        .tabs
                        .on_group_membership_change(tab_id, Some(group_id), true);
                    Some(group_id)
                }
                Err(err) => {
                    warn!(tab = %tab_id, error = %err, "failed to move tab into special group");
                    None
                }
            },
            None => match self.browser.group_tabs(&[tab_id], None).await {
                Ok(group_id) => {
                    let title = settings.special_group_name(kind).to_string();
                    {
                        let mut state = self.state.lock().await;
                        state.windows.set_special(window, kind, Some(group_id));
                        state.windows.mark_expected_title_write(group_id, &title);
                        state
                            .tabs
                            .on_group_membership_change(tab_id, Some(group_id), true);
                    }
                    if let Err(err) = self
                        .browser
                        .update_group(group_id, GroupUpdate::title(title).with_color(kind.color()))
                        .await
                    {
                        warn!(group = %group_id, error = %err, "failed to dress special group");
                    }
                    Some(group_id)
                }
                Err(err) => {
                    warn!(tab = %tab_id, error = %err, "failed to create special group");
                    None
                }
            },
        };

        // The move may have emptied the other special group (yellow
        // graduating to red); drop its slot once memberless.
        if let (Some(previous), Some(joined)) = (current_group, joined) {
            if previous != joined {
                let mut state = self.state.lock().await;
                if state.windows.is_special(window, previous)
                    && state.tabs.members_of(previous).is_empty()
                {
                    state.windows.forget_group(window, previous);
                }
            }
        }
    }

    /// Take a green tab back out of a special group.
    async fn release_from_special(
        &self,
        window: WindowId,
        tab_id: TabId,
        group_id: Option<GroupId>,
    ) {
        if let Err(err) = self.browser.ungroup_tabs(&[tab_id]).await {
            warn!(tab = %tab_id, error = %err, "failed to release tab from special group");
            return;
        }
        let mut state = self.state.lock().await;
        state.tabs.on_group_membership_change(tab_id, None, false);
        if let Some(group_id) = group_id {
            if state.tabs.members_of(group_id).is_empty() {
                state.windows.forget_group(window, group_id);
            }
        }
    }

    // --- phase 3 ---

    /// Freshest status of every user group's tracked members (`None` for
    /// groups with no qualifying member), recoloring groups whose color
    /// drifted from their zone. Special groups keep their identity color.
    async fn evaluate_groups(
        &self,
        window: WindowId,
        settings: &Settings,
        gone: &HashSet<TabId>,
    ) -> Result<HashMap<GroupId, Option<TabStatus>>> {
        let groups = self.browser.query_groups(window).await?;
        let mut statuses = HashMap::new();

        for group in groups {
            let (special, freshest) = {
                let state = self.state.lock().await;
                let special = state.windows.is_special(window, group.id);
                let freshest = state
                    .tabs
                    .in_window(window)
                    .into_iter()
                    .filter(|meta| meta.group_id == Some(group.id) && !meta.is_special_group)
                    .map(|meta| {
                        if gone.contains(&meta.tab_id) {
                            TabStatus::Gone
                        } else {
                            meta.status
                        }
                    })
                    .min();
                (special, freshest)
            };
            if special {
                continue;
            }
            statuses.insert(group.id, freshest);

            if settings.tabgroup_coloring_enabled {
                if let Some(zone) = freshest.and_then(TabStatus::zone) {
                    if group.color != zone.color() {
                        if let Err(err) = self
                            .browser
                            .update_group(group.id, GroupUpdate::color(zone.color()))
                            .await
                        {
                            warn!(group = %group.id, error = %err, "failed to recolor group");
                        }
                    }
                }
            }
        }
        Ok(statuses)
    }

    // --- phase 4 ---

    /// Bookmark-then-close for gone work. Bookmark failures never block
    /// removal.
    async fn close_gone(
        &self,
        window: WindowId,
        settings: &Settings,
        gone: &HashSet<TabId>,
        group_statuses: &HashMap<GroupId, Option<TabStatus>>,
    ) {
        let groups_to_close: Vec<GroupId> = group_statuses
            .iter()
            .filter(|(_, status)| **status == Some(TabStatus::Gone))
            .map(|(id, _)| *id)
            .collect();

        // Ungrouped gone tabs and gone tabs inside the special groups
        // close individually; members of user groups only close with the
        // whole group.
        let individual: Vec<TabId> = {
            let state = self.state.lock().await;
            gone.iter()
                .copied()
                .filter(|tab_id| {
                    state
                        .tabs
                        .get(*tab_id)
                        .map(|meta| meta.group_id.is_none() || meta.is_special_group)
                        .unwrap_or(false)
                })
                .collect()
        };

        if groups_to_close.is_empty() && individual.is_empty() {
            return;
        }

        // Read URLs and titles before any removal.
        let live = match self.browser.query_tabs(Some(window)).await {
            Ok(tabs) => tabs,
            Err(err) => {
                warn!(window = %window, error = %err, "cannot snapshot tabs, deferring closure");
                return;
            }
        };
        let by_id: HashMap<TabId, &TabSnapshot> = live.iter().map(|t| (t.id, t)).collect();

        if settings.bookmark_enabled {
            match self.bookmarks.resolve_folder(settings).await {
                Ok(folder) => {
                    for group_id in &groups_to_close {
                        let title = match self.browser.get_group(*group_id).await {
                            Ok(group) => effective_title(&group.title).to_string(),
                            Err(_) => String::new(),
                        };
                        let members: Vec<TabSnapshot> = live
                            .iter()
                            .filter(|t| t.group_id == Some(*group_id))
                            .cloned()
                            .collect();
                        if let Err(err) =
                            self.bookmarks.write_group(&folder, &title, &members).await
                        {
                            warn!(group = %group_id, error = %err, "group bookmark failed");
                        }
                    }
                    for tab_id in &individual {
                        if let Some(tab) = by_id.get(tab_id) {
                            if let Err(err) = self.bookmarks.write_tab(&folder, tab).await {
                                warn!(tab = %tab_id, error = %err, "tab bookmark failed");
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "bookmark folder unavailable, closing without bookmarks")
                }
            }
        }

        let mut to_remove: Vec<TabId> = individual;
        for group_id in &groups_to_close {
            to_remove.extend(
                live.iter()
                    .filter(|t| t.group_id == Some(*group_id))
                    .map(|t| t.id),
            );
        }
        to_remove.sort();
        to_remove.dedup();

        info!(window = %window, count = to_remove.len(), "closing gone tabs");
        for tab_id in to_remove {
            match self.browser.remove_tab(tab_id).await {
                Ok(()) => {}
                Err(TabWardenError::Browser { source }) if source.is_not_found() => {}
                Err(err) => warn!(tab = %tab_id, error = %err, "tab removal failed"),
            }
            let mut state = self.state.lock().await;
            state.tabs.on_remove(tab_id);
        }

        let mut state = self.state.lock().await;
        for group_id in groups_to_close {
            state.windows.forget_group(window, group_id);
        }
        for kind in [SpecialKind::Yellow, SpecialKind::Red] {
            if let Some(group_id) = state.windows.special(window, kind) {
                if state.tabs.members_of(group_id).is_empty() {
                    state.windows.forget_group(window, group_id);
                }
            }
        }
    }

    // --- phase 5 ---

    /// Sort user groups into green/yellow/red zones and anchor the
    /// special groups at their zone boundaries.
    ///
    /// Stability: groups already in their zone keep their relative order;
    /// groups that just changed zone append at the zone's right edge. The
    /// final order is applied as a sequence of move-to-end calls, which
    /// is order-sensitive and therefore only issued when the live order
    /// differs.
    async fn zone_sort(
        &self,
        window: WindowId,
        settings: &Settings,
        group_statuses: &HashMap<GroupId, Option<TabStatus>>,
    ) {
        let live_groups = match self.browser.query_groups(window).await {
            Ok(groups) => groups,
            Err(err) => {
                warn!(window = %window, error = %err, "cannot read groups, skipping zone sort");
                return;
            }
        };

        let (yellow_slot, red_slot, old_zones) = {
            let state = self.state.lock().await;
            (
                state.windows.special(window, SpecialKind::Yellow),
                state.windows.special(window, SpecialKind::Red),
                state
                    .windows
                    .get(window)
                    .map(|w| w.group_zones.clone())
                    .unwrap_or_default(),
            )
        };
        let live_ids: Vec<GroupId> = live_groups.iter().map(|g| g.id).collect();
        let yellow_slot = yellow_slot.filter(|id| live_ids.contains(id));
        let red_slot = red_slot.filter(|id| live_ids.contains(id));

        // User groups with a zone, in live order.
        let zoned: Vec<(GroupId, Zone)> = live_ids
            .iter()
            .filter_map(|id| {
                let zone = group_statuses.get(id).copied().flatten()?.zone()?;
                Some((*id, zone))
            })
            .collect();

        let desired: Vec<GroupId> = if settings.tabgroup_sorting_enabled {
            let mut order = Vec::new();
            for zone in [Zone::Green, Zone::Yellow, Zone::Red] {
                match zone {
                    Zone::Yellow => order.extend(yellow_slot),
                    Zone::Red => order.extend(red_slot),
                    Zone::Green => {}
                }
                let incumbents = zoned
                    .iter()
                    .filter(|(id, z)| *z == zone && old_zones.get(id) == Some(&zone));
                let arrivals = zoned
                    .iter()
                    .filter(|(id, z)| *z == zone && old_zones.get(id) != Some(&zone));
                order.extend(incumbents.map(|(id, _)| *id));
                order.extend(arrivals.map(|(id, _)| *id));
            }
            order
        } else {
            // Group sorting off: user groups keep their live order, only
            // the special groups snap to their zone boundaries.
            let zone_of: HashMap<GroupId, Zone> = zoned.iter().copied().collect();
            let user_seq: Vec<GroupId> = live_ids
                .iter()
                .copied()
                .filter(|id| Some(*id) != yellow_slot && Some(*id) != red_slot)
                .collect();
            let mut order = Vec::new();
            let mut yellow_placed = yellow_slot.is_none();
            let mut red_placed = red_slot.is_none();
            for id in &user_seq {
                match zone_of.get(id) {
                    Some(Zone::Yellow) | Some(Zone::Red) if !yellow_placed => {
                        order.extend(yellow_slot);
                        yellow_placed = true;
                    }
                    _ => {}
                }
                if matches!(zone_of.get(id), Some(Zone::Red)) && !red_placed {
                    order.extend(red_slot);
                    red_placed = true;
                }
                order.push(*id);
            }
            if !yellow_placed {
                order.extend(yellow_slot);
            }
            if !red_placed {
                order.extend(red_slot);
            }
            order
        };

        let moved_set: HashSet<GroupId> = desired.iter().copied().collect();
        let current: Vec<GroupId> = live_ids
            .iter()
            .copied()
            .filter(|id| moved_set.contains(id))
            .collect();

        if current != desired {
            for group_id in &desired {
                if let Err(err) = self.browser.move_group(*group_id, END_INDEX).await {
                    warn!(group = %group_id, error = %err, "group move failed");
                }
            }
        }

        let mut state = self.state.lock().await;
        let window_state = state.windows.ensure(window);
        window_state.group_zones = zoned.into_iter().collect();
    }

    // --- phase 6 ---

    /// Ungroup the sole member of a trivial group this core created:
    /// exactly one member and no effective title. User-created and
    /// special groups are never dissolved.
    async fn dissolve_trivial_groups(&self, window: WindowId) {
        let live_groups = match self.browser.query_groups(window).await {
            Ok(groups) => groups,
            Err(err) => {
                warn!(window = %window, error = %err, "cannot read groups, skipping dissolution");
                return;
            }
        };

        for group in live_groups {
            let sole_member = {
                let state = self.state.lock().await;
                if !state.windows.is_extension_created(group.id)
                    || state.windows.is_special(window, group.id)
                    || !effective_title(&group.title).is_empty()
                {
                    continue;
                }
                let members = state.tabs.members_of(group.id);
                match members.as_slice() {
                    [sole] => *sole,
                    _ => continue,
                }
            };

            match self.browser.ungroup_tabs(&[sole_member]).await {
                Ok(()) => {
                    let mut state = self.state.lock().await;
                    state.tabs.on_group_membership_change(sole_member, None, false);
                    state.windows.forget_group(window, group.id);
                    debug!(group = %group.id, "dissolved trivial group");
                }
                Err(err) => warn!(group = %group.id, error = %err, "dissolution failed"),
            }
        }
    }

    // --- phase 7 ---

    /// Suggest names for groups that stayed unnamed past the configured
    /// delay, unless a recent user edit locks them.
    async fn auto_name_groups(&self, window: WindowId, settings: &Settings, now: i64) {
        let live_groups = match self.browser.query_groups(window).await {
            Ok(groups) => groups,
            Err(err) => {
                warn!(window = %window, error = %err, "cannot read groups, skipping naming");
                return;
            }
        };
        let live_tabs = match self.browser.query_tabs(Some(window)).await {
            Ok(tabs) => tabs,
            Err(err) => {
                warn!(window = %window, error = %err, "cannot read tabs, skipping naming");
                return;
            }
        };

        for group in live_groups {
            let last_candidate = {
                let mut state = self.state.lock().await;
                if state.windows.is_special(window, group.id) {
                    continue;
                }
                if !effective_title(&group.title).is_empty() {
                    // Named: reset the unnamed timer.
                    state.windows.naming_mut(window, group.id).first_unnamed_seen_at = None;
                    continue;
                }
                let naming = state.windows.naming_mut(window, group.id);
                let Some(first_seen) = naming.first_unnamed_seen_at else {
                    naming.first_unnamed_seen_at = Some(now);
                    continue;
                };
                if now - first_seen < settings.auto_name_delay_ms() {
                    continue;
                }
                if naming.user_edit_lock_until.map_or(false, |until| until > now) {
                    continue;
                }
                naming.last_candidate.clone()
            };

            let members: Vec<TabSnapshot> = live_tabs
                .iter()
                .filter(|t| t.group_id == Some(group.id))
                .cloned()
                .collect();
            let Some(candidate) = suggest_group_name(&members) else {
                continue;
            };
            if last_candidate.as_deref() == Some(candidate.as_str()) {
                continue;
            }

            {
                let mut state = self.state.lock().await;
                state.windows.mark_expected_title_write(group.id, &candidate);
                let naming = state.windows.naming_mut(window, group.id);
                naming.last_auto_named_at = Some(now);
                naming.last_candidate = Some(candidate.clone());
                naming.first_unnamed_seen_at = None;
            }
            match self
                .browser
                .update_group(group.id, GroupUpdate::title(candidate.clone()))
                .await
            {
                Ok(_) => info!(group = %group.id, name = %candidate, "auto-named group"),
                Err(err) => warn!(group = %group.id, error = %err, "auto-name write failed"),
            }
        }
    }

    // --- phase 8 ---

    /// Keep every user group's title suffixed with the freshest member's
    /// age, replacing any previous suffix.
    async fn refresh_age_suffixes(&self, window: WindowId, settings: &Settings, now: i64) {
        let live_groups = match self.browser.query_groups(window).await {
            Ok(groups) => groups,
            Err(err) => {
                warn!(window = %window, error = %err, "cannot read groups, skipping age suffixes");
                return;
            }
        };

        for group in live_groups {
            let freshest_age = {
                let state = self.state.lock().await;
                if state.windows.is_special(window, group.id) {
                    continue;
                }
                let active = state.active_time.current(now);
                state
                    .tabs
                    .in_window(window)
                    .into_iter()
                    .filter(|meta| meta.group_id == Some(group.id) && !meta.is_special_group)
                    .map(|meta| tab_age_ms(meta, settings, active, now))
                    .min()
            };
            let Some(age) = freshest_age else {
                continue;
            };

            let desired = append_age_suffix(strip_age_suffix(&group.title), age);
            if desired == group.title {
                continue;
            }
            {
                let mut state = self.state.lock().await;
                state.windows.mark_expected_title_write(group.id, &desired);
            }
            if let Err(err) = self
                .browser
                .update_group(group.id, GroupUpdate::title(desired))
                .await
            {
                warn!(group = %group.id, error = %err, "age suffix write failed");
            }
        }
    }
}
