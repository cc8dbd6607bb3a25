//! Pure status evaluation (C5)
//!
//! Age thresholds use strict `<` below a boundary: a tab whose age equals
//! `green_to_yellow_ms` is already yellow. Disabling a transition caps the
//! computed status at the transition's source state.

use std::collections::HashMap;
use tab_warden_core::{Settings, TabId, TabMeta, TabStatus, Thresholds, TimeMode, WindowId};

/// Per-transition enable flags, lifted out of the settings blob.
#[derive(Debug, Clone, Copy)]
pub struct TransitionGates {
    pub green_to_yellow: bool,
    pub yellow_to_red: bool,
    pub red_to_gone: bool,
}

impl From<&Settings> for TransitionGates {
    fn from(settings: &Settings) -> Self {
        Self {
            green_to_yellow: settings.green_to_yellow_enabled,
            yellow_to_red: settings.yellow_to_red_enabled,
            red_to_gone: settings.red_to_gone_enabled,
        }
    }
}

/// Map an age to a status under the given thresholds and gates.
pub fn compute_status(age_ms: i64, thresholds: &Thresholds, gates: &TransitionGates) -> TabStatus {
    if age_ms < thresholds.green_to_yellow_ms || !gates.green_to_yellow {
        return TabStatus::Green;
    }
    if age_ms < thresholds.yellow_to_red_ms || !gates.yellow_to_red {
        return TabStatus::Yellow;
    }
    if age_ms < thresholds.red_to_gone_ms || !gates.red_to_gone {
        return TabStatus::Red;
    }
    TabStatus::Gone
}

/// A tab's age in milliseconds under the configured time base.
pub fn tab_age_ms(meta: &TabMeta, settings: &Settings, current_active_ms: i64, now_wall_ms: i64) -> i64 {
    let age = match settings.time_mode {
        TimeMode::Active => current_active_ms - meta.refresh_active_time,
        TimeMode::Wallclock => now_wall_ms - meta.refresh_wall_time,
    };
    age.max(0)
}

/// One status transition reported by [`evaluate_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub tab_id: TabId,
    pub old: TabStatus,
    pub new: TabStatus,
}

/// Evaluate every tracked tab of `window`, returning only the tabs whose
/// status changed. Pinned tabs never enter the registry, so there is
/// nothing to skip here.
pub fn evaluate_window(
    tab_meta: &HashMap<TabId, TabMeta>,
    window: WindowId,
    current_active_ms: i64,
    now_wall_ms: i64,
    settings: &Settings,
) -> Vec<StatusChange> {
    let gates = TransitionGates::from(settings);
    let mut changes: Vec<StatusChange> = tab_meta
        .values()
        .filter(|meta| meta.window_id == window)
        .filter_map(|meta| {
            let age = tab_age_ms(meta, settings, current_active_ms, now_wall_ms);
            let new = compute_status(age, &settings.thresholds, &gates);
            (new != meta.status).then_some(StatusChange {
                tab_id: meta.tab_id,
                old: meta.status,
                new,
            })
        })
        .collect();
    changes.sort_by_key(|c| c.tab_id);
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds {
            green_to_yellow_ms: 2_000,
            yellow_to_red_ms: 4_000,
            red_to_gone_ms: 6_000,
        }
    }

    fn all_gates() -> TransitionGates {
        TransitionGates {
            green_to_yellow: true,
            yellow_to_red: true,
            red_to_gone: true,
        }
    }

    #[test]
    fn boundaries_are_inclusive_above() {
        let t = thresholds();
        let g = all_gates();
        assert_eq!(compute_status(0, &t, &g), TabStatus::Green);
        assert_eq!(compute_status(1_999, &t, &g), TabStatus::Green);
        assert_eq!(compute_status(2_000, &t, &g), TabStatus::Yellow);
        assert_eq!(compute_status(3_999, &t, &g), TabStatus::Yellow);
        assert_eq!(compute_status(4_000, &t, &g), TabStatus::Red);
        assert_eq!(compute_status(5_999, &t, &g), TabStatus::Red);
        assert_eq!(compute_status(6_000, &t, &g), TabStatus::Gone);
    }

    #[test]
    fn disabled_gate_caps_at_source_state() {
        let t = thresholds();
        let mut g = all_gates();
        g.green_to_yellow = false;
        assert_eq!(compute_status(1_000_000, &t, &g), TabStatus::Green);

        let mut g = all_gates();
        g.yellow_to_red = false;
        assert_eq!(compute_status(1_000_000, &t, &g), TabStatus::Yellow);

        let mut g = all_gates();
        g.red_to_gone = false;
        assert_eq!(compute_status(1_000_000, &t, &g), TabStatus::Red);
    }

    fn meta(id: i64, window: i64, refresh_active: i64, refresh_wall: i64) -> TabMeta {
        TabMeta {
            tab_id: TabId(id),
            window_id: WindowId(window),
            url: format!("https://tab{id}/"),
            refresh_active_time: refresh_active,
            refresh_wall_time: refresh_wall,
            status: TabStatus::Green,
            group_id: None,
            is_special_group: false,
        }
    }

    #[test]
    fn active_mode_uses_active_clock() {
        let mut settings = Settings::default();
        settings.thresholds = thresholds();
        settings.time_mode = TimeMode::Active;

        let mut tabs = HashMap::new();
        tabs.insert(TabId(1), meta(1, 1, 0, 0));

        // Wall clock far ahead; active clock still green.
        let changes = evaluate_window(&tabs, WindowId(1), 1_000, 999_999, &settings);
        assert!(changes.is_empty());

        let changes = evaluate_window(&tabs, WindowId(1), 2_500, 999_999, &settings);
        assert_eq!(
            changes,
            vec![StatusChange {
                tab_id: TabId(1),
                old: TabStatus::Green,
                new: TabStatus::Yellow,
            }]
        );
    }

    #[test]
    fn wallclock_mode_uses_wall_clock() {
        let mut settings = Settings::default();
        settings.thresholds = thresholds();
        settings.time_mode = TimeMode::Wallclock;

        let mut tabs = HashMap::new();
        tabs.insert(TabId(1), meta(1, 1, 0, 10_000));

        let changes = evaluate_window(&tabs, WindowId(1), 0, 14_500, &settings);
        assert_eq!(changes[0].new, TabStatus::Red);
    }

    #[test]
    fn only_changed_tabs_are_reported() {
        let mut settings = Settings::default();
        settings.thresholds = thresholds();

        let mut tabs = HashMap::new();
        tabs.insert(TabId(1), meta(1, 1, 0, 0));
        let mut yellow = meta(2, 1, 0, 0);
        yellow.status = TabStatus::Yellow;
        tabs.insert(TabId(2), yellow);

        // Both are aged to yellow; only tab 1 changed.
        let changes = evaluate_window(&tabs, WindowId(1), 3_000, 3_000, &settings);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].tab_id, TabId(1));
    }

    #[test]
    fn other_windows_are_ignored() {
        let mut settings = Settings::default();
        settings.thresholds = thresholds();
        let mut tabs = HashMap::new();
        tabs.insert(TabId(1), meta(1, 2, 0, 0));
        assert!(evaluate_window(&tabs, WindowId(1), 10_000, 10_000, &settings).is_empty());
    }
}
