//! Active-time accumulator
//!
//! A monotonically non-decreasing millisecond counter that advances only
//! while some browser window has focus. The accumulator itself is plain
//! state; persistence happens at every focus change and evaluation tick
//! through the engine, and store failures never stop the clock.

use tab_warden_core::{ActiveTimeState, WindowId};

/// The focus-time clock (C1).
#[derive(Debug, Clone, Default)]
pub struct ActiveTimeClock {
    state: ActiveTimeState,
}

impl ActiveTimeClock {
    /// Rebuild the clock from its persisted state after a host-process
    /// start.
    ///
    /// If a focus span was open when the process died, the user was
    /// probably focused during the gap: the whole `now - last_persisted_at`
    /// interval is credited and a new span starts at `now`. A closed span
    /// credits nothing.
    pub fn recover(mut stored: ActiveTimeState, now_ms: i64) -> Self {
        if stored.focus_start_time.is_some() {
            let gap = (now_ms - stored.last_persisted_at).max(0);
            stored.accumulated_ms += gap;
            stored.focus_start_time = Some(now_ms);
        }
        stored.last_persisted_at = now_ms;
        Self { state: stored }
    }

    /// Current reading: the accumulator plus the open focus span, if any.
    pub fn current(&self, now_ms: i64) -> i64 {
        let open = match self.state.focus_start_time {
            Some(start) => (now_ms - start).max(0),
            None => 0,
        };
        self.state.accumulated_ms + open
    }

    /// Fold the previous focus span into the accumulator and open a new
    /// one if `new_window` is a real window.
    pub fn handle_focus_change(&mut self, new_window: Option<WindowId>, now_ms: i64) {
        if let Some(start) = self.state.focus_start_time.take() {
            self.state.accumulated_ms += (now_ms - start).max(0);
        }
        self.state.focus_start_time = new_window.map(|_| now_ms);
    }

    /// Snapshot for persistence, stamping `last_persisted_at`.
    pub fn snapshot(&mut self, now_ms: i64) -> ActiveTimeState {
        self.state.last_persisted_at = now_ms;
        self.state.clone()
    }

    pub fn is_focused(&self) -> bool {
        self.state.focus_start_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_only_while_focused() {
        let mut clock = ActiveTimeClock::default();
        assert_eq!(clock.current(1_000), 0);

        clock.handle_focus_change(Some(WindowId(1)), 1_000);
        assert_eq!(clock.current(3_500), 2_500);

        clock.handle_focus_change(None, 3_500);
        assert_eq!(clock.current(9_999), 2_500);

        clock.handle_focus_change(Some(WindowId(2)), 10_000);
        assert_eq!(clock.current(10_100), 2_600);
    }

    #[test]
    fn focus_switch_between_windows_keeps_counting() {
        let mut clock = ActiveTimeClock::default();
        clock.handle_focus_change(Some(WindowId(1)), 0);
        clock.handle_focus_change(Some(WindowId(2)), 400);
        assert_eq!(clock.current(1_000), 1_000);
    }

    #[test]
    fn recover_credits_gap_when_focus_was_open() {
        let stored = ActiveTimeState {
            accumulated_ms: 5_000,
            focus_start_time: Some(7_000),
            last_persisted_at: 8_000,
        };
        let clock = ActiveTimeClock::recover(stored, 20_000);
        // 12 000 ms gap credited, new span open from 20 000.
        assert_eq!(clock.current(20_000), 17_000);
        assert!(clock.is_focused());
        assert_eq!(clock.current(21_000), 18_000);
    }

    #[test]
    fn recover_credits_nothing_when_unfocused() {
        let stored = ActiveTimeState {
            accumulated_ms: 5_000,
            focus_start_time: None,
            last_persisted_at: 8_000,
        };
        let clock = ActiveTimeClock::recover(stored, 20_000);
        assert_eq!(clock.current(20_000), 5_000);
        assert!(!clock.is_focused());
    }

    #[test]
    fn snapshot_stamps_persistence_time() {
        let mut clock = ActiveTimeClock::default();
        clock.handle_focus_change(Some(WindowId(1)), 100);
        let snapshot = clock.snapshot(600);
        assert_eq!(snapshot.last_persisted_at, 600);
        assert_eq!(snapshot.focus_start_time, Some(100));
    }
}
