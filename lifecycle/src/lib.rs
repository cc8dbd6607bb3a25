//! Tab lifecycle scheduler core
//!
//! Classifies every open tab by idle age (green, yellow, red, gone),
//! routes aged ungrouped tabs into per-window special groups, sorts user
//! groups into colored zones, and bookmarks-then-closes gone work. The
//! [`engine::LifecycleEngine`] is the single core object: events flow in
//! through its router, evaluation cycles run under a re-entrancy guard,
//! and settings changes dispatch their side effects before the next
//! cycle.

pub mod active_time;
pub mod bookmarks;
pub mod cycle;
pub mod dispatcher;
pub mod engine;
pub mod naming;
pub mod router;
pub mod status;
pub mod tab_registry;
pub mod titles;
pub mod window_registry;

pub use active_time::ActiveTimeClock;
pub use bookmarks::{is_bookmarkable, BookmarkWriter};
pub use engine::{LifecycleEngine, ALARM_PERIOD_MS, EVAL_DEBOUNCE_MS};
pub use naming::suggest_group_name;
pub use status::{compute_status, evaluate_window, tab_age_ms, StatusChange, TransitionGates};
pub use tab_registry::TabRegistry;
pub use titles::{append_age_suffix, effective_title, format_age_suffix, strip_age_suffix};
pub use window_registry::{WindowRegistry, USER_EDIT_LOCK_MS};
