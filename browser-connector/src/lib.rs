//! Browser surface abstraction for the tab lifecycle manager
//!
//! The core never talks to a concrete browser directly; it goes through
//! the [`BrowserApi`] trait. The in-memory [`mock::MockBrowser`] implements
//! the same contract for tests, including an operation log so ordering
//! guarantees (bookmark-before-close, move-to-end sequences) can be
//! asserted.

pub mod mock;
pub mod traits;

pub use traits::*;
