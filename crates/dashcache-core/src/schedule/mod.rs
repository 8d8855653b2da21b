//! Timer-driven helpers: search debouncing and periodic background refresh.
//!
//! Both spawn onto the ambient Tokio runtime and abort their task when
//! cancelled or dropped.

pub mod debounce;
pub mod refresh;

pub use debounce::{Debouncer, DEFAULT_QUIESCENCE};
pub use refresh::AutoRefreshScheduler;
