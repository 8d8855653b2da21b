//! Utility functions for string matching and formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{cmp_ignore_case, contains_ignore_case, truncate_string};
