//! Time-boxed response caching.
//!
//! This module provides the `CacheStore` used by resource services for
//! secondary queries. Entries are valid for a fixed time-to-live (30 seconds
//! by default) and staleness is decided when an entry is read, so no
//! background sweeper is needed.

pub mod store;

pub use store::{CacheEntry, CacheStore, DEFAULT_TTL};
