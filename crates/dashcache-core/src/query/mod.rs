//! In-memory querying over a service's authoritative collection.
//!
//! - `filter`: conjunction of category equality filters and free-text search
//! - `paginate`: fixed-size page slicing with navigation metadata

pub mod filter;
pub mod paginate;

pub use filter::{apply_filters, matches_filters, FilterPatch, FilterState};
pub use paginate::{paginate, PageInfo, PaginationResult};
