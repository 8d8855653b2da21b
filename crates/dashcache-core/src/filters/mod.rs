//! Filter catalogs and the user's persisted selection.
//!
//! The server sends a fresh [`FilterCatalog`] with default `isSelected`
//! flags; [`merge`] overlays what the user picked last time and
//! [`SearchFilters`] keeps that selection on disk between sessions.

mod merge;
mod selection;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use merge::{merge, merge_selection, selection_of};
pub use selection::{FileSelectionStore, MemorySelectionStore, SearchFilters, SelectionStore};

/// One selectable filter. Identity is `(category, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "isSelected", default)]
    pub is_selected: bool,
}

/// Category name to its predicates, in server order.
pub type FilterCatalog = BTreeMap<String, Vec<FilterPredicate>>;

/// Category name to `{ predicate id -> selected }`.
pub type PersistedSelection = BTreeMap<String, BTreeMap<String, bool>>;
