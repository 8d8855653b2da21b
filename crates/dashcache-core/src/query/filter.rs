use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Resource;
use crate::utils::contains_ignore_case;

/// Category value meaning "no filter", as sent by select boxes.
const ALL_SENTINEL: &str = "all";

fn is_cleared(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(ALL_SENTINEL)
}

/// Active filters of a service. Only filters that restrict the view are
/// stored, so an empty state is the identity filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.search_term().is_none() && self.fields.is_empty()
    }

    /// Lowercased, trimmed search term, or `None` when search is off.
    pub fn search_term(&self) -> Option<String> {
        let term = self.search.trim();
        if term.is_empty() {
            None
        } else {
            Some(term.to_lowercase())
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Merge `patch` into this state, last write wins per key.
    pub fn apply_patch(&mut self, patch: FilterPatch) {
        if let Some(search) = patch.search {
            self.search = search;
        }
        for (name, value) in patch.fields {
            match value {
                Some(value) if !is_cleared(&value) => {
                    self.fields.insert(name, value);
                }
                _ => {
                    self.fields.remove(&name);
                }
            }
        }
    }
}

/// Partial filter update for [`crate::service::ResourceService::set_filters`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    search: Option<String>,
    fields: BTreeMap<String, Option<String>>,
}

impl FilterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Filter `name` to equal `value`. An empty value or `all` clears it.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), Some(value.into()));
        self
    }

    pub fn clear(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.fields.is_empty()
    }
}

/// Whether `item` passes every active filter.
pub fn matches_filters<R: Resource>(item: &R, filters: &FilterState) -> bool {
    let fields_match = filters
        .fields
        .iter()
        .all(|(name, wanted)| item.field(name).as_deref() == Some(wanted.as_str()));
    if !fields_match {
        return false;
    }

    match filters.search_term() {
        None => true,
        Some(term) => R::SEARCH_FIELDS.iter().any(|name| {
            item.field(name)
                .map(|value| contains_ignore_case(&value, &term))
                .unwrap_or(false)
        }),
    }
}

/// Filtered copy of `items`, order preserved.
pub fn apply_filters<R: Resource>(items: &[R], filters: &FilterState) -> Vec<R> {
    if filters.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| matches_filters(*item, filters))
        .cloned()
        .collect()
}
