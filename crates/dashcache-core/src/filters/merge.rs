use super::{FilterCatalog, PersistedSelection};

/// Overlay the `isSelected` flags from `saved` onto `available`.
///
/// Only categories and ids present in `available` survive. Ids that `saved`
/// does not mention keep the server default. Neither input is modified.
pub fn merge(available: &FilterCatalog, saved: &FilterCatalog) -> FilterCatalog {
    merge_selection(available, &selection_of(saved))
}

/// [`merge`] against the compact persisted form.
pub fn merge_selection(available: &FilterCatalog, saved: &PersistedSelection) -> FilterCatalog {
    available
        .iter()
        .map(|(category, predicates)| {
            let picked = saved.get(category);
            let merged = predicates
                .iter()
                .map(|predicate| {
                    let mut predicate = predicate.clone();
                    if let Some(&selected) = picked.and_then(|p| p.get(&predicate.id)) {
                        predicate.is_selected = selected;
                    }
                    predicate
                })
                .collect();
            (category.clone(), merged)
        })
        .collect()
}

/// Compact `{category -> {id -> selected}}` view of a catalog.
pub fn selection_of(catalog: &FilterCatalog) -> PersistedSelection {
    catalog
        .iter()
        .map(|(category, predicates)| {
            let flags = predicates
                .iter()
                .map(|p| (p.id.clone(), p.is_selected))
                .collect();
            (category.clone(), flags)
        })
        .collect()
}
