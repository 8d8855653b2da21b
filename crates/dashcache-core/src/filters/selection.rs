use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::{Method, RequestGateway};
use crate::config::Config;

use super::{merge_selection, selection_of, FilterCatalog, PersistedSelection};

/// Where the user's filter selection lives between sessions.
pub trait SelectionStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn read(&self) -> Result<Option<PersistedSelection>>;
    fn write(&self, selection: &PersistedSelection) -> Result<()>;
}

/// JSON file store, one file per user.
pub struct FileSelectionStore {
    path: PathBuf,
}

impl FileSelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/dashcache/filters-<user>.json`
    pub fn for_user(user: &str) -> Result<Self> {
        let file = format!("filters-{}.json", sanitize_user(user));
        Ok(Self::new(Config::config_dir()?.join(file)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sanitize_user(user: &str) -> String {
    let cleaned: String = user
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

impl SelectionStore for FileSelectionStore {
    fn read(&self) -> Result<Option<PersistedSelection>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let selection = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(selection))
    }

    fn write(&self, selection: &PersistedSelection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(selection)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// Store that keeps the selection in memory. Counts writes.
#[derive(Default)]
pub struct MemorySelectionStore {
    saved: Mutex<Option<PersistedSelection>>,
    writes: Mutex<usize>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(selection: PersistedSelection) -> Self {
        Self {
            saved: Mutex::new(Some(selection)),
            writes: Mutex::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }
}

impl SelectionStore for MemorySelectionStore {
    fn read(&self) -> Result<Option<PersistedSelection>> {
        Ok(self.saved.lock().clone())
    }

    fn write(&self, selection: &PersistedSelection) -> Result<()> {
        *self.saved.lock() = Some(selection.clone());
        *self.writes.lock() += 1;
        Ok(())
    }
}

/// Controller-side filter panel state: the merged catalog plus persistence.
pub struct SearchFilters<S: SelectionStore> {
    store: S,
    saved: PersistedSelection,
    catalog: FilterCatalog,
}

impl<S: SelectionStore> SearchFilters<S> {
    /// Reads the saved selection once. A broken store starts empty.
    pub fn new(store: S) -> Self {
        let saved = match store.read() {
            Ok(saved) => saved.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Could not read saved filter selection, starting fresh");
                PersistedSelection::new()
            }
        };
        Self {
            store,
            saved,
            catalog: FilterCatalog::new(),
        }
    }

    /// Replace the catalog with a fresh one from the server and re-apply the
    /// saved selection.
    pub fn apply_catalog(&mut self, mut available: FilterCatalog) {
        for (category, predicates) in available.iter_mut() {
            for predicate in predicates.iter_mut().filter(|p| p.category.is_empty()) {
                predicate.category = category.clone();
            }
        }
        self.catalog = merge_selection(&available, &self.saved);
        debug!(categories = self.catalog.len(), "Filter catalog merged");
    }

    /// Fetch the catalog from `endpoint` and merge it.
    pub async fn refresh(&mut self, gateway: &dyn RequestGateway, endpoint: &str) -> Result<()> {
        let payload = gateway
            .send(endpoint, Method::Get, None)
            .await
            .with_context(|| format!("Failed to fetch filter catalog from {}", endpoint))?;
        let available: FilterCatalog =
            serde_json::from_value(payload).context("Filter catalog has an unexpected shape")?;
        self.apply_catalog(available);
        Ok(())
    }

    /// Flip one predicate and persist. Returns the new flag, or `None` if
    /// the predicate is not in the catalog.
    pub fn toggle(&mut self, category: &str, id: &str) -> Result<Option<bool>> {
        let Some(predicate) = self
            .catalog
            .get_mut(category)
            .and_then(|predicates| predicates.iter_mut().find(|p| p.id == id))
        else {
            return Ok(None);
        };
        predicate.is_selected = !predicate.is_selected;
        let selected = predicate.is_selected;

        self.saved
            .entry(category.to_string())
            .or_default()
            .insert(id.to_string(), selected);
        self.persist()?;
        Ok(Some(selected))
    }

    /// Deselect everything and persist.
    pub fn clear_all(&mut self) -> Result<()> {
        for predicate in self.catalog.values_mut().flatten() {
            predicate.is_selected = false;
        }
        self.saved = selection_of(&self.catalog);
        self.persist()?;
        info!("Cleared all filter selections");
        Ok(())
    }

    /// Selected ids per category. Categories with nothing selected are
    /// omitted.
    pub fn selected(&self) -> BTreeMap<String, Vec<String>> {
        self.catalog
            .iter()
            .filter_map(|(category, predicates)| {
                let ids: Vec<String> = predicates
                    .iter()
                    .filter(|p| p.is_selected)
                    .map(|p| p.id.clone())
                    .collect();
                (!ids.is_empty()).then(|| (category.clone(), ids))
            })
            .collect()
    }

    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&self) -> Result<()> {
        self.store
            .write(&self.saved)
            .context("Failed to save filter selection")
    }
}
