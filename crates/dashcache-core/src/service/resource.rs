//! Generic read-through, write-through service over one remote collection.
//!
//! A `ResourceService` owns the authoritative in-memory copy of a collection,
//! the filtered view derived from it, a response cache for secondary queries
//! and the subscriber list. Loads replace the collection wholesale; successful
//! mutations patch it in place. Nothing is patched until the gateway has
//! confirmed the write.
//!
//! State lives behind a mutex that is never held across an await or while
//! subscribers run, so every transition is complete before anyone can
//! observe it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{Method, RequestGateway};
use crate::bus::{NotificationBus, Subscription};
use crate::cache::CacheStore;
use crate::config::ServiceOptions;
use crate::models::{Resource, ResourceId};
use crate::query::{apply_filters, paginate, FilterPatch, FilterState, PaginationResult};
use crate::schedule::{AutoRefreshScheduler, Debouncer};

use super::{Operation, ServiceError, ServiceEvent, ServiceState};

struct State<R> {
    phase: ServiceState,
    items: Vec<R>,
    view: Vec<R>,
    filters: FilterState,
    page: usize,
    loaded: bool,
    load_generation: u64,
}

impl<R: Resource> State<R> {
    fn new() -> Self {
        Self {
            phase: ServiceState::Idle,
            items: Vec::new(),
            view: Vec::new(),
            filters: FilterState::default(),
            page: 1,
            loaded: false,
            load_generation: 0,
        }
    }

    fn stable_phase(&self) -> ServiceState {
        if self.loaded {
            ServiceState::Ready
        } else {
            ServiceState::Idle
        }
    }

    fn refilter(&mut self) {
        self.view = apply_filters(&self.items, &self.filters);
    }

    fn position(&self, id: &ResourceId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Append a created record. Ids stay unique: if the server hands back an
    /// id the collection already holds, that record is replaced.
    fn insert_created(&mut self, record: R) {
        match self.position(record.id()) {
            Some(index) => {
                warn!(
                    kind = R::KIND,
                    id = %record.id(),
                    "Created record reuses an existing id, replacing it"
                );
                self.items[index] = record;
            }
            None => self.items.push(record),
        }
    }
}

struct Shared<R: Resource> {
    gateway: Arc<dyn RequestGateway>,
    cache: CacheStore,
    bus: NotificationBus<ServiceEvent<R>>,
    state: Mutex<State<R>>,
    active: AtomicBool,
    debouncer: Debouncer,
    refresher: AutoRefreshScheduler,
}

/// Returns the service to its stable phase if the operation that set `phase`
/// is dropped before it reaches its commit point (aborted refresh tick,
/// timed-out caller). A load only restores while it is still the latest load.
struct PhaseGuard<'a, R: Resource> {
    shared: &'a Shared<R>,
    phase: ServiceState,
    load_generation: Option<u64>,
    armed: bool,
}

impl<'a, R: Resource> PhaseGuard<'a, R> {
    fn enter(shared: &'a Shared<R>, phase: ServiceState) -> (Self, u64) {
        let generation = {
            let mut state = shared.state.lock();
            if phase == ServiceState::Loading {
                state.load_generation += 1;
            }
            state.phase = phase;
            state.load_generation
        };
        let guard = Self {
            shared,
            phase,
            load_generation: (phase == ServiceState::Loading).then_some(generation),
            armed: true,
        };
        (guard, generation)
    }

    /// The operation reached its commit point and settles the phase itself.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<R: Resource> Drop for PhaseGuard<'_, R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.state.lock();
        let owns_phase = state.phase == self.phase
            && self
                .load_generation
                .map_or(true, |generation| generation == state.load_generation);
        if owns_phase {
            state.phase = state.stable_phase();
            debug!(kind = R::KIND, phase = ?state.phase, "Abandoned operation, phase restored");
        }
    }
}

/// Clone is cheap: clones share the same collection, cache and subscribers.
pub struct ResourceService<R: Resource> {
    shared: Arc<Shared<R>>,
}

impl<R: Resource> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Resource> ResourceService<R> {
    pub fn new(gateway: Arc<dyn RequestGateway>, options: ServiceOptions) -> Self {
        Self::with_cache(gateway, CacheStore::new(options.cache_ttl), options)
    }

    pub fn with_cache(
        gateway: Arc<dyn RequestGateway>,
        cache: CacheStore,
        options: ServiceOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                gateway,
                cache,
                bus: NotificationBus::new(),
                state: Mutex::new(State::new()),
                active: AtomicBool::new(true),
                debouncer: Debouncer::new(options.debounce),
                refresher: AutoRefreshScheduler::new(),
            }),
        }
    }

    // =========================================================================
    // Subscriptions and snapshots
    // =========================================================================

    pub fn subscribe<F>(&self, callback: F) -> Subscription<ServiceEvent<R>>
    where
        F: Fn(&ServiceEvent<R>) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(callback)
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ServiceState {
        self.shared.state.lock().phase
    }

    /// Snapshot of the authoritative collection.
    pub fn items(&self) -> Vec<R> {
        self.shared.state.lock().items.clone()
    }

    /// Snapshot of the filtered view.
    pub fn filtered(&self) -> Vec<R> {
        self.shared.state.lock().view.clone()
    }

    pub fn filters(&self) -> FilterState {
        self.shared.state.lock().filters.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &ResourceId) -> Option<R> {
        let state = self.shared.state.lock();
        state.position(id).map(|index| state.items[index].clone())
    }

    /// Run `f` over the authoritative collection without cloning it.
    pub fn with_items<T>(&self, f: impl FnOnce(&[R]) -> T) -> T {
        f(&self.shared.state.lock().items)
    }

    pub fn current_page(&self) -> usize {
        self.shared.state.lock().page
    }

    pub fn set_page(&self, page: usize) {
        self.shared.state.lock().page = page.max(1);
    }

    /// Page of the filtered view. Read-only.
    pub fn get_paginated(&self, page: usize, limit: usize) -> PaginationResult<R> {
        paginate(&self.shared.state.lock().view, page, limit)
    }

    /// The current page of the filtered view.
    pub fn current_page_of(&self, limit: usize) -> PaginationResult<R> {
        let state = self.shared.state.lock();
        paginate(&state.view, state.page, limit)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Fetch the full collection and replace the authoritative copy.
    ///
    /// Returns the collection size. If a later `load` started before this one
    /// finished, this result is discarded and the later one wins.
    pub async fn load(&self) -> Result<usize, ServiceError> {
        self.ensure_active()?;
        let (guard, generation) = PhaseGuard::enter(&self.shared, ServiceState::Loading);
        debug!(kind = R::KIND, generation, "Loading collection");

        let result = match self.shared.gateway.send(R::ENDPOINT, Method::Get, None).await {
            Ok(payload) => decode_list::<R>(payload),
            Err(e) => Err(e.into()),
        };
        guard.disarm();

        if !self.is_active() {
            debug!(kind = R::KIND, generation, "Service shut down during load, dropping result");
            return Err(ServiceError::Inactive);
        }

        let mut state = self.shared.state.lock();
        if state.load_generation != generation {
            debug!(
                kind = R::KIND,
                generation,
                latest = state.load_generation,
                "Discarding superseded load"
            );
            return result.map(|_| state.items.len());
        }

        match result {
            Ok(items) => {
                state.items = items;
                state.loaded = true;
                state.phase = ServiceState::Ready;
                state.refilter();
                let total = state.items.len();
                let event = ServiceEvent::Loaded {
                    total,
                    view: state.view.clone(),
                };
                drop(state);

                info!(kind = R::KIND, total, "Collection loaded");
                self.emit(&event);
                Ok(total)
            }
            Err(err) => {
                state.phase = state.stable_phase();
                drop(state);
                self.emit_error(Operation::Load, &err);
                Err(err)
            }
        }
    }

    /// Drop this service's cached responses and reload.
    pub async fn refresh(&self) -> Result<usize, ServiceError> {
        let dropped = self.shared.cache.remove_prefix(&Self::cache_prefix());
        debug!(kind = R::KIND, dropped, "Cache cleared for refresh");
        self.load().await
    }

    /// Read-through GET of `{endpoint}{path}` for secondary queries.
    pub async fn fetch_cached(&self, path: &str) -> Result<Value, ServiceError> {
        self.ensure_active()?;
        let key = Self::cache_key(path);
        if let Some(hit) = self.shared.cache.get(&key) {
            debug!(key = %key, "Serving from cache");
            return Ok(hit);
        }

        let endpoint = format!("{}{}", R::ENDPOINT, path);
        match self.shared.gateway.send(&endpoint, Method::Get, None).await {
            Ok(payload) => {
                if self.is_active() {
                    self.shared.cache.set(key, payload.clone());
                }
                Ok(payload)
            }
            Err(e) => {
                let err = ServiceError::from(e);
                self.emit_error(Operation::Query, &err);
                Err(err)
            }
        }
    }

    /// Fetch one record by id through the cache.
    pub async fn fetch_one(&self, id: &ResourceId) -> Result<R, ServiceError> {
        let payload = self.fetch_cached(&format!("/{}", id)).await?;
        Ok(serde_json::from_value(unwrap_envelope(payload))?)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// POST `draft` and append the created record on success.
    pub async fn create<D>(&self, draft: &D) -> Result<R, ServiceError>
    where
        D: Serialize + ?Sized,
    {
        self.ensure_active()?;
        let body = serde_json::to_value(draft)?;

        let guard = self.begin_mutation();
        let outcome = match self
            .shared
            .gateway
            .send(R::ENDPOINT, Method::Post, Some(&body))
            .await
        {
            Ok(payload) => resolve_record::<R>(payload, body.clone()),
            Err(e) => Err(e.into()),
        };
        guard.disarm();

        self.finish_mutation(Operation::Create, outcome, |state, created: &R| {
            state.insert_created(created.clone());
        })
        .map(|created| {
            self.emit(&ServiceEvent::Created(created.clone()));
            created
        })
    }

    /// PUT `changes` for `id` and replace the record in place on success.
    pub async fn update<D>(&self, id: &ResourceId, changes: &D) -> Result<R, ServiceError>
    where
        D: Serialize + ?Sized,
    {
        self.ensure_active()?;
        let Some(current) = self.get(id) else {
            return Err(self.not_found(Operation::Update, id));
        };
        let body = serde_json::to_value(changes)?;
        let mut fallback = serde_json::to_value(&current)?;
        overlay(&mut fallback, body.clone());

        let guard = self.begin_mutation();
        let endpoint = format!("{}/{}", R::ENDPOINT, id);
        let outcome = match self
            .shared
            .gateway
            .send(&endpoint, Method::Put, Some(&body))
            .await
        {
            Ok(payload) => resolve_record::<R>(payload, fallback),
            Err(e) => Err(e.into()),
        };
        guard.disarm();

        self.finish_mutation(Operation::Update, outcome, |state, updated: &R| {
            match state.position(id) {
                Some(index) => state.items[index] = updated.clone(),
                None => debug!(kind = R::KIND, %id, "Updated record no longer in collection"),
            }
        })
        .map(|updated| {
            self.shared.cache.remove(&Self::cache_key(&format!("/{}", id)));
            self.emit(&ServiceEvent::Updated(updated.clone()));
            updated
        })
    }

    /// DELETE `id` and remove it from the collection on success.
    pub async fn delete(&self, id: &ResourceId) -> Result<(), ServiceError> {
        self.ensure_active()?;
        if self.get(id).is_none() {
            return Err(self.not_found(Operation::Delete, id));
        }

        let guard = self.begin_mutation();
        let endpoint = format!("{}/{}", R::ENDPOINT, id);
        let outcome = self
            .shared
            .gateway
            .send(&endpoint, Method::Delete, None)
            .await
            .map(|_| id.clone())
            .map_err(ServiceError::from);
        guard.disarm();

        self.finish_mutation(Operation::Delete, outcome, |state, removed: &ResourceId| {
            state.items.retain(|item| item.id() != removed);
        })
        .map(|removed| {
            self.shared.cache.remove(&Self::cache_key(&format!("/{}", removed)));
            self.emit(&ServiceEvent::Deleted(removed));
        })
    }

    fn begin_mutation(&self) -> PhaseGuard<'_, R> {
        PhaseGuard::enter(&self.shared, ServiceState::Mutating).0
    }

    /// Apply `patch` for a confirmed write, or report the failure. The
    /// caller emits the success event once this returns.
    fn finish_mutation<T>(
        &self,
        operation: Operation,
        outcome: Result<T, ServiceError>,
        patch: impl FnOnce(&mut State<R>, &T),
    ) -> Result<T, ServiceError> {
        if !self.is_active() {
            debug!(kind = R::KIND, %operation, "Service shut down during write, dropping result");
            return Err(ServiceError::Inactive);
        }

        let mut state = self.shared.state.lock();
        // A load started meanwhile owns the phase
        if state.phase == ServiceState::Mutating {
            state.phase = state.stable_phase();
        }
        match outcome {
            Ok(value) => {
                patch(&mut state, &value);
                state.refilter();
                let total = state.items.len();
                drop(state);
                info!(kind = R::KIND, %operation, total, "Write applied");
                Ok(value)
            }
            Err(err) => {
                drop(state);
                self.emit_error(operation, &err);
                Err(err)
            }
        }
    }

    // =========================================================================
    // Filtering and search
    // =========================================================================

    /// Merge `patch` into the active filters, reset to page 1 and re-filter.
    pub fn set_filters(&self, patch: FilterPatch) {
        if !self.is_active() {
            debug!(kind = R::KIND, "Ignoring filter change on inactive service");
            return;
        }
        let event = {
            let mut state = self.shared.state.lock();
            state.filters.apply_patch(patch);
            state.page = 1;
            state.refilter();
            debug!(kind = R::KIND, matches = state.view.len(), "Filters applied");
            ServiceEvent::Filtered {
                filters: state.filters.clone(),
                view: state.view.clone(),
            }
        };
        self.emit(&event);
    }

    /// Debounced search: only the last term within the quiescence window is
    /// applied. Must be called inside a Tokio runtime.
    pub fn search(&self, term: impl Into<String>) {
        let term = term.into();
        let weak = Arc::downgrade(&self.shared);
        self.shared.debouncer.schedule(move || {
            if let Some(shared) = weak.upgrade() {
                ResourceService { shared }.set_filters(FilterPatch::new().search(term));
            }
        });
    }

    pub fn cancel_search(&self) {
        self.shared.debouncer.cancel();
    }

    // =========================================================================
    // Background refresh and teardown
    // =========================================================================

    /// Reload every `every`. Starting again replaces the current timer.
    pub fn start_auto_refresh(&self, every: Duration) -> bool {
        if !self.is_active() {
            return false;
        }
        let weak = Arc::downgrade(&self.shared);
        let started = self.shared.refresher.start(every, move || {
            let weak = weak.clone();
            async move {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let service = ResourceService { shared };
                if !service.is_active() {
                    return;
                }
                if let Err(err) = service.load().await {
                    debug!(kind = R::KIND, error = %err, "Auto-refresh load failed");
                }
            }
        });
        if started {
            info!(kind = R::KIND, every_secs = every.as_secs_f64(), "Auto-refresh started");
        }
        started
    }

    pub fn stop_auto_refresh(&self) {
        self.shared.refresher.stop();
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.shared.refresher.is_running()
    }

    /// Stop timers, drop cache, subscribers and collection. Idempotent; any
    /// load or write still in flight is discarded when it completes.
    pub fn cleanup(&self) {
        let was_active = self.shared.active.swap(false, Ordering::SeqCst);
        self.shared.refresher.stop();
        self.shared.debouncer.cancel();
        self.shared.cache.clear();
        self.shared.bus.clear();
        {
            let mut state = self.shared.state.lock();
            state.items.clear();
            state.view.clear();
            state.loaded = false;
            state.phase = ServiceState::Idle;
            state.load_generation += 1;
        }
        if was_active {
            info!(kind = R::KIND, "Service cleaned up");
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_active(&self) -> Result<(), ServiceError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ServiceError::Inactive)
        }
    }

    fn emit(&self, event: &ServiceEvent<R>) {
        self.shared.bus.notify(event);
    }

    fn emit_error(&self, operation: Operation, err: &ServiceError) {
        warn!(kind = R::KIND, %operation, error = %err, "Operation failed");
        self.emit(&ServiceEvent::Error {
            operation,
            message: err.to_string(),
            status: err.status(),
        });
    }

    fn not_found(&self, operation: Operation, id: &ResourceId) -> ServiceError {
        let err = ServiceError::NotFound {
            kind: R::KIND,
            id: id.clone(),
        };
        self.emit_error(operation, &err);
        err
    }

    fn cache_prefix() -> String {
        format!("{}:", R::ENDPOINT)
    }

    fn cache_key(path: &str) -> String {
        format!("{}:{}", R::ENDPOINT, path)
    }
}

/// A list payload is either a bare array or an object carrying it in `data`.
fn decode_list<R: Resource>(payload: Value) -> Result<Vec<R>, ServiceError> {
    let list = match payload {
        Value::Array(_) => payload,
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Array(_)) => data,
            _ => {
                return Err(ServiceError::Decode(format!(
                    "expected a list of {}s",
                    R::KIND
                )))
            }
        },
        other => {
            return Err(ServiceError::Decode(format!(
                "expected a list of {}s, got {}",
                R::KIND,
                json_type(&other)
            )))
        }
    };
    Ok(serde_json::from_value(list)?)
}

/// Unwrap `{ "data": {...} }` envelopes around single records.
fn unwrap_envelope(mut payload: Value) -> Value {
    if let Value::Object(ref mut map) = payload {
        if !map.contains_key("id") {
            if let Some(inner) = map.remove("data") {
                return inner;
            }
        }
    }
    payload
}

fn overlay(target: &mut Value, extra: Value) {
    if let (Value::Object(target), Value::Object(extra)) = (target, extra) {
        for (key, value) in extra {
            target.insert(key, value);
        }
    }
}

/// Decode a write response. Servers that answer with only part of the record
/// (often just the id) get it filled in from what was sent.
fn resolve_record<R: Resource>(payload: Value, fallback: Value) -> Result<R, ServiceError> {
    let mut merged = fallback;
    overlay(&mut merged, unwrap_envelope(payload));
    if merged.get("id").map_or(true, Value::is_null) {
        return Err(ServiceError::Decode(format!(
            "{} response did not include an id",
            R::KIND
        )));
    }
    serde_json::from_value(merged).map_err(|e| {
        ServiceError::Decode(format!("could not read {} from response: {}", R::KIND, e))
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::GatewayError;
    use crate::models::Account;
    use crate::service::EventKind;
    use crate::test_support::ScriptedGateway;
    use serde_json::json;

    fn service(gateway: &Arc<ScriptedGateway>) -> ResourceService<Account> {
        ResourceService::new(gateway.clone(), ServiceOptions::default())
    }

    fn record_events(service: &ResourceService<Account>) -> Arc<Mutex<Vec<EventKind>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let _subscription = service.subscribe(move |event| sink.lock().push(event.kind()));
        log
    }

    fn two_accounts() -> Value {
        json!([
            {"id": 1, "name": "Ada", "email": "ada@uni.edu", "role": "student"},
            {"id": 2, "name": "Alan", "email": "alan@uni.edu", "role": "lecturer"}
        ])
    }

    #[tokio::test]
    async fn test_load_replaces_collection_and_emits_loaded() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts());
        let service = service(&gateway);
        let events = record_events(&service);

        assert_eq!(service.state(), ServiceState::Idle);
        assert_eq!(service.load().await, Ok(2));
        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(service.filtered().len(), 2);
        assert_eq!(*events.lock(), vec![EventKind::Loaded]);

        let calls = gateway.calls();
        assert_eq!(calls[0].endpoint, "/accounts");
        assert_eq!(calls[0].method, Method::Get);
    }

    #[tokio::test]
    async fn test_load_accepts_data_envelope() {
        let gateway = ScriptedGateway::new();
        gateway.ok(json!({"data": two_accounts(), "total": 2}));
        let service = service(&gateway);

        assert_eq!(service.load().await, Ok(2));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_snapshot() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts()).fail(GatewayError::ServerError {
            status: 503,
            body: "maintenance".into(),
        });
        let service = service(&gateway);
        service.load().await.unwrap();
        let events = record_events(&service);

        let err = service.load().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(service.len(), 2);
        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(*events.lock(), vec![EventKind::Error]);
    }

    #[tokio::test]
    async fn test_failed_first_load_returns_to_idle() {
        let gateway = ScriptedGateway::new();
        gateway.fail(GatewayError::Network("connection refused".into()));
        let service = service(&gateway);

        assert!(service.load().await.is_err());
        assert_eq!(service.state(), ServiceState::Idle);
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_list_is_a_decode_error() {
        let gateway = ScriptedGateway::new();
        gateway.ok(json!({"message": "ok"}));
        let service = service(&gateway);

        assert!(matches!(service.load().await, Err(ServiceError::Decode(_))));
    }

    #[tokio::test]
    async fn test_filter_then_paginate_scenario() {
        let gateway = ScriptedGateway::new();
        gateway.ok(json!([{"id": 1, "role": "student"}, {"id": 2, "role": "lecturer"}]));
        let service = service(&gateway);
        service.load().await.unwrap();

        service.set_filters(FilterPatch::new().field("role", "lecturer"));
        let page = service.get_paginated(1, 1);

        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, ResourceId::Number(2));
        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.pagination.total_pages, 1);
        assert!(!page.pagination.has_next);
        assert!(!page.pagination.has_prev);
    }

    #[tokio::test]
    async fn test_set_filters_resets_page_and_emits_filtered() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts());
        let service = service(&gateway);
        service.load().await.unwrap();
        service.set_page(3);
        let events = record_events(&service);

        service.set_filters(FilterPatch::new().search("alan"));
        assert_eq!(service.current_page(), 1);
        assert_eq!(service.filtered().len(), 1);
        assert_eq!(*events.lock(), vec![EventKind::Filtered]);

        // Filters survive a reload
        gateway.ok(two_accounts());
        service.load().await.unwrap();
        assert_eq!(service.filtered().len(), 1);
    }

    #[tokio::test]
    async fn test_create_appends_on_success() {
        let gateway = ScriptedGateway::new();
        gateway
            .ok(two_accounts())
            .ok(json!({"id": 3, "name": "Grace", "email": "grace@uni.edu", "role": "admin"}));
        let service = service(&gateway);
        service.load().await.unwrap();
        let events = record_events(&service);

        let created = service
            .create(&json!({"name": "Grace", "email": "grace@uni.edu", "role": "admin"}))
            .await
            .unwrap();

        assert_eq!(created.id, ResourceId::Number(3));
        assert_eq!(service.len(), 3);
        assert!(service.get(&ResourceId::Number(3)).is_some());
        assert_eq!(*events.lock(), vec![EventKind::Created]);
        assert_eq!(gateway.calls()[1].method, Method::Post);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_collection_unchanged() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts()).fail(GatewayError::Rejected {
            status: 422,
            body: "email taken".into(),
        });
        let service = service(&gateway);
        service.load().await.unwrap();
        let before = service.items();
        let events = record_events(&service);

        let result = service
            .create(&json!({"name": "Ada", "email": "ada@uni.edu", "role": "student"}))
            .await;

        assert!(matches!(result, Err(ServiceError::Transport(_))));
        assert_eq!(service.items(), before);
        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(*events.lock(), vec![EventKind::Error]);
    }

    #[tokio::test]
    async fn test_create_with_id_only_response_uses_submitted_fields() {
        let gateway = ScriptedGateway::new();
        gateway.ok(json!([])).ok(json!({"id": 10}));
        let service = service(&gateway);
        service.load().await.unwrap();

        let created = service
            .create(&json!({"name": "Barbara", "email": "barbara@uni.edu", "role": "lecturer"}))
            .await
            .unwrap();
        assert_eq!(created.id, ResourceId::Number(10));
        assert_eq!(created.name, "Barbara");
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts()).ok(json!(null));
        let service = service(&gateway);
        service.load().await.unwrap();

        let updated = service
            .update(&ResourceId::Number(1), &json!({"role": "admin"}))
            .await
            .unwrap();

        assert_eq!(updated.name, "Ada");
        assert_eq!(service.items()[0].role, crate::models::AccountRole::Admin);
        assert_eq!(service.len(), 2);
        assert_eq!(gateway.calls()[1].endpoint, "/accounts/1");
        assert_eq!(gateway.calls()[1].method, Method::Put);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found_without_request() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts());
        let service = service(&gateway);
        service.load().await.unwrap();
        let events = record_events(&service);

        let result = service.update(&ResourceId::Number(99), &json!({"name": "x"})).await;

        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(*events.lock(), vec![EventKind::Error]);
    }

    #[tokio::test]
    async fn test_delete_removes_on_success_only() {
        let gateway = ScriptedGateway::new();
        gateway
            .ok(two_accounts())
            .fail(GatewayError::Network("timeout".into()))
            .ok(json!(null));
        let service = service(&gateway);
        service.load().await.unwrap();

        assert!(service.delete(&ResourceId::Number(2)).await.is_err());
        assert_eq!(service.len(), 2);

        service.delete(&ResourceId::Number(2)).await.unwrap();
        assert_eq!(service.len(), 1);
        assert!(service.get(&ResourceId::Number(2)).is_none());
    }

    #[tokio::test]
    async fn test_failed_update_leaves_collection_unchanged() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts()).fail(GatewayError::ServerError {
            status: 500,
            body: "boom".into(),
        });
        let service = service(&gateway);
        service.load().await.unwrap();
        let before = service.items();
        let events = record_events(&service);

        let result = service
            .update(&ResourceId::Number(1), &json!({"name": "Countess"}))
            .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(service.items(), before);
        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(*events.lock(), vec![EventKind::Error]);
    }

    #[tokio::test]
    async fn test_create_with_existing_id_keeps_ids_unique() {
        let gateway = ScriptedGateway::new();
        gateway
            .ok(two_accounts())
            .ok(json!({"id": 2, "name": "Alan", "email": "alan@uni.edu", "role": "admin"}));
        let service = service(&gateway);
        service.load().await.unwrap();

        service
            .create(&json!({"name": "Alan", "email": "alan@uni.edu", "role": "admin"}))
            .await
            .unwrap();

        assert_eq!(service.len(), 2);
        let alan = service.get(&ResourceId::Number(2)).unwrap();
        assert_eq!(alan.role, crate::models::AccountRole::Admin);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_refresh_mid_tick_restores_ready() {
        let gateway = ScriptedGateway::new();
        gateway
            .ok(two_accounts())
            .ok_after(Duration::from_secs(5), json!([{"id": 7}]));
        let service = service(&gateway);
        service.load().await.unwrap();

        service.start_auto_refresh(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(service.state(), ServiceState::Loading);

        service.stop_auto_refresh();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(service.len(), 2);
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_create_restores_ready() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts()).ok_after(
            Duration::from_secs(5),
            json!({"id": 3, "name": "Grace", "email": "grace@uni.edu"}),
        );
        let service = service(&gateway);
        service.load().await.unwrap();

        let draft = json!({"name": "Grace", "email": "grace@uni.edu"});
        let timed_out =
            tokio::time::timeout(Duration::from_secs(1), service.create(&draft)).await;

        assert!(timed_out.is_err());
        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(service.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_load_restores_idle_unless_superseded() {
        let gateway = ScriptedGateway::new();
        gateway
            .ok_after(Duration::from_secs(5), two_accounts())
            .ok_after(Duration::from_secs(5), two_accounts())
            .ok_after(Duration::from_secs(5), two_accounts());
        let service = service(&gateway);

        let timed_out = tokio::time::timeout(Duration::from_secs(1), service.load()).await;
        assert!(timed_out.is_err());
        assert_eq!(service.state(), ServiceState::Idle);

        // An older load giving up must not clobber the newer one's phase
        let older = tokio::spawn({
            let service = service.clone();
            async move { service.load().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let newer = tokio::spawn({
            let service = service.clone();
            async move { service.load().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        older.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(service.state(), ServiceState::Loading);

        assert_eq!(newer.await.unwrap(), Ok(2));
        assert_eq!(service.state(), ServiceState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_is_debounced_to_last_term() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts());
        let service = service(&gateway);
        service.load().await.unwrap();
        let events = record_events(&service);

        for term in ["a", "al", "ala", "alan", "ada"] {
            service.search(term);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(events.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*events.lock(), vec![EventKind::Filtered]);
        assert_eq!(service.filters().search, "ada");
        assert_eq!(service.filtered().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_loads_latest_started_wins() {
        let gateway = ScriptedGateway::new();
        gateway
            .ok_after(Duration::from_millis(200), json!([{"id": 1}]))
            .ok_after(Duration::from_millis(50), json!([{"id": 2}, {"id": 3}]));
        let service = service(&gateway);
        let events = record_events(&service);

        let (first, second) = tokio::join!(service.load(), service.load());

        assert_eq!(second, Ok(2));
        // Superseded result is dropped; the caller sees the current size
        assert_eq!(first, Ok(2));
        let ids: Vec<ResourceId> = service.items().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![ResourceId::Number(2), ResourceId::Number(3)]);
        assert_eq!(*events.lock(), vec![EventKind::Loaded]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_reloads_without_stacking() {
        let gateway = ScriptedGateway::new();
        for _ in 0..4 {
            gateway.ok(two_accounts());
        }
        let service = service(&gateway);

        assert!(service.start_auto_refresh(Duration::from_secs(10)));
        assert!(service.start_auto_refresh(Duration::from_secs(10)));
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(gateway.call_count(), 2);

        service.stop_auto_refresh();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(service.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_discards_in_flight_load() {
        let gateway = ScriptedGateway::new();
        gateway.ok_after(Duration::from_secs(1), two_accounts());
        let service = service(&gateway);
        let events = record_events(&service);

        let pending = tokio::spawn({
            let service = service.clone();
            async move { service.load().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.cleanup();
        service.cleanup();

        let result = pending.await.unwrap();
        assert_eq!(result, Err(ServiceError::Inactive));
        assert!(service.is_empty());
        assert!(events.lock().is_empty());
        assert_eq!(service.load().await, Err(ServiceError::Inactive));
        assert!(!service.start_auto_refresh(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_cached_hits_until_ttl_or_refresh() {
        let gateway = ScriptedGateway::new();
        gateway
            .ok(json!({"total": 2}))
            .ok(json!({"total": 3}))
            .ok(two_accounts())
            .ok(json!({"total": 4}));
        let service = service(&gateway);

        assert_eq!(service.fetch_cached("/stats").await.unwrap(), json!({"total": 2}));
        assert_eq!(service.fetch_cached("/stats").await.unwrap(), json!({"total": 2}));
        assert_eq!(gateway.call_count(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(service.fetch_cached("/stats").await.unwrap(), json!({"total": 3}));

        service.refresh().await.unwrap();
        assert_eq!(service.fetch_cached("/stats").await.unwrap(), json!({"total": 4}));
        assert_eq!(gateway.calls()[3].endpoint, "/accounts/stats");
    }

    #[tokio::test]
    async fn test_fetch_one_unwraps_envelope() {
        let gateway = ScriptedGateway::new();
        gateway.ok(json!({"data": {"id": 5, "name": "Edsger", "role": "admin"}}));
        let service = service(&gateway);

        let account = service.fetch_one(&ResourceId::Number(5)).await.unwrap();
        assert_eq!(account.name, "Edsger");
        assert_eq!(gateway.calls()[0].endpoint, "/accounts/5");
    }

    #[tokio::test]
    async fn test_panicking_subscriber_does_not_break_service() {
        let gateway = ScriptedGateway::new();
        gateway.ok(two_accounts());
        let service = service(&gateway);
        let _boom = service.subscribe(|_| panic!("controller bug"));
        let events = record_events(&service);

        assert_eq!(service.load().await, Ok(2));
        assert_eq!(*events.lock(), vec![EventKind::Loaded]);
    }
}
