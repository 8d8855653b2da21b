//! Core library for dashcache.
//!
//! dashcache keeps an admin dashboard's resource collections (accounts and
//! scheduled events) in sync with a remote CRUD API. The pieces, leaves first:
//!
//! - [`cache::CacheStore`]: TTL-bounded response cache for secondary queries
//! - [`bus::NotificationBus`]: ordered, panic-isolated subscriber fan-out
//! - [`api::RequestGateway`]: the transport seam, with [`api::HttpGateway`] over reqwest
//! - [`schedule`]: search debouncing and periodic background refresh
//! - [`query`]: in-memory filtering and pagination
//! - [`service`]: the generic [`service::ResourceService`] and its account/event specializations
//! - [`filters`]: filter catalog merge and persisted selection state

pub mod api;
pub mod bus;
pub mod cache;
pub mod config;
pub mod filters;
pub mod models;
pub mod query;
pub mod schedule;
pub mod service;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{GatewayError, HttpGateway, Method, RequestGateway};
pub use bus::{NotificationBus, Subscription};
pub use cache::CacheStore;
pub use config::{Config, ServiceOptions};
pub use filters::{FilterCatalog, FilterPredicate, PersistedSelection, SearchFilters};
pub use models::{Account, AccountRole, Event, Resource, ResourceId};
pub use query::{FilterPatch, FilterState, PageInfo, PaginationResult};
pub use service::{
    AccountService, AccountStats, EventKind, EventService, EventStats, Operation,
    ResourceService, ServiceError, ServiceEvent, ServiceState, ValidationError,
};
