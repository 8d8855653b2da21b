//! Resource services: the stateful core of dashcache.
//!
//! [`ResourceService`] is generic over a [`crate::models::Resource`]; the
//! account and event services wrap it with validation and aggregates.

mod accounts;
mod error;
mod event;
mod events;
mod resource;

pub use accounts::{AccountService, AccountStats};
pub use error::{ServiceError, ValidationError};
pub use event::{EventKind, Operation, ServiceEvent, ServiceState};
pub use events::{EventService, EventStats};
pub use resource::ResourceService;
