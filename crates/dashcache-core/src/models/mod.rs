//! Data models for dashboard resources.
//!
//! - `Account`: user accounts with role, department and status
//! - `Event`: scheduled events with category, date and registration link
//! - `ResourceId`: identity as the API sends it (number or string)
//! - `Resource`: what the generic service needs to know about a record

pub mod account;
pub mod event;
pub mod id;

use std::borrow::Cow;
use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

pub use account::{Account, AccountDraft, AccountRole, AccountStatus, AccountUpdate};
pub use event::{Event, EventDraft, EventUpdate};
pub use id::ResourceId;

/// A record held in a [`crate::service::ResourceService`] collection.
pub trait Resource: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Singular name used in log lines and error messages.
    const KIND: &'static str;

    /// Collection endpoint, relative to the gateway's base URL.
    const ENDPOINT: &'static str;

    /// Fields matched by free-text search.
    const SEARCH_FIELDS: &'static [&'static str];

    fn id(&self) -> &ResourceId;

    /// String view of a named field, used for category equality and search.
    /// Unknown or empty fields return `None`.
    fn field(&self, name: &str) -> Option<Cow<'_, str>>;
}
