use std::fmt;

use crate::models::ResourceId;
use crate::query::FilterState;

/// Lifecycle of a resource service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Loading,
    Ready,
    Mutating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Create,
    Update,
    Delete,
    Query,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Load => write!(f, "load"),
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Query => write!(f, "query"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Loaded,
    Filtered,
    Created,
    Updated,
    Deleted,
    Error,
}

/// Change notification published to service subscribers.
#[derive(Debug, Clone)]
pub enum ServiceEvent<R> {
    /// The authoritative collection was replaced. Carries the filtered view.
    Loaded { total: usize, view: Vec<R> },
    /// Filters changed. Carries the new filters and filtered view.
    Filtered { filters: FilterState, view: Vec<R> },
    Created(R),
    Updated(R),
    Deleted(ResourceId),
    Error {
        operation: Operation,
        message: String,
        status: Option<u16>,
    },
}

impl<R> ServiceEvent<R> {
    pub fn kind(&self) -> EventKind {
        match self {
            ServiceEvent::Loaded { .. } => EventKind::Loaded,
            ServiceEvent::Filtered { .. } => EventKind::Filtered,
            ServiceEvent::Created(_) => EventKind::Created,
            ServiceEvent::Updated(_) => EventKind::Updated,
            ServiceEvent::Deleted(_) => EventKind::Deleted,
            ServiceEvent::Error { .. } => EventKind::Error,
        }
    }
}
