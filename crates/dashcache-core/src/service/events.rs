//! Event specialization of [`ResourceService`].

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;

use crate::api::RequestGateway;
use crate::config::ServiceOptions;
use crate::models::event::parse_event_date;
use crate::models::{Event, EventDraft, EventUpdate, ResourceId};
use crate::query::FilterPatch;
use crate::utils::cmp_ignore_case;

use super::{ResourceService, ServiceError, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub total: usize,
    pub upcoming: usize,
    pub past: usize,
    /// Events with no date or one that does not parse.
    pub undated: usize,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Clone)]
pub struct EventService {
    inner: ResourceService<Event>,
}

impl Deref for EventService {
    type Target = ResourceService<Event>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl EventService {
    pub fn new(gateway: Arc<dyn RequestGateway>, options: ServiceOptions) -> Self {
        Self {
            inner: ResourceService::new(gateway, options),
        }
    }

    pub async fn create(&self, draft: &EventDraft) -> Result<Event, ServiceError> {
        validate_title(&draft.title)?;
        validate_details(
            draft.date.as_deref(),
            draft.registration_url.as_deref(),
            draft.capacity,
        )?;
        self.inner.create(draft).await
    }

    pub async fn update(
        &self,
        id: &ResourceId,
        changes: &EventUpdate,
    ) -> Result<Event, ServiceError> {
        if let Some(ref title) = changes.title {
            validate_title(title)?;
        }
        validate_details(
            changes.date.as_deref(),
            changes.registration_url.as_deref(),
            changes.capacity,
        )?;
        self.inner.update(id, changes).await
    }

    /// Counts relative to `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> EventStats {
        self.inner.with_items(|events| {
            let mut stats = EventStats {
                total: events.len(),
                ..Default::default()
            };
            for event in events {
                match event.is_upcoming(now) {
                    Some(true) => stats.upcoming += 1,
                    Some(false) => stats.past += 1,
                    None => stats.undated += 1,
                }
                *stats
                    .by_category
                    .entry(event.category_or_default().to_string())
                    .or_insert(0) += 1;
            }
            stats
        })
    }

    /// Distinct non-empty categories, sorted ignoring case.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.inner.with_items(|events| {
            events
                .iter()
                .filter_map(|e| e.category.as_deref())
                .filter(|c| !c.trim().is_empty())
                .map(str::to_string)
                .collect()
        });
        categories.sort();
        categories.dedup();
        categories.sort_by(|a, b| cmp_ignore_case(a, b));
        categories
    }

    /// Restrict the view to one category. Empty or `all` clears it.
    pub fn filter_by_category(&self, category: &str) {
        self.inner
            .set_filters(FilterPatch::new().field("category", category.trim()));
    }

    /// Dated events at or after `now`, soonest first.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Event> {
        let mut upcoming: Vec<(DateTime<Utc>, Event)> = self.inner.with_items(|events| {
            events
                .iter()
                .filter_map(|e| e.starts_at().map(|start| (start, e)))
                .filter(|(start, _)| *start >= now)
                .map(|(start, e)| (start, e.clone()))
                .collect()
        });
        upcoming.sort_by_key(|(start, _)| *start);
        upcoming.into_iter().map(|(_, e)| e).collect()
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::new("title", "must not be blank"));
    }
    Ok(())
}

fn validate_details(
    date: Option<&str>,
    registration_url: Option<&str>,
    capacity: Option<u32>,
) -> Result<(), ValidationError> {
    // Blank values clear the field rather than set it
    if let Some(date) = date.map(str::trim).filter(|d| !d.is_empty()) {
        if parse_event_date(date).is_none() {
            return Err(ValidationError::new(
                "date",
                format!("'{}' is not a date", date),
            ));
        }
    }
    if let Some(url) = registration_url.map(str::trim).filter(|u| !u.is_empty()) {
        validate_registration_url(url)?;
    }
    if capacity == Some(0) {
        return Err(ValidationError::new("capacity", "must be greater than zero"));
    }
    Ok(())
}

fn validate_registration_url(raw: &str) -> Result<(), ValidationError> {
    let url = Url::parse(raw)
        .map_err(|e| ValidationError::new("registrationUrl", format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ValidationError::new(
            "registrationUrl",
            format!("{} must be an http(s) link", raw),
        ));
    }
    Ok(())
}
