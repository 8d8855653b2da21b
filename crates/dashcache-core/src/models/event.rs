use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Resource, ResourceId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: ResourceId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// RFC 3339 timestamp or plain `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "registrationUrl", default)]
    pub registration_url: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

/// Parse an event date. Plain dates are taken as midnight UTC.
pub fn parse_event_date(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl Event {
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(parse_event_date)
    }

    /// Events at or after `now` are upcoming; undated events are neither
    /// upcoming nor past.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> Option<bool> {
        self.starts_at().map(|start| start >= now)
    }

    pub fn formatted_date(&self) -> String {
        match &self.date {
            Some(date) => match parse_event_date(date) {
                Some(dt) => dt.format("%b %d, %Y").to_string(),
                // Fall back to raw date string, truncate if too long
                None => date.chars().take(10).collect(),
            },
            None => "TBD".to_string(),
        }
    }

    pub fn category_or_default(&self) -> &str {
        match self.category.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => "Uncategorized",
        }
    }
}

impl Resource for Event {
    const KIND: &'static str = "event";
    const ENDPOINT: &'static str = "/events";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "description", "location", "category"];

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "id" => return Some(Cow::Owned(self.id.to_string())),
            "title" => Some(self.title.as_str()),
            "description" => self.description.as_deref(),
            "category" => self.category.as_deref(),
            "date" => self.date.as_deref(),
            "location" => self.location.as_deref(),
            "registrationUrl" => self.registration_url.as_deref(),
            "capacity" => return self.capacity.map(|c| Cow::Owned(c.to_string())),
            _ => None,
        };
        value.filter(|v| !v.is_empty()).map(Cow::Borrowed)
    }
}

/// Payload for creating an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "registrationUrl", skip_serializing_if = "Option::is_none")]
    pub registration_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "registrationUrl", skip_serializing_if = "Option::is_none")]
    pub registration_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}
