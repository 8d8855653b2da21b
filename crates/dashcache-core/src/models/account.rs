use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Student,
    Lecturer,
    Admin,
    #[default]
    #[serde(other)]
    Other,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Student => "student",
            AccountRole::Lecturer => "lecturer",
            AccountRole::Admin => "admin",
            AccountRole::Other => "other",
        }
    }

    /// Case-insensitive parse; unknown names map to `Other`.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => AccountRole::Student,
            "lecturer" => AccountRole::Lecturer,
            "admin" => AccountRole::Admin,
            _ => AccountRole::Other,
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::Student => write!(f, "Student"),
            AccountRole::Lecturer => write!(f, "Lecturer"),
            AccountRole::Admin => write!(f, "Admin"),
            AccountRole::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: ResourceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: AccountRole,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub status: Option<AccountStatus>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Account {
    /// Accounts without an explicit status count as active.
    pub fn is_active(&self) -> bool {
        self.status != Some(AccountStatus::Inactive)
    }
}

fn non_empty(s: &str) -> Option<Cow<'_, str>> {
    if s.is_empty() {
        None
    } else {
        Some(Cow::Borrowed(s))
    }
}

impl Resource for Account {
    const KIND: &'static str = "account";
    const ENDPOINT: &'static str = "/accounts";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "email", "department", "role"];

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "id" => Some(Cow::Owned(self.id.to_string())),
            "name" => non_empty(&self.name),
            "email" => non_empty(&self.email),
            "role" => Some(Cow::Borrowed(self.role.as_str())),
            "department" => self.department.as_deref().and_then(non_empty),
            "status" => self.status.map(|s| Cow::Borrowed(s.as_str())),
            "createdAt" => self.created_at.as_deref().and_then(non_empty),
            _ => None,
        }
    }
}

/// Payload for creating an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountDraft {
    pub name: String,
    pub email: String,
    pub role: AccountRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AccountRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,
}
