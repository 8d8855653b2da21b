//! Account specialization of [`ResourceService`].

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;

use crate::api::RequestGateway;
use crate::config::ServiceOptions;
use crate::models::{Account, AccountDraft, AccountRole, AccountUpdate, ResourceId};
use crate::query::FilterPatch;
use crate::utils::cmp_ignore_case;

use super::{ResourceService, ServiceError, ValidationError};

/// Account totals for the dashboard header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_role: BTreeMap<AccountRole, usize>,
}

#[derive(Clone)]
pub struct AccountService {
    inner: ResourceService<Account>,
}

impl Deref for AccountService {
    type Target = ResourceService<Account>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AccountService {
    pub fn new(gateway: Arc<dyn RequestGateway>, options: ServiceOptions) -> Self {
        Self {
            inner: ResourceService::new(gateway, options),
        }
    }

    pub async fn create(&self, draft: &AccountDraft) -> Result<Account, ServiceError> {
        validate_name(&draft.name)?;
        validate_email(&draft.email)?;
        self.inner.create(draft).await
    }

    pub async fn update(
        &self,
        id: &ResourceId,
        changes: &AccountUpdate,
    ) -> Result<Account, ServiceError> {
        if let Some(ref name) = changes.name {
            validate_name(name)?;
        }
        if let Some(ref email) = changes.email {
            validate_email(email)?;
        }
        self.inner.update(id, changes).await
    }

    pub fn stats(&self) -> AccountStats {
        self.inner.with_items(|accounts| {
            let mut stats = AccountStats {
                total: accounts.len(),
                ..Default::default()
            };
            for account in accounts {
                if account.is_active() {
                    stats.active += 1;
                } else {
                    stats.inactive += 1;
                }
                *stats.by_role.entry(account.role).or_insert(0) += 1;
            }
            stats
        })
    }

    /// Distinct roles present in the collection.
    pub fn roles(&self) -> Vec<AccountRole> {
        let mut roles: Vec<AccountRole> =
            self.inner.with_items(|accounts| accounts.iter().map(|a| a.role).collect());
        roles.sort();
        roles.dedup();
        roles
    }

    /// Distinct non-empty departments, sorted ignoring case.
    pub fn departments(&self) -> Vec<String> {
        let mut departments: Vec<String> = self.inner.with_items(|accounts| {
            accounts
                .iter()
                .filter_map(|a| a.department.as_deref())
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect()
        });
        departments.sort();
        departments.dedup();
        departments.sort_by(|a, b| cmp_ignore_case(a, b));
        departments
    }

    /// Restrict the view to one role. `None` clears the role filter.
    pub fn filter_by_role(&self, role: Option<AccountRole>) {
        let patch = match role {
            Some(role) => FilterPatch::new().field("role", role.as_str()),
            None => FilterPatch::new().clear("role"),
        };
        self.inner.set_filters(patch);
    }

    /// Restrict the view to one department. Empty or `all` clears it.
    pub fn filter_by_department(&self, department: &str) {
        self.inner
            .set_filters(FilterPatch::new().field("department", department.trim()));
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name", "must not be blank"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::new("email", "must not be blank"));
    }
    if !looks_like_email(email) {
        return Err(ValidationError::new(
            "email",
            format!("'{}' is not an email address", email),
        ));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace and a single `@`.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
