//! Route access resolution: role tags, per-page overrides and department
//! grants combined into a single allow/deny decision.
//!
//! Evaluation order for a page:
//! 1. `admin` role → allow.
//! 2. Explicit `PagePermission(user, page) = false` → deny.
//! 3. Matching [`PageRule`] requirement unmet → deny.
//! 4. No rule, or requirement met → allow.
//!
//! Absence of any rule is an allow. Pages that must be closed by default
//! need a rule.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;
use vigil_core::error::{VigilError, VigilResult};
use vigil_core::models::permission::normalize_page_path;
use vigil_core::models::role::{RoleLevel, RoleTag, effective_level};
use vigil_core::models::session::SessionContext;
use vigil_core::repository::{
    DepartmentGrantRepository, PagePermissionRepository, RoleRepository, TrustStore,
};

use crate::config::AuthConfig;
use crate::gate::bounded;

/// What a page demands beyond the per-page override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// At least this level in the admin > officer > user hierarchy.
    Level(RoleLevel),
    /// Any one of these department tags.
    Department(Vec<RoleTag>),
    /// The department tag itself, or an active unexpired grant row for it.
    GrantedDepartment(RoleTag),
}

#[derive(Debug, Clone)]
pub struct PageRule {
    prefix: String,
    requirement: Requirement,
}

impl PageRule {
    pub fn new(prefix: &str, requirement: Requirement) -> Self {
        Self {
            prefix: normalize_page_path(prefix),
            requirement,
        }
    }

    fn matches(&self, page: &str) -> bool {
        self.prefix == "/"
            || page == self.prefix
            || page
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Ordered set of page rules; the longest matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<PageRule>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<PageRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: PageRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Default rule set for the police portal.
    pub fn police_portal() -> Self {
        use Requirement::*;
        Self::new(vec![
            PageRule::new("/admin", Level(RoleLevel::Admin)),
            PageRule::new("/devices/approvals", Level(RoleLevel::Admin)),
            PageRule::new("/security", Level(RoleLevel::Admin)),
            PageRule::new("/officer", Level(RoleLevel::Officer)),
            PageRule::new("/cases", Level(RoleLevel::Officer)),
            PageRule::new("/citizen-lookup", Level(RoleLevel::Officer)),
            PageRule::new("/traffic", Department(vec![RoleTag::TrafficPolice])),
            PageRule::new("/cid", Department(vec![RoleTag::Cid])),
            PageRule::new("/forensics", Department(vec![RoleTag::Forensics])),
            PageRule::new("/intelligence", Department(vec![RoleTag::Intelligence])),
            PageRule::new(
                "/crime-records",
                Department(vec![RoleTag::CrimeRecords, RoleTag::Cid]),
            ),
            PageRule::new("/cybercrime", GrantedDepartment(RoleTag::Cybercrime)),
        ])
    }

    pub fn rule_for(&self, page: &str) -> Option<&PageRule> {
        self.rules
            .iter()
            .filter(|r| r.matches(page))
            .max_by_key(|r| r.prefix.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    PageOverride,
    InsufficientRole { required: RoleLevel },
    MissingDepartment { required: Vec<RoleTag> },
    NoActiveGrant { department: RoleTag },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Fail unless `actor` holds the `admin` tag. Always read from the role
/// table, never from client-supplied claims.
pub(crate) async fn is_admin<T: TrustStore>(store: &T, actor: Uuid) -> VigilResult<bool> {
    let roles = store.roles().get_user_roles(actor).await?;
    Ok(roles.contains(&RoleTag::Admin))
}

pub(crate) async fn require_admin<T: TrustStore>(store: &T, actor: Uuid) -> VigilResult<()> {
    if is_admin(store, actor).await? {
        Ok(())
    } else {
        debug!(actor = %actor, "Admin role required");
        Err(VigilError::forbidden("admin role required"))
    }
}

/// Decides whether a session may open a page.
pub struct RouteAccessResolver<T: TrustStore> {
    store: Arc<T>,
    policy: AccessPolicy,
    config: Arc<AuthConfig>,
}

impl<T: TrustStore> RouteAccessResolver<T> {
    pub fn new(store: Arc<T>, policy: AccessPolicy, config: Arc<AuthConfig>) -> Self {
        Self {
            store,
            policy,
            config,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Evaluate access for `page`. An `Err` means a lookup failed or timed
    /// out; callers treat it as a deny.
    pub async fn resolve(&self, ctx: &SessionContext, page: &str) -> VigilResult<AccessDecision> {
        let timeout = self.config.registry_timeout;
        let user_id = ctx.user_id;
        let page = normalize_page_path(page);

        let roles = bounded(timeout, "role lookup", self.store.roles().get_user_roles(user_id))
            .await?;
        if roles.contains(&RoleTag::Admin) {
            return Ok(AccessDecision::Allow);
        }

        let page_override = bounded(
            timeout,
            "page permission lookup",
            self.store.pages().get(user_id, &page),
        )
        .await?;
        if page_override.is_some_and(|p| !p.can_access) {
            debug!(user_id = %user_id, %page, "Denied by page override");
            return Ok(AccessDecision::Deny(DenyReason::PageOverride));
        }

        let Some(rule) = self.policy.rule_for(&page) else {
            return Ok(AccessDecision::Allow);
        };

        let decision = match &rule.requirement {
            Requirement::Level(required) => {
                if effective_level(&roles) >= *required {
                    AccessDecision::Allow
                } else {
                    AccessDecision::Deny(DenyReason::InsufficientRole {
                        required: *required,
                    })
                }
            }
            Requirement::Department(tags) => {
                if tags.iter().any(|t| roles.contains(t)) {
                    AccessDecision::Allow
                } else {
                    AccessDecision::Deny(DenyReason::MissingDepartment {
                        required: tags.clone(),
                    })
                }
            }
            Requirement::GrantedDepartment(department) => {
                if roles.contains(department) {
                    AccessDecision::Allow
                } else {
                    let grants = bounded(
                        timeout,
                        "department grant lookup",
                        self.store.grants().list_for_user(user_id, *department),
                    )
                    .await?;
                    let now = Utc::now();
                    if grants.iter().any(|g| g.is_effective(now)) {
                        AccessDecision::Allow
                    } else {
                        AccessDecision::Deny(DenyReason::NoActiveGrant {
                            department: *department,
                        })
                    }
                }
            }
        };

        if let AccessDecision::Deny(reason) = &decision {
            debug!(user_id = %user_id, %page, ?reason, "Route access denied");
        }
        Ok(decision)
    }
}
