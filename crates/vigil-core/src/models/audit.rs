//! Audit trail of device-trust and login decisions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VigilError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActorType {
    User,
    /// The login gate acting on its own; the actor id is nil.
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

/// Every action the trust layer writes to the audit log.
///
/// Stored as dotted strings (`device.approved`) so the log stays readable
/// from the database console.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "String", try_from = "String")]
pub enum AuditAction {
    LoginSucceeded,
    LoginFailed,
    LoginBlocked,
    DevicePendingApproval,
    DeviceRegistered,
    DeviceApproved,
    DeviceBlacklisted,
    DeviceActivated,
    DeviceDeactivated,
    DeviceDeleted,
    DevicePrimarySet,
    MaxDevicesUpdated,
    RoleAssigned,
    RoleUnassigned,
    GrantCreated,
    GrantUpdated,
    PagePermissionSet,
    PagePermissionRemoved,
    SuspiciousLoginUpdated,
}

impl AuditAction {
    pub const ALL: [AuditAction; 19] = [
        Self::LoginSucceeded,
        Self::LoginFailed,
        Self::LoginBlocked,
        Self::DevicePendingApproval,
        Self::DeviceRegistered,
        Self::DeviceApproved,
        Self::DeviceBlacklisted,
        Self::DeviceActivated,
        Self::DeviceDeactivated,
        Self::DeviceDeleted,
        Self::DevicePrimarySet,
        Self::MaxDevicesUpdated,
        Self::RoleAssigned,
        Self::RoleUnassigned,
        Self::GrantCreated,
        Self::GrantUpdated,
        Self::PagePermissionSet,
        Self::PagePermissionRemoved,
        Self::SuspiciousLoginUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoginSucceeded => "login.succeeded",
            Self::LoginFailed => "login.failed",
            Self::LoginBlocked => "login.blocked",
            Self::DevicePendingApproval => "device.pending_approval",
            Self::DeviceRegistered => "device.registered",
            Self::DeviceApproved => "device.approved",
            Self::DeviceBlacklisted => "device.blacklisted",
            Self::DeviceActivated => "device.activated",
            Self::DeviceDeactivated => "device.deactivated",
            Self::DeviceDeleted => "device.deleted",
            Self::DevicePrimarySet => "device.primary_set",
            Self::MaxDevicesUpdated => "user.max_devices_updated",
            Self::RoleAssigned => "user.role_assigned",
            Self::RoleUnassigned => "user.role_unassigned",
            Self::GrantCreated => "grant.created",
            Self::GrantUpdated => "grant.updated",
            Self::PagePermissionSet => "page_permission.set",
            Self::PagePermissionRemoved => "page_permission.removed",
            Self::SuspiciousLoginUpdated => "suspicious_login.updated",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| VigilError::validation(format!("unknown audit action: {s}")))
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        action.as_str().to_string()
    }
}

impl TryFrom<String> for AuditAction {
    type Error = VigilError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    pub action: AuditAction,
    /// Device, attempt or user the action applied to.
    pub subject_id: Option<Uuid>,
    pub outcome: AuditOutcome,
    pub ip_address: Option<String>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    pub action: AuditAction,
    pub subject_id: Option<Uuid>,
    pub outcome: AuditOutcome,
    pub ip_address: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
