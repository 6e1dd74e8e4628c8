//! Logins held back because the user reached their device ceiling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::device::{DeviceFingerprint, DeviceInfo};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AttemptStatus {
    Pending,
    Approved,
    Blacklisted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub fingerprint: DeviceFingerprint,
    pub device_info: DeviceInfo,
    pub reason: String,
    pub status: AttemptStatus,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockedAttempt {
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub fingerprint: DeviceFingerprint,
    pub device_info: DeviceInfo,
    pub reason: String,
    pub status: AttemptStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveBlockedAttempt {
    pub status: AttemptStatus,
    pub resolved_by: Uuid,
    pub notes: Option<String>,
}
