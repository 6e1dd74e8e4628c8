//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VigilError, VigilResult};

/// Highest finite device ceiling an administrator may configure.
pub const MAX_DEVICE_CEILING: u32 = 999;

/// Stored value meaning "no device limit".
pub const UNLIMITED_SENTINEL: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

/// Per-user ceiling on concurrently active devices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceCeiling {
    Limited(u32),
    Unlimited,
}

impl DeviceCeiling {
    /// Build a ceiling from the integer form used on the wire and in
    /// storage. `-1` is the unlimited sentinel; anything else must lie in
    /// `1..=999`.
    pub fn from_raw(raw: i64) -> VigilResult<Self> {
        if raw == UNLIMITED_SENTINEL {
            return Ok(Self::Unlimited);
        }
        if raw < 1 || raw > i64::from(MAX_DEVICE_CEILING) {
            return Err(VigilError::validation(format!(
                "max devices must be between 1 and {MAX_DEVICE_CEILING} (or -1 for unlimited), got {raw}"
            )));
        }
        Ok(Self::Limited(raw as u32))
    }

    pub fn to_raw(self) -> i64 {
        match self {
            Self::Limited(n) => i64::from(n),
            Self::Unlimited => UNLIMITED_SENTINEL,
        }
    }

    /// Whether one more device fits when `active` devices are already in use.
    pub fn admits(self, active: u64) -> bool {
        match self {
            Self::Limited(n) => active < u64::from(n),
            Self::Unlimited => true,
        }
    }

    /// Finite limit, or `u32::MAX` for unlimited (used in error reports).
    pub fn limit(self) -> u32 {
        match self {
            Self::Limited(n) => n,
            Self::Unlimited => u32::MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub badge_number: Option<String>,
    pub password_hash: String,
    pub status: UserStatus,
    pub biometric_enabled: bool,
    pub max_devices: DeviceCeiling,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub full_name: String,
    pub badge_number: Option<String>,
    /// Argon2id PHC string; hashing happens in the auth layer.
    pub password_hash: String,
    pub max_devices: DeviceCeiling,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub status: Option<UserStatus>,
    pub biometric_enabled: Option<bool>,
    pub password_hash: Option<String>,
}
