//! Device records and the signals used to identify a device.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable, derived identifier for a browser/device.
///
/// A lookup key only. It is not a secret and must never be used as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for display and log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw signals reported by the client at login time.
///
/// Every field is optional; missing data degrades to `Unknown` during
/// fingerprinting instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientEnvironment {
    pub user_agent: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub color_depth: Option<u32>,
    pub pixel_ratio: Option<f64>,
    pub max_touch_points: Option<u32>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub platform: Option<String>,
}

/// Parsed snapshot of a device, stored alongside device records and
/// blocked attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub browser_name: String,
    pub browser_version: String,
    pub os_name: String,
    pub os_version: String,
    pub device_type: String,
    pub screen_resolution: String,
    pub color_depth: Option<u32>,
    pub pixel_ratio: Option<f64>,
    pub touch_support: bool,
    pub timezone: String,
    pub language: Option<String>,
    pub platform: Option<String>,
    pub user_agent: Option<String>,
}

impl DeviceInfo {
    /// Default human label, e.g. "Chrome on Windows".
    pub fn label(&self) -> String {
        format!("{} on {}", self.browser_name, self.os_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fingerprint: DeviceFingerprint,
    pub label: String,
    pub device_info: DeviceInfo,
    pub is_active: bool,
    pub is_primary: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub login_count: u64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeviceRecord {
    pub user_id: Uuid,
    pub fingerprint: DeviceFingerprint,
    pub label: String,
    pub device_info: DeviceInfo,
    pub is_primary: bool,
    pub notes: Option<String>,
}
