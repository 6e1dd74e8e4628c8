//! Role tags, the officer hierarchy and department grants.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VigilError;

/// A role or department tag attached to a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoleTag {
    Admin,
    Officer,
    User,
    TrafficPolice,
    Cid,
    Cybercrime,
    Forensics,
    Intelligence,
    CrimeRecords,
}

/// Position in the ordered admin > officer > user hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoleLevel {
    User = 1,
    Officer = 2,
    Admin = 3,
}

impl RoleTag {
    pub const ALL: [RoleTag; 9] = [
        RoleTag::Admin,
        RoleTag::Officer,
        RoleTag::User,
        RoleTag::TrafficPolice,
        RoleTag::Cid,
        RoleTag::Cybercrime,
        RoleTag::Forensics,
        RoleTag::Intelligence,
        RoleTag::CrimeRecords,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleTag::Admin => "admin",
            RoleTag::Officer => "officer",
            RoleTag::User => "user",
            RoleTag::TrafficPolice => "traffic_police",
            RoleTag::Cid => "cid",
            RoleTag::Cybercrime => "cybercrime",
            RoleTag::Forensics => "forensics",
            RoleTag::Intelligence => "intelligence",
            RoleTag::CrimeRecords => "crime_records",
        }
    }

    /// Hierarchy level, or `None` for department tags.
    pub fn level(self) -> Option<RoleLevel> {
        match self {
            RoleTag::Admin => Some(RoleLevel::Admin),
            RoleTag::Officer => Some(RoleLevel::Officer),
            RoleTag::User => Some(RoleLevel::User),
            _ => None,
        }
    }

    pub fn is_department(self) -> bool {
        self.level().is_none()
    }
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTag {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| VigilError::validation(format!("unknown role tag: {s}")))
    }
}

/// Highest hierarchy level among `roles`; users without any hierarchy tag
/// rank as plain users.
pub fn effective_level(roles: &[RoleTag]) -> RoleLevel {
    roles
        .iter()
        .filter_map(|r| r.level())
        .max()
        .unwrap_or(RoleLevel::User)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: RoleTag,
    pub created_at: DateTime<Utc>,
}

/// Time-boxed access grant for a sensitive department, kept apart from
/// the general role table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub department: RoleTag,
    pub is_active: bool,
    pub granted_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DepartmentGrant {
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDepartmentGrant {
    pub user_id: Uuid,
    pub department: RoleTag,
    pub granted_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}
