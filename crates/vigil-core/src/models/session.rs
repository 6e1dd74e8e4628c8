//! Device-bound sessions and the per-request context derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Device the session was admitted on; deactivating it revokes the
    /// session.
    pub device_id: Uuid,
    pub token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether a token's context still describes this session.
    pub fn matches(&self, ctx: &SessionContext) -> bool {
        self.id == ctx.session_id && self.user_id == ctx.user_id && self.device_id == ctx.device_id
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            user_id: self.user_id,
            session_id: self.id,
            device_id: self.device_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub user_id: Uuid,
    pub device_id: Uuid,
    pub token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Explicit per-request context handed to every check, replacing any
/// notion of an ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub device_id: Uuid,
}
