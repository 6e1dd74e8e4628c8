//! SurrealDB repository implementations.

mod audit;
mod blocked_attempt;
mod device;
mod grant;
mod page_permission;
mod role;
mod session;
mod suspicious_login;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use blocked_attempt::SurrealBlockedAttemptRepository;
pub use device::SurrealDeviceRepository;
pub use grant::SurrealDepartmentGrantRepository;
pub use page_permission::SurrealPagePermissionRepository;
pub use role::SurrealRoleRepository;
pub use session::SurrealSessionRepository;
pub use suspicious_login::SurrealSuspiciousLoginRepository;
pub use user::SurrealUserRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

pub(crate) fn parse_uuid(table: &'static str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::decode(table, format!("invalid UUID {raw:?}: {e}")))
}

pub(crate) fn parse_opt_uuid(
    table: &'static str,
    raw: Option<String>,
) -> Result<Option<Uuid>, DbError> {
    raw.map(|s| parse_uuid(table, &s)).transpose()
}

/// Map a failed write onto a domain error, recognising unique-index
/// violations.
pub(crate) fn write_error(entity: &str, err: surrealdb::Error) -> DbError {
    let message = err.to_string();
    if message.contains("already contains") || message.contains("already exists") {
        DbError::AlreadyExists {
            entity: entity.to_string(),
        }
    } else {
        DbError::Migration(message)
    }
}
