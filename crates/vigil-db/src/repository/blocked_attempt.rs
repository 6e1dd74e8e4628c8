//! SurrealDB implementation of [`BlockedAttemptRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::blocked_attempt::{
    AttemptStatus, BlockedAttempt, CreateBlockedAttempt, ResolveBlockedAttempt,
};
use vigil_core::models::device::{DeviceFingerprint, DeviceInfo};
use vigil_core::repository::{BlockedAttemptRepository, PaginatedResult, Pagination};

use super::device::device_info_value;
use super::{CountRow, parse_opt_uuid, parse_uuid, write_error};
use crate::error::DbError;

const SELECT_ATTEMPT: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('blocked_attempt', $id)";

#[derive(Debug, SurrealValue)]
struct BlockedAttemptRow {
    record_id: String,
    user_id: String,
    user_email: String,
    user_name: String,
    fingerprint: String,
    device_info: serde_json::Value,
    reason: String,
    status: String,
    resolved_by: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> Result<AttemptStatus, DbError> {
    match s {
        "Pending" => Ok(AttemptStatus::Pending),
        "Approved" => Ok(AttemptStatus::Approved),
        "Blacklisted" => Ok(AttemptStatus::Blacklisted),
        other => Err(DbError::decode(
            "blocked_attempt",
            format!("unknown status: {other}"),
        )),
    }
}

fn status_to_string(s: AttemptStatus) -> &'static str {
    match s {
        AttemptStatus::Pending => "Pending",
        AttemptStatus::Approved => "Approved",
        AttemptStatus::Blacklisted => "Blacklisted",
    }
}

impl BlockedAttemptRow {
    fn try_into_attempt(self) -> Result<BlockedAttempt, DbError> {
        let device_info: DeviceInfo = serde_json::from_value(self.device_info)
            .map_err(|e| DbError::decode("blocked_attempt", format!("device_info: {e}")))?;
        Ok(BlockedAttempt {
            id: parse_uuid("blocked_attempt", &self.record_id)?,
            user_id: parse_uuid("blocked_attempt", &self.user_id)?,
            user_email: self.user_email,
            user_name: self.user_name,
            fingerprint: DeviceFingerprint::new(self.fingerprint),
            device_info,
            reason: self.reason,
            status: parse_status(&self.status)?,
            resolved_by: parse_opt_uuid("blocked_attempt", self.resolved_by)?,
            resolved_at: self.resolved_at,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

fn first_attempt(
    rows: Vec<BlockedAttemptRow>,
    id: impl Into<String>,
) -> Result<BlockedAttempt, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "blocked_attempt".into(),
            id: id.into(),
        })?
        .try_into_attempt()
}

/// SurrealDB implementation of the blocked-attempt queue.
#[derive(Clone)]
pub struct SurrealBlockedAttemptRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBlockedAttemptRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> BlockedAttemptRepository for SurrealBlockedAttemptRepository<C> {
    async fn create(&self, input: CreateBlockedAttempt) -> VigilResult<BlockedAttempt> {
        let id_str = Uuid::new_v4().to_string();
        let device_info = device_info_value(&input.device_info)?;

        let query = format!(
            "CREATE type::record('blocked_attempt', $id) SET \
             user_id = $user_id, user_email = $user_email, \
             user_name = $user_name, fingerprint = $fingerprint, \
             device_info = $device_info, reason = $reason, \
             status = $status, notes = $notes; \
             {SELECT_ATTEMPT};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("user_email", input.user_email))
            .bind(("user_name", input.user_name))
            .bind(("fingerprint", input.fingerprint.as_str().to_string()))
            .bind(("device_info", device_info))
            .bind(("reason", input.reason))
            .bind(("status", status_to_string(input.status).to_string()))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| write_error("blocked_attempt", e))?;

        let rows: Vec<BlockedAttemptRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_attempt(rows, id_str)?)
    }

    async fn get_by_id(&self, id: Uuid) -> VigilResult<BlockedAttempt> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(SELECT_ATTEMPT)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BlockedAttemptRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_attempt(rows, id_str)?)
    }

    async fn find_by_fingerprint(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
        status: AttemptStatus,
    ) -> VigilResult<Option<BlockedAttempt>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM blocked_attempt \
                 WHERE user_id = $user_id AND fingerprint = $fingerprint \
                 AND status = $status \
                 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("fingerprint", fingerprint.as_str().to_string()))
            .bind(("status", status_to_string(status).to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BlockedAttemptRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(BlockedAttemptRow::try_into_attempt)
            .transpose()?)
    }

    async fn is_blacklisted(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
    ) -> VigilResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM blocked_attempt \
                 WHERE user_id = $user_id AND fingerprint = $fingerprint \
                 AND status = 'Blacklisted' GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("fingerprint", fingerprint.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn resolve(&self, id: Uuid, input: ResolveBlockedAttempt) -> VigilResult<BlockedAttempt> {
        let id_str = id.to_string();

        let mut sets = vec![
            "status = $status",
            "resolved_by = $resolved_by",
            "resolved_at = time::now()",
        ];
        if input.notes.is_some() {
            sets.push("notes = $notes");
        }

        let query = format!(
            "UPDATE type::record('blocked_attempt', $id) SET {}; {SELECT_ATTEMPT};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("status", status_to_string(input.status).to_string()))
            .bind(("resolved_by", input.resolved_by.to_string()));
        if let Some(notes) = input.notes {
            builder = builder.bind(("notes", notes));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| write_error("blocked_attempt", e))?;

        let rows: Vec<BlockedAttemptRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_attempt(rows, id_str)?)
    }

    async fn list_by_status(
        &self,
        status: AttemptStatus,
        pagination: Pagination,
    ) -> VigilResult<PaginatedResult<BlockedAttempt>> {
        let status_str = status_to_string(status).to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM blocked_attempt \
                 WHERE status = $status GROUP ALL",
            )
            .bind(("status", status_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM blocked_attempt \
                 WHERE status = $status \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("status", status_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BlockedAttemptRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(BlockedAttemptRow::try_into_attempt)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
