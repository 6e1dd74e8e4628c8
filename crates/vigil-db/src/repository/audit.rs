//! SurrealDB implementation of [`AuditLogRepository`] (append-only).

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::audit::{
    ActorType, AuditAction, AuditLogEntry, AuditOutcome, CreateAuditLogEntry,
};
use vigil_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};

use super::{CountRow, parse_opt_uuid, parse_uuid, write_error};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRow {
    record_id: String,
    actor_id: String,
    actor_type: String,
    action: String,
    subject_id: Option<String>,
    outcome: String,
    ip_address: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

fn actor_type_to_string(a: &ActorType) -> &'static str {
    match a {
        ActorType::User => "User",
        ActorType::System => "System",
    }
}

fn outcome_to_string(o: &AuditOutcome) -> &'static str {
    match o {
        AuditOutcome::Success => "Success",
        AuditOutcome::Failure => "Failure",
        AuditOutcome::Denied => "Denied",
    }
}

impl AuditRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let actor_type = match self.actor_type.as_str() {
            "User" => ActorType::User,
            "System" => ActorType::System,
            other => {
                return Err(DbError::decode(
                    "audit_log",
                    format!("unknown actor type: {other}"),
                ));
            }
        };
        let outcome = match self.outcome.as_str() {
            "Success" => AuditOutcome::Success,
            "Failure" => AuditOutcome::Failure,
            "Denied" => AuditOutcome::Denied,
            other => {
                return Err(DbError::decode(
                    "audit_log",
                    format!("unknown outcome: {other}"),
                ));
            }
        };
        Ok(AuditLogEntry {
            id: parse_uuid("audit_log", &self.record_id)?,
            actor_id: parse_uuid("audit_log", &self.actor_id)?,
            actor_type,
            action: self
                .action
                .parse::<AuditAction>()
                .map_err(|e| DbError::decode("audit_log", e))?,
            subject_id: parse_opt_uuid("audit_log", self.subject_id)?,
            outcome,
            ip_address: self.ip_address,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

/// SurrealDB implementation of the append-only audit log.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> VigilResult<AuditLogEntry> {
        let id_str = Uuid::new_v4().to_string();
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 actor_id = $actor_id, actor_type = $actor_type, \
                 action = $action, subject_id = $subject_id, \
                 outcome = $outcome, ip_address = $ip_address, \
                 metadata = $metadata; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("actor_id", input.actor_id.to_string()))
            .bind((
                "actor_type",
                actor_type_to_string(&input.actor_type).to_string(),
            ))
            .bind(("action", input.action.as_str().to_string()))
            .bind(("subject_id", input.subject_id.map(|u| u.to_string())))
            .bind(("outcome", outcome_to_string(&input.outcome).to_string()))
            .bind(("ip_address", input.ip_address))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| write_error("audit_log", e))?;

        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> VigilResult<PaginatedResult<AuditLogEntry>> {
        let mut conditions = vec!["true"];
        if filter.actor_id.is_some() {
            conditions.push("actor_id = $actor_id");
        }
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.subject_id.is_some() {
            conditions.push("subject_id = $subject_id");
        }
        if filter.from.is_some() {
            conditions.push("timestamp >= $from");
        }
        if filter.to.is_some() {
            conditions.push("timestamp <= $to");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM audit_log WHERE {where_clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log \
             WHERE {where_clause} \
             ORDER BY timestamp DESC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action.as_str().to_string()));
        }
        if let Some(subject_id) = filter.subject_id {
            builder = builder.bind(("subject_id", subject_id.to_string()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
