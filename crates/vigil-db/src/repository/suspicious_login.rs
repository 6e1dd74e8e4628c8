//! SurrealDB implementation of [`SuspiciousLoginRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::suspicious_login::{
    CreateSuspiciousLogin, ResolutionStatus, Severity, SuspiciousLoginAttempt,
};
use vigil_core::repository::{PaginatedResult, Pagination, SuspiciousLoginRepository};

use super::{CountRow, parse_opt_uuid, parse_uuid, write_error};
use crate::error::DbError;

const SELECT_SUSPICIOUS: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('suspicious_login', $id)";

#[derive(Debug, SurrealValue)]
struct SuspiciousLoginRow {
    record_id: String,
    user_id: Option<String>,
    email: String,
    ip_address: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    user_agent: Option<String>,
    blocked: bool,
    severity: String,
    status: String,
    notes: Option<String>,
    error: Option<String>,
    attempted_at: DateTime<Utc>,
}

fn parse_severity(s: &str) -> Result<Severity, DbError> {
    match s {
        "Low" => Ok(Severity::Low),
        "Medium" => Ok(Severity::Medium),
        "High" => Ok(Severity::High),
        "Critical" => Ok(Severity::Critical),
        other => Err(DbError::decode(
            "suspicious_login",
            format!("unknown severity: {other}"),
        )),
    }
}

fn severity_to_string(s: Severity) -> &'static str {
    match s {
        Severity::Low => "Low",
        Severity::Medium => "Medium",
        Severity::High => "High",
        Severity::Critical => "Critical",
    }
}

fn parse_status(s: &str) -> Result<ResolutionStatus, DbError> {
    match s {
        "Open" => Ok(ResolutionStatus::Open),
        "Investigating" => Ok(ResolutionStatus::Investigating),
        "Resolved" => Ok(ResolutionStatus::Resolved),
        "FalsePositive" => Ok(ResolutionStatus::FalsePositive),
        other => Err(DbError::decode(
            "suspicious_login",
            format!("unknown status: {other}"),
        )),
    }
}

fn status_to_string(s: ResolutionStatus) -> &'static str {
    match s {
        ResolutionStatus::Open => "Open",
        ResolutionStatus::Investigating => "Investigating",
        ResolutionStatus::Resolved => "Resolved",
        ResolutionStatus::FalsePositive => "FalsePositive",
    }
}

impl SuspiciousLoginRow {
    fn try_into_attempt(self) -> Result<SuspiciousLoginAttempt, DbError> {
        Ok(SuspiciousLoginAttempt {
            id: parse_uuid("suspicious_login", &self.record_id)?,
            user_id: parse_opt_uuid("suspicious_login", self.user_id)?,
            email: self.email,
            ip_address: self.ip_address,
            country: self.country,
            country_code: self.country_code,
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            user_agent: self.user_agent,
            blocked: self.blocked,
            severity: parse_severity(&self.severity)?,
            status: parse_status(&self.status)?,
            notes: self.notes,
            error: self.error,
            attempted_at: self.attempted_at,
        })
    }
}

fn first_attempt(
    rows: Vec<SuspiciousLoginRow>,
    id: String,
) -> Result<SuspiciousLoginAttempt, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "suspicious_login".into(),
            id,
        })?
        .try_into_attempt()
}

/// SurrealDB implementation of the suspicious-login audit trail.
#[derive(Clone)]
pub struct SurrealSuspiciousLoginRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSuspiciousLoginRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SuspiciousLoginRepository for SurrealSuspiciousLoginRepository<C> {
    async fn create(&self, input: CreateSuspiciousLogin) -> VigilResult<SuspiciousLoginAttempt> {
        let id_str = Uuid::new_v4().to_string();

        let query = format!(
            "CREATE type::record('suspicious_login', $id) SET \
             user_id = $user_id, email = $email, \
             ip_address = $ip_address, country = $country, \
             country_code = $country_code, city = $city, \
             latitude = $latitude, longitude = $longitude, \
             user_agent = $user_agent, blocked = $blocked, \
             severity = $severity, status = 'Open', \
             error = $error; \
             {SELECT_SUSPICIOUS};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.map(|u| u.to_string())))
            .bind(("email", input.email))
            .bind(("ip_address", input.ip_address))
            .bind(("country", input.country))
            .bind(("country_code", input.country_code))
            .bind(("city", input.city))
            .bind(("latitude", input.latitude))
            .bind(("longitude", input.longitude))
            .bind(("user_agent", input.user_agent))
            .bind(("blocked", input.blocked))
            .bind(("severity", severity_to_string(input.severity).to_string()))
            .bind(("error", input.error))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| write_error("suspicious_login", e))?;

        let rows: Vec<SuspiciousLoginRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_attempt(rows, id_str)?)
    }

    async fn get_by_id(&self, id: Uuid) -> VigilResult<SuspiciousLoginAttempt> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(SELECT_SUSPICIOUS)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SuspiciousLoginRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_attempt(rows, id_str)?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ResolutionStatus,
        notes: Option<String>,
    ) -> VigilResult<SuspiciousLoginAttempt> {
        let id_str = id.to_string();

        let mut sets = vec!["status = $status"];
        if notes.is_some() {
            sets.push("notes = $notes");
        }
        let query = format!(
            "UPDATE type::record('suspicious_login', $id) SET {}; {SELECT_SUSPICIOUS};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("status", status_to_string(status).to_string()));
        if let Some(notes) = notes {
            builder = builder.bind(("notes", notes));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| write_error("suspicious_login", e))?;

        let rows: Vec<SuspiciousLoginRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_attempt(rows, id_str)?)
    }

    async fn list(
        &self,
        pagination: Pagination,
    ) -> VigilResult<PaginatedResult<SuspiciousLoginAttempt>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM suspicious_login GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM suspicious_login \
                 ORDER BY attempted_at DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SuspiciousLoginRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(SuspiciousLoginRow::try_into_attempt)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
