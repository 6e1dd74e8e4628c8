//! SurrealDB implementation of [`UserRepository`].
//!
//! Passwords arrive already hashed; this layer never sees plaintext.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::user::{CreateUser, DeviceCeiling, UpdateUser, User, UserStatus};
use vigil_core::repository::{PaginatedResult, Pagination, UserRepository};

use super::{CountRow, parse_uuid, write_error};
use crate::error::DbError;

const SELECT_USER: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)";

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    email: String,
    full_name: String,
    badge_number: Option<String>,
    password_hash: String,
    status: String,
    biometric_enabled: bool,
    max_devices: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> Result<UserStatus, DbError> {
    match s {
        "Active" => Ok(UserStatus::Active),
        "Inactive" => Ok(UserStatus::Inactive),
        "Suspended" => Ok(UserStatus::Suspended),
        other => Err(DbError::decode("user", format!("unknown status: {other}"))),
    }
}

fn status_to_string(s: &UserStatus) -> &'static str {
    match s {
        UserStatus::Active => "Active",
        UserStatus::Inactive => "Inactive",
        UserStatus::Suspended => "Suspended",
    }
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let max_devices = DeviceCeiling::from_raw(self.max_devices)
            .map_err(|e| DbError::decode("user", e))?;
        Ok(User {
            id: parse_uuid("user", &self.record_id)?,
            email: self.email,
            full_name: self.full_name,
            badge_number: self.badge_number,
            password_hash: self.password_hash,
            status: parse_status(&self.status)?,
            biometric_enabled: self.biometric_enabled,
            max_devices,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn first_user(rows: Vec<UserRow>, id: impl Into<String>) -> Result<User, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id.into(),
        })?
        .try_into_user()
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> VigilResult<User> {
        let id_str = Uuid::new_v4().to_string();

        let query = format!(
            "CREATE type::record('user', $id) SET \
             email = $email, full_name = $full_name, \
             badge_number = $badge_number, \
             password_hash = $password_hash, \
             status = 'Active', \
             biometric_enabled = false, \
             max_devices = $max_devices; \
             {SELECT_USER};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("email", input.email.to_lowercase()))
            .bind(("full_name", input.full_name))
            .bind(("badge_number", input.badge_number))
            .bind(("password_hash", input.password_hash))
            .bind(("max_devices", input.max_devices.to_raw()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| write_error("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }

    async fn get_by_id(&self, id: Uuid) -> VigilResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(SELECT_USER)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }

    async fn get_by_email(&self, email: &str) -> VigilResult<User> {
        let email = email.trim().to_lowercase();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE email = $email",
            )
            .bind(("email", email.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, format!("email={email}"))?)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> VigilResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.full_name.is_some() {
            sets.push("full_name = $full_name");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.biometric_enabled.is_some() {
            sets.push("biometric_enabled = $biometric_enabled");
        }
        if input.password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {}; {SELECT_USER};",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(full_name) = input.full_name {
            builder = builder.bind(("full_name", full_name));
        }
        if let Some(ref status) = input.status {
            builder = builder.bind(("status", status_to_string(status).to_string()));
        }
        if let Some(biometric_enabled) = input.biometric_enabled {
            builder = builder.bind(("biometric_enabled", biometric_enabled));
        }
        if let Some(password_hash) = input.password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| write_error("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }

    async fn set_max_devices(&self, id: Uuid, ceiling: DeviceCeiling) -> VigilResult<User> {
        let id_str = id.to_string();

        let query = format!(
            "UPDATE type::record('user', $id) SET \
             max_devices = $max_devices, updated_at = time::now(); \
             {SELECT_USER};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("max_devices", ceiling.to_raw()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| write_error("user", e))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }

    async fn list(&self, pagination: Pagination) -> VigilResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
