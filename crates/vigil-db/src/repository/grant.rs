//! SurrealDB implementation of [`DepartmentGrantRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::role::{CreateDepartmentGrant, DepartmentGrant, RoleTag};
use vigil_core::repository::DepartmentGrantRepository;

use super::{parse_opt_uuid, parse_uuid, write_error};
use crate::error::DbError;

const SELECT_GRANT: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('department_grant', $id)";

#[derive(Debug, SurrealValue)]
struct GrantRow {
    record_id: String,
    user_id: String,
    department: String,
    is_active: bool,
    granted_by: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl GrantRow {
    fn try_into_grant(self) -> Result<DepartmentGrant, DbError> {
        Ok(DepartmentGrant {
            id: parse_uuid("department_grant", &self.record_id)?,
            user_id: parse_uuid("department_grant", &self.user_id)?,
            department: self
                .department
                .parse::<RoleTag>()
                .map_err(|e| DbError::decode("department_grant", e))?,
            is_active: self.is_active,
            granted_by: parse_opt_uuid("department_grant", self.granted_by)?,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

fn first_grant(rows: Vec<GrantRow>, id: String) -> Result<DepartmentGrant, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "department_grant".into(),
            id,
        })?
        .try_into_grant()
}

/// SurrealDB implementation of time-boxed department grants.
#[derive(Clone)]
pub struct SurrealDepartmentGrantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDepartmentGrantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> DepartmentGrantRepository for SurrealDepartmentGrantRepository<C> {
    async fn create(&self, input: CreateDepartmentGrant) -> VigilResult<DepartmentGrant> {
        let id_str = Uuid::new_v4().to_string();

        let query = format!(
            "CREATE type::record('department_grant', $id) SET \
             user_id = $user_id, department = $department, \
             is_active = true, granted_by = $granted_by, \
             expires_at = $expires_at; \
             {SELECT_GRANT};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("department", input.department.as_str().to_string()))
            .bind(("granted_by", input.granted_by.map(|u| u.to_string())))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| write_error("department_grant", e))?;

        let rows: Vec<GrantRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_grant(rows, id_str)?)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> VigilResult<DepartmentGrant> {
        let id_str = id.to_string();

        let query = format!(
            "UPDATE type::record('department_grant', $id) SET \
             is_active = $is_active; \
             {SELECT_GRANT};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("is_active", is_active))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| write_error("department_grant", e))?;

        let rows: Vec<GrantRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_grant(rows, id_str)?)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        department: RoleTag,
    ) -> VigilResult<Vec<DepartmentGrant>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM department_grant \
                 WHERE user_id = $user_id AND department = $department \
                 ORDER BY created_at DESC",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("department", department.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(GrantRow::try_into_grant)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
