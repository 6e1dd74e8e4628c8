//! SurrealDB implementation of [`RoleRepository`].

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::role::RoleTag;
use vigil_core::repository::RoleRepository;

use super::write_error;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RoleRow {
    role: String,
}

/// SurrealDB implementation of the role-tag table.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn assign(&self, user_id: Uuid, role: RoleTag) -> VigilResult<()> {
        // Deterministic record id makes re-assignment idempotent.
        let record = format!("{user_id}:{}", role.as_str());

        let result = self
            .db
            .query(
                "UPSERT type::record('user_role', $record) SET \
                 user_id = $user_id, role = $role",
            )
            .bind(("record", record))
            .bind(("user_id", user_id.to_string()))
            .bind(("role", role.as_str().to_string()))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(|e| write_error("user_role", e))?;

        Ok(())
    }

    async fn unassign(&self, user_id: Uuid, role: RoleTag) -> VigilResult<()> {
        self.db
            .query("DELETE user_role WHERE user_id = $user_id AND role = $role")
            .bind(("user_id", user_id.to_string()))
            .bind(("role", role.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn get_user_roles(&self, user_id: Uuid) -> VigilResult<Vec<RoleTag>> {
        let mut result = self
            .db
            .query("SELECT role FROM user_role WHERE user_id = $user_id")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            let tag = row
                .role
                .parse::<RoleTag>()
                .map_err(|e| DbError::decode("user_role", e))?;
            if !roles.contains(&tag) {
                roles.push(tag);
            }
        }

        Ok(roles)
    }
}
