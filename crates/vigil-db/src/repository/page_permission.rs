//! SurrealDB implementation of [`PagePermissionRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::permission::{PagePermission, normalize_page_path};
use vigil_core::repository::PagePermissionRepository;

use super::{parse_uuid, write_error};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PagePermissionRow {
    record_id: String,
    user_id: String,
    page_path: String,
    can_access: bool,
    updated_at: DateTime<Utc>,
}

impl PagePermissionRow {
    fn try_into_permission(self) -> Result<PagePermission, DbError> {
        Ok(PagePermission {
            id: parse_uuid("page_permission", &self.record_id)?,
            user_id: parse_uuid("page_permission", &self.user_id)?,
            page_path: self.page_path,
            can_access: self.can_access,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of per-page overrides.
#[derive(Clone)]
pub struct SurrealPagePermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPagePermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, user_id: Uuid, page_path: &str) -> Result<Vec<PagePermissionRow>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM page_permission \
                 WHERE user_id = $user_id AND page_path = $page_path",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("page_path", page_path.to_string()))
            .await?;

        Ok(result.take(0)?)
    }
}

impl<C: Connection> PagePermissionRepository for SurrealPagePermissionRepository<C> {
    async fn set(
        &self,
        user_id: Uuid,
        page_path: &str,
        can_access: bool,
    ) -> VigilResult<PagePermission> {
        let page_path = normalize_page_path(page_path);
        let existing = self.fetch(user_id, &page_path).await?;

        let id_str = match existing.first() {
            Some(row) => row.record_id.clone(),
            None => Uuid::new_v4().to_string(),
        };

        let result = self
            .db
            .query(
                "UPSERT type::record('page_permission', $id) SET \
                 user_id = $user_id, page_path = $page_path, \
                 can_access = $can_access, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", user_id.to_string()))
            .bind(("page_path", page_path.clone()))
            .bind(("can_access", can_access))
            .await
            .map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| write_error("page_permission", e))?;

        let row = self
            .fetch(user_id, &page_path)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "page_permission".into(),
                id: id_str,
            })?;

        Ok(row.try_into_permission()?)
    }

    async fn get(&self, user_id: Uuid, page_path: &str) -> VigilResult<Option<PagePermission>> {
        let page_path = normalize_page_path(page_path);
        let row = self.fetch(user_id, &page_path).await?.into_iter().next();

        Ok(row.map(PagePermissionRow::try_into_permission).transpose()?)
    }

    async fn remove(&self, user_id: Uuid, page_path: &str) -> VigilResult<()> {
        self.db
            .query("DELETE page_permission WHERE user_id = $user_id AND page_path = $page_path")
            .bind(("user_id", user_id.to_string()))
            .bind(("page_path", normalize_page_path(page_path)))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> VigilResult<Vec<PagePermission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM page_permission \
                 WHERE user_id = $user_id ORDER BY page_path ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PagePermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(PagePermissionRow::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
