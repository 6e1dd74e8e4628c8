//! Administrator maintenance of the access tables: role tags, department
//! grants, per-page overrides and the suspicious-login review queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;
use vigil_core::error::{VigilError, VigilResult};
use vigil_core::models::audit::{AuditAction, AuditOutcome};
use vigil_core::models::permission::{PagePermission, normalize_page_path};
use vigil_core::models::role::{CreateDepartmentGrant, DepartmentGrant, RoleTag};
use vigil_core::models::suspicious_login::{ResolutionStatus, SuspiciousLoginAttempt};
use vigil_core::repository::{
    DepartmentGrantRepository, PagePermissionRepository, PaginatedResult, Pagination,
    RoleRepository, SuspiciousLoginRepository, TrustStore, UserRepository,
};

use crate::access::require_admin;
use crate::audit::{self, Actor};

pub struct AdminConsole<T: TrustStore> {
    store: Arc<T>,
}

impl<T: TrustStore> AdminConsole<T> {
    pub fn new(store: Arc<T>) -> Self {
        Self { store }
    }

    /// Admin check that leaves a `Denied` entry behind when it fails.
    async fn authorize(
        &self,
        actor: Uuid,
        action: AuditAction,
        subject_id: Option<Uuid>,
        metadata: Value,
    ) -> VigilResult<()> {
        if let Err(e) = require_admin(self.store.as_ref(), actor).await {
            audit::record(
                self.store.as_ref(),
                Actor::User(actor),
                action,
                subject_id,
                AuditOutcome::Denied,
                metadata,
            )
            .await;
            return Err(e);
        }
        Ok(())
    }

    async fn succeeded(
        &self,
        actor: Uuid,
        action: AuditAction,
        subject_id: Option<Uuid>,
        metadata: Value,
    ) {
        audit::record(
            self.store.as_ref(),
            Actor::User(actor),
            action,
            subject_id,
            AuditOutcome::Success,
            metadata,
        )
        .await;
    }

    // -- Roles ------------------------------------------------------------

    /// Attach `role` to a user; returns the user's roles afterwards.
    pub async fn assign_role(
        &self,
        actor: Uuid,
        user_id: Uuid,
        role: RoleTag,
    ) -> VigilResult<Vec<RoleTag>> {
        let meta = json!({ "role": role });
        self.authorize(actor, AuditAction::RoleAssigned, Some(user_id), meta.clone())
            .await?;
        self.store.users().get_by_id(user_id).await?;

        let roles = self.store.roles();
        roles.assign(user_id, role).await?;
        info!(user_id = %user_id, %role, assigned_by = %actor, "Role assigned");
        self.succeeded(actor, AuditAction::RoleAssigned, Some(user_id), meta)
            .await;
        roles.get_user_roles(user_id).await
    }

    /// Detach `role` from a user. Administrators cannot drop their own
    /// admin tag.
    pub async fn unassign_role(
        &self,
        actor: Uuid,
        user_id: Uuid,
        role: RoleTag,
    ) -> VigilResult<Vec<RoleTag>> {
        let meta = json!({ "role": role });
        self.authorize(actor, AuditAction::RoleUnassigned, Some(user_id), meta.clone())
            .await?;
        if actor == user_id && role == RoleTag::Admin {
            return Err(VigilError::validation(
                "administrators cannot remove their own admin role",
            ));
        }

        let roles = self.store.roles();
        roles.unassign(user_id, role).await?;
        info!(user_id = %user_id, %role, removed_by = %actor, "Role removed");
        self.succeeded(actor, AuditAction::RoleUnassigned, Some(user_id), meta)
            .await;
        roles.get_user_roles(user_id).await
    }

    // -- Department grants ------------------------------------------------

    pub async fn grant_department(
        &self,
        actor: Uuid,
        user_id: Uuid,
        department: RoleTag,
        expires_at: Option<DateTime<Utc>>,
    ) -> VigilResult<DepartmentGrant> {
        let meta = json!({ "department": department, "expires_at": expires_at });
        self.authorize(actor, AuditAction::GrantCreated, Some(user_id), meta.clone())
            .await?;
        if !department.is_department() {
            return Err(VigilError::validation(format!(
                "{department} is not a department"
            )));
        }
        if expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(VigilError::validation("grant expiry must be in the future"));
        }
        self.store.users().get_by_id(user_id).await?;

        let grant = self
            .store
            .grants()
            .create(CreateDepartmentGrant {
                user_id,
                department,
                granted_by: Some(actor),
                expires_at,
            })
            .await?;
        info!(
            user_id = %user_id,
            grant_id = %grant.id,
            %department,
            granted_by = %actor,
            "Department access granted"
        );
        self.succeeded(actor, AuditAction::GrantCreated, Some(grant.id), meta)
            .await;
        Ok(grant)
    }

    pub async fn set_grant_active(
        &self,
        actor: Uuid,
        grant_id: Uuid,
        is_active: bool,
    ) -> VigilResult<DepartmentGrant> {
        let meta = json!({ "is_active": is_active });
        self.authorize(actor, AuditAction::GrantUpdated, Some(grant_id), meta)
            .await?;

        let grant = self.store.grants().set_active(grant_id, is_active).await?;
        info!(grant_id = %grant_id, user_id = %grant.user_id, is_active, "Department grant updated");
        self.succeeded(
            actor,
            AuditAction::GrantUpdated,
            Some(grant_id),
            json!({ "user_id": grant.user_id, "department": grant.department, "is_active": is_active }),
        )
        .await;
        Ok(grant)
    }

    // -- Page overrides ---------------------------------------------------

    pub async fn set_page_permission(
        &self,
        actor: Uuid,
        user_id: Uuid,
        page_path: &str,
        can_access: bool,
    ) -> VigilResult<PagePermission> {
        let page = normalize_page_path(page_path);
        let meta = json!({ "page_path": page, "can_access": can_access });
        self.authorize(actor, AuditAction::PagePermissionSet, Some(user_id), meta.clone())
            .await?;
        self.store.users().get_by_id(user_id).await?;

        let permission = self.store.pages().set(user_id, &page, can_access).await?;
        info!(user_id = %user_id, page = %page, can_access, "Page override set");
        self.succeeded(actor, AuditAction::PagePermissionSet, Some(user_id), meta)
            .await;
        Ok(permission)
    }

    pub async fn remove_page_permission(
        &self,
        actor: Uuid,
        user_id: Uuid,
        page_path: &str,
    ) -> VigilResult<()> {
        let page = normalize_page_path(page_path);
        let meta = json!({ "page_path": page });
        self.authorize(
            actor,
            AuditAction::PagePermissionRemoved,
            Some(user_id),
            meta.clone(),
        )
        .await?;

        self.store.pages().remove(user_id, &page).await?;
        info!(user_id = %user_id, page = %page, "Page override removed");
        self.succeeded(actor, AuditAction::PagePermissionRemoved, Some(user_id), meta)
            .await;
        Ok(())
    }

    pub async fn list_page_permissions(
        &self,
        actor: Uuid,
        user_id: Uuid,
    ) -> VigilResult<Vec<PagePermission>> {
        require_admin(self.store.as_ref(), actor).await?;
        self.store.pages().list_for_user(user_id).await
    }

    // -- Suspicious logins ------------------------------------------------

    pub async fn list_suspicious_logins(
        &self,
        actor: Uuid,
        pagination: Pagination,
    ) -> VigilResult<PaginatedResult<SuspiciousLoginAttempt>> {
        require_admin(self.store.as_ref(), actor).await?;
        self.store.suspicious_logins().list(pagination).await
    }

    /// Move a suspicious-login record through the review queue.
    pub async fn update_suspicious_login(
        &self,
        actor: Uuid,
        id: Uuid,
        status: ResolutionStatus,
        notes: Option<String>,
    ) -> VigilResult<SuspiciousLoginAttempt> {
        let meta = json!({ "status": status });
        self.authorize(actor, AuditAction::SuspiciousLoginUpdated, Some(id), meta.clone())
            .await?;

        let updated = self
            .store
            .suspicious_logins()
            .update_status(id, status, notes)
            .await?;
        info!(id = %id, status = ?status, reviewed_by = %actor, "Suspicious login reviewed");
        self.succeeded(actor, AuditAction::SuspiciousLoginUpdated, Some(id), meta)
            .await;
        Ok(updated)
    }
}
