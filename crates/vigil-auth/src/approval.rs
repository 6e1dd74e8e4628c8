//! Administrator decisions on devices held back by the ceiling.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;
use vigil_core::error::{VigilError, VigilResult};
use vigil_core::models::audit::{AuditAction, AuditOutcome};
use vigil_core::models::blocked_attempt::{
    AttemptStatus, BlockedAttempt, CreateBlockedAttempt, ResolveBlockedAttempt,
};
use vigil_core::models::device::{DeviceFingerprint, DeviceInfo, DeviceRecord};
use vigil_core::repository::{
    BlockedAttemptRepository, DeviceRepository, PaginatedResult, Pagination, TrustStore,
    UserRepository,
};

use crate::access::require_admin;
use crate::audit::{self, Actor};
use crate::events::{SecurityEvent, SecurityEventBus};
use crate::registry::DeviceRegistry;

/// Result of approving a blocked attempt.
#[derive(Debug, Clone)]
pub struct Approval {
    pub attempt: BlockedAttempt,
    /// `None` only when an already-approved device was later deleted.
    pub device: Option<DeviceRecord>,
}

/// Input for blacklisting a fingerprint directly.
#[derive(Debug, Clone)]
pub struct BlacklistRequest {
    pub user_id: Uuid,
    pub fingerprint: DeviceFingerprint,
    pub device_info: DeviceInfo,
    pub reason: String,
    pub notes: Option<String>,
}

pub struct ApprovalWorkflow<T: TrustStore> {
    store: Arc<T>,
    registry: DeviceRegistry<T>,
    events: SecurityEventBus,
}

impl<T: TrustStore> ApprovalWorkflow<T> {
    pub fn new(store: Arc<T>, events: SecurityEventBus) -> Self {
        Self {
            registry: DeviceRegistry::new(store.clone(), events.clone()),
            store,
            events,
        }
    }

    /// Turn a pending attempt into an active device, past the ceiling.
    /// Approving an approved attempt returns it unchanged.
    pub async fn approve(&self, actor: Uuid, attempt_id: Uuid) -> VigilResult<Approval> {
        self.approve_matching(actor, attempt_id, None, None).await
    }

    /// [`Self::approve`], refusing before anything is written when the
    /// attempt does not belong to `user_id` or carry `fingerprint`.
    pub async fn approve_matching(
        &self,
        actor: Uuid,
        attempt_id: Uuid,
        user_id: Option<Uuid>,
        fingerprint: Option<&DeviceFingerprint>,
    ) -> VigilResult<Approval> {
        require_admin(self.store.as_ref(), actor).await?;
        let attempt = self.store.blocked_attempts().get_by_id(attempt_id).await?;

        if user_id.is_some_and(|u| u != attempt.user_id)
            || fingerprint.is_some_and(|fp| *fp != attempt.fingerprint)
        {
            return Err(VigilError::validation(
                "attempt does not match user or fingerprint",
            ));
        }

        match attempt.status {
            AttemptStatus::Blacklisted => Err(VigilError::validation(
                "a blacklisted device cannot be approved",
            )),
            AttemptStatus::Approved => {
                let device = self
                    .store
                    .devices()
                    .find_by_fingerprint(attempt.user_id, &attempt.fingerprint)
                    .await?;
                Ok(Approval { attempt, device })
            }
            AttemptStatus::Pending => {
                let device = self
                    .registry
                    .admit_approved(
                        actor,
                        attempt.user_id,
                        &attempt.fingerprint,
                        &attempt.device_info,
                    )
                    .await?;

                let attempt = self
                    .store
                    .blocked_attempts()
                    .resolve(
                        attempt_id,
                        ResolveBlockedAttempt {
                            status: AttemptStatus::Approved,
                            resolved_by: actor,
                            notes: None,
                        },
                    )
                    .await?;

                info!(
                    attempt_id = %attempt_id,
                    device_id = %device.id,
                    user_id = %attempt.user_id,
                    approved_by = %actor,
                    "Device approved"
                );
                audit::record(
                    self.store.as_ref(),
                    Actor::User(actor),
                    AuditAction::DeviceApproved,
                    Some(device.id),
                    AuditOutcome::Success,
                    json!({
                        "attempt_id": attempt_id,
                        "user_id": attempt.user_id,
                        "fingerprint": attempt.fingerprint,
                    }),
                )
                .await;
                self.events.publish(SecurityEvent::DeviceApproved {
                    attempt_id,
                    device_id: device.id,
                    user_id: attempt.user_id,
                });

                Ok(Approval {
                    attempt,
                    device: Some(device),
                })
            }
        }
    }

    /// Permanently deny the attempt's fingerprint for its user.
    pub async fn blacklist(
        &self,
        actor: Uuid,
        attempt_id: Uuid,
        notes: Option<String>,
    ) -> VigilResult<BlockedAttempt> {
        require_admin(self.store.as_ref(), actor).await?;
        let attempt = self.store.blocked_attempts().get_by_id(attempt_id).await?;
        if attempt.status == AttemptStatus::Blacklisted {
            return Ok(attempt);
        }
        self.apply_blacklist(actor, attempt, notes).await
    }

    /// Blacklist a fingerprint that may not have a blocked attempt yet.
    /// A pending attempt for it is resolved; otherwise one is created.
    pub async fn blacklist_fingerprint(
        &self,
        actor: Uuid,
        request: BlacklistRequest,
    ) -> VigilResult<BlockedAttempt> {
        require_admin(self.store.as_ref(), actor).await?;
        let attempts = self.store.blocked_attempts();

        if let Some(listed) = attempts
            .find_by_fingerprint(
                request.user_id,
                &request.fingerprint,
                AttemptStatus::Blacklisted,
            )
            .await?
        {
            return Ok(listed);
        }

        let attempt = match attempts
            .find_by_fingerprint(request.user_id, &request.fingerprint, AttemptStatus::Pending)
            .await?
        {
            Some(pending) => pending,
            None => {
                let user = self.store.users().get_by_id(request.user_id).await?;
                attempts
                    .create(CreateBlockedAttempt {
                        user_id: user.id,
                        user_email: user.email,
                        user_name: user.full_name,
                        fingerprint: request.fingerprint,
                        device_info: request.device_info,
                        reason: request.reason,
                        status: AttemptStatus::Pending,
                        notes: None,
                    })
                    .await?
            }
        };

        self.apply_blacklist(actor, attempt, request.notes).await
    }

    async fn apply_blacklist(
        &self,
        actor: Uuid,
        attempt: BlockedAttempt,
        notes: Option<String>,
    ) -> VigilResult<BlockedAttempt> {
        let resolved = self
            .store
            .blocked_attempts()
            .resolve(
                attempt.id,
                ResolveBlockedAttempt {
                    status: AttemptStatus::Blacklisted,
                    resolved_by: actor,
                    notes,
                },
            )
            .await?;

        let device = self
            .registry
            .revoke_fingerprint(resolved.user_id, &resolved.fingerprint, "device blacklisted")
            .await?;

        info!(
            attempt_id = %resolved.id,
            user_id = %resolved.user_id,
            fingerprint = %resolved.fingerprint.short(),
            blacklisted_by = %actor,
            "Device blacklisted"
        );
        audit::record(
            self.store.as_ref(),
            Actor::User(actor),
            AuditAction::DeviceBlacklisted,
            device.as_ref().map(|d| d.id).or(Some(resolved.id)),
            AuditOutcome::Success,
            json!({
                "attempt_id": resolved.id,
                "user_id": resolved.user_id,
                "fingerprint": resolved.fingerprint,
                "notes": resolved.notes,
            }),
        )
        .await;
        self.events.publish(SecurityEvent::DeviceBlacklisted {
            user_id: resolved.user_id,
            fingerprint: resolved.fingerprint.clone(),
        });

        Ok(resolved)
    }

    pub async fn list_pending(
        &self,
        actor: Uuid,
        pagination: Pagination,
    ) -> VigilResult<PaginatedResult<BlockedAttempt>> {
        require_admin(self.store.as_ref(), actor).await?;
        self.store
            .blocked_attempts()
            .list_by_status(AttemptStatus::Pending, pagination)
            .await
    }
}
