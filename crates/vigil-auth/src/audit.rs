//! Audit-trail writes shared by the registry, gate and approval workflow.
//!
//! A mutation and its audit entry are separate writes. A failed audit
//! append is logged and does not undo the mutation.

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;
use vigil_core::models::audit::{ActorType, AuditAction, AuditOutcome, CreateAuditLogEntry};
use vigil_core::repository::{AuditLogRepository, TrustStore};

/// Who performed an audited action.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Actor {
    User(Uuid),
    /// Automatic decisions taken by the login gate.
    System,
}

pub(crate) async fn record<T: TrustStore>(
    store: &T,
    actor: Actor,
    action: AuditAction,
    subject_id: Option<Uuid>,
    outcome: AuditOutcome,
    metadata: Value,
) {
    let (actor_id, actor_type) = match actor {
        Actor::User(id) => (id, ActorType::User),
        Actor::System => (Uuid::nil(), ActorType::System),
    };

    let entry = CreateAuditLogEntry {
        actor_id,
        actor_type,
        action,
        subject_id,
        outcome,
        ip_address: None,
        metadata: Some(metadata),
    };

    if let Err(e) = store.audit().append(entry).await {
        warn!(%action, error = %e, "Audit log append failed");
    }
}
