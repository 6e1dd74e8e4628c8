//! In-process push notifications for security-relevant changes.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;
use vigil_core::models::device::DeviceFingerprint;
use vigil_core::models::suspicious_login::Severity;

/// Something an operator console may want to react to live.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityEvent {
    SuspiciousLogin {
        record_id: Uuid,
        user_id: Option<Uuid>,
        email: String,
        blocked: bool,
        severity: Severity,
    },
    PendingApproval {
        attempt_id: Uuid,
        user_id: Uuid,
        fingerprint: DeviceFingerprint,
    },
    DeviceApproved {
        attempt_id: Uuid,
        device_id: Uuid,
        user_id: Uuid,
    },
    DeviceBlacklisted {
        user_id: Uuid,
        fingerprint: DeviceFingerprint,
    },
    SessionsRevoked {
        user_id: Uuid,
        device_id: Option<Uuid>,
        reason: String,
    },
}

/// Fan-out bus over `tokio::sync::broadcast`.
#[derive(Clone)]
pub struct SecurityEventBus {
    sender: broadcast::Sender<SecurityEvent>,
}

impl SecurityEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: SecurityEvent) {
        if self.sender.send(event).is_err() {
            debug!("Security event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SecurityEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<SecurityEvent>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone. Events missed because
    /// this subscriber fell behind are logged and skipped.
    pub async fn recv(&mut self) -> Option<SecurityEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Security event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Fresh subscription on the same bus, starting from new events only.
    pub fn resubscribe(&self) -> Subscription {
        Subscription {
            receiver: self.receiver.resubscribe(),
        }
    }
}
