//! The login gate: fingerprint, geofence and device admission for every
//! authentication attempt, and the re-check run on protected navigation.
//!
//! Geolocation fails open: a lookup error or timeout lets the login through
//! and leaves a `SuspiciousLoginAttempt` carrying the error. The device
//! check fails closed: any registry error or timeout blocks the attempt.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;
use vigil_core::error::{VigilError, VigilResult};
use vigil_core::models::audit::{AuditAction, AuditOutcome};
use vigil_core::models::blocked_attempt::{AttemptStatus, BlockedAttempt, CreateBlockedAttempt};
use vigil_core::models::device::{ClientEnvironment, DeviceFingerprint, DeviceInfo, DeviceRecord};
use vigil_core::models::session::SessionContext;
use vigil_core::models::suspicious_login::{CreateSuspiciousLogin, Severity};
use vigil_core::models::user::User;
use vigil_core::repository::{
    BlockedAttemptRepository, DeviceRepository, SessionRepository, SuspiciousLoginRepository,
    TrustStore, UserRepository,
};

use crate::audit::{self, Actor};
use crate::config::AuthConfig;
use crate::events::{SecurityEvent, SecurityEventBus};
use crate::fingerprint;
use crate::geo::{GeoLocation, GeoLocator};
use crate::registry::{self, DeviceRegistry};

/// Run `fut` with an upper bound; elapsing maps to
/// [`VigilError::ExternalService`].
pub(crate) async fn bounded<F, R>(limit: Duration, what: &str, fut: F) -> VigilResult<R>
where
    F: Future<Output = VigilResult<R>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(VigilError::ExternalService(format!(
            "{what} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    Start,
    Fingerprinted,
    GeoChecked,
    DeviceChecked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    OutsideAllowedRegion { country_code: String },
    DeviceBlacklisted,
    DeviceDisabled,
    /// The flow accepts only a device already registered to the user.
    UnknownDevice,
    RegistryUnavailable,
    SessionRevoked,
}

impl BlockReason {
    pub fn message(&self) -> String {
        match self {
            Self::OutsideAllowedRegion { country_code } => {
                format!("login from {country_code} is not permitted")
            }
            Self::DeviceBlacklisted => "this device has been blacklisted".into(),
            Self::DeviceDisabled => "this device has been disabled".into(),
            Self::UnknownDevice => "this device is not registered for this account".into(),
            Self::RegistryUnavailable => "device verification is unavailable".into(),
            Self::SessionRevoked => "session is no longer valid".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum GateDecision {
    Allowed { device: DeviceRecord },
    Blocked { reason: BlockReason },
    PendingApproval { attempt: BlockedAttempt },
}

/// Result of [`LoginGate::evaluate`] with the states it passed through.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub decision: GateDecision,
    pub stages: Vec<GateStage>,
    pub fingerprint: DeviceFingerprint,
    pub device_info: DeviceInfo,
    pub location: Option<GeoLocation>,
}

/// Signals accompanying an authentication attempt.
#[derive(Debug, Clone, Default)]
pub struct LoginAttempt {
    pub environment: ClientEnvironment,
    pub ip_address: Option<String>,
    /// Admit only a fingerprint with an active record; never register or
    /// queue a new device.
    pub known_device_only: bool,
}

/// Outcome of the geofence check, as returned by `verify-login-location`.
#[derive(Debug, Clone, Serialize)]
pub struct LocationVerdict {
    pub allowed: bool,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip)]
    pub location: Option<GeoLocation>,
}

pub struct LoginGate<T: TrustStore, G: GeoLocator> {
    store: Arc<T>,
    geo: Arc<G>,
    registry: DeviceRegistry<T>,
    config: Arc<AuthConfig>,
    events: SecurityEventBus,
}

impl<T: TrustStore, G: GeoLocator> LoginGate<T, G> {
    pub fn new(
        store: Arc<T>,
        geo: Arc<G>,
        config: Arc<AuthConfig>,
        events: SecurityEventBus,
    ) -> Self {
        Self {
            registry: DeviceRegistry::new(store.clone(), events.clone()),
            store,
            geo,
            config,
            events,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry<T> {
        &self.registry
    }

    /// Geofence check for a request origin. Only lookup failures and
    /// out-of-region origins leave a suspicious-login record.
    pub async fn check_location(
        &self,
        user_id: Option<Uuid>,
        email: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> LocationVerdict {
        let lookup = match ip_address {
            Some(ip) => {
                bounded(self.config.geo_timeout, "geolocation", async {
                    self.geo.locate(ip).await.map_err(VigilError::from)
                })
                .await
            }
            None => Err(VigilError::ExternalService(
                "no client address to geolocate".into(),
            )),
        };

        let location = match lookup {
            Ok(location) => location,
            Err(e) => {
                warn!(email, ip = ?ip_address, error = %e, "Geolocation failed; allowing login");
                self.record_suspicious(
                    user_id,
                    email,
                    user_agent,
                    ip_address,
                    None,
                    false,
                    Some(e.to_string()),
                )
                .await;
                return LocationVerdict {
                    allowed: true,
                    blocked: false,
                    country_code: None,
                    location: None,
                };
            }
        };

        if self.config.country_allowed(&location.country_code) {
            return LocationVerdict {
                allowed: true,
                blocked: false,
                country_code: Some(location.country_code.clone()),
                location: Some(location),
            };
        }

        warn!(
            email,
            ip = %location.ip,
            country_code = %location.country_code,
            "Login from outside the permitted region"
        );
        self.record_suspicious(
            user_id,
            email,
            user_agent,
            ip_address,
            Some(&location),
            true,
            None,
        )
        .await;
        LocationVerdict {
            allowed: false,
            blocked: true,
            country_code: Some(location.country_code.clone()),
            location: Some(location),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_suspicious(
        &self,
        user_id: Option<Uuid>,
        email: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
        location: Option<&GeoLocation>,
        blocked: bool,
        error: Option<String>,
    ) {
        let severity = if blocked { Severity::High } else { Severity::Low };
        let input = CreateSuspiciousLogin {
            user_id,
            email: email.to_string(),
            ip_address: ip_address.map(str::to_string),
            country: location.and_then(|l| l.country.clone()),
            country_code: location.map(|l| l.country_code.clone()),
            city: location.and_then(|l| l.city.clone()),
            latitude: location.and_then(|l| l.latitude),
            longitude: location.and_then(|l| l.longitude),
            user_agent: user_agent.map(str::to_string),
            blocked,
            severity,
            error,
        };

        match self.store.suspicious_logins().create(input).await {
            Ok(record) => self.events.publish(SecurityEvent::SuspiciousLogin {
                record_id: record.id,
                user_id,
                email: email.to_string(),
                blocked,
                severity,
            }),
            Err(e) => error!(email, error = %e, "Failed to record suspicious login"),
        }
    }

    /// Walk `Start → Fingerprinted → GeoChecked → DeviceChecked` for one
    /// authentication attempt.
    pub async fn evaluate(&self, user: &User, attempt: &LoginAttempt) -> GateOutcome {
        let mut stages = vec![GateStage::Start];

        let fingerprint = fingerprint::generate(&attempt.environment);
        let device_info = fingerprint::describe(&attempt.environment);
        stages.push(GateStage::Fingerprinted);

        let verdict = self
            .check_location(
                Some(user.id),
                &user.email,
                attempt.environment.user_agent.as_deref(),
                attempt.ip_address.as_deref(),
            )
            .await;
        stages.push(GateStage::GeoChecked);

        if verdict.blocked {
            let reason = BlockReason::OutsideAllowedRegion {
                country_code: verdict.country_code.clone().unwrap_or_default(),
            };
            self.audit_block(user, &fingerprint, &reason).await;
            return GateOutcome {
                decision: GateDecision::Blocked { reason },
                stages,
                fingerprint,
                device_info,
                location: verdict.location,
            };
        }

        let decision = self
            .check_device(user, &fingerprint, &device_info, attempt.known_device_only)
            .await;
        stages.push(GateStage::DeviceChecked);

        if let GateDecision::Blocked { reason } = &decision {
            self.audit_block(user, &fingerprint, reason).await;
        }

        GateOutcome {
            decision,
            stages,
            fingerprint,
            device_info,
            location: verdict.location,
        }
    }

    async fn check_device(
        &self,
        user: &User,
        fingerprint: &DeviceFingerprint,
        device_info: &DeviceInfo,
        known_device_only: bool,
    ) -> GateDecision {
        let admitted = if known_device_only {
            bounded(
                self.config.registry_timeout,
                "device registry",
                self.registry.record_known_login(user, fingerprint),
            )
            .await
        } else {
            bounded(
                self.config.registry_timeout,
                "device registry",
                self.registry.record_login(user, fingerprint, device_info),
            )
            .await
        };

        match admitted {
            Ok(device) => GateDecision::Allowed { device },
            Err(VigilError::DeviceBlocked { reason }) => GateDecision::Blocked {
                reason: match reason.as_str() {
                    registry::BLACKLISTED => BlockReason::DeviceBlacklisted,
                    registry::UNRECOGNIZED => BlockReason::UnknownDevice,
                    _ => BlockReason::DeviceDisabled,
                },
            },
            Err(VigilError::DeviceLimitExceeded { ceiling, .. }) => {
                match self
                    .hold_for_approval(user, fingerprint, device_info, ceiling)
                    .await
                {
                    Ok(attempt) => GateDecision::PendingApproval { attempt },
                    Err(e) => {
                        error!(user_id = %user.id, error = %e, "Could not queue device for approval");
                        GateDecision::Blocked {
                            reason: BlockReason::RegistryUnavailable,
                        }
                    }
                }
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Device registry check failed; denying login");
                GateDecision::Blocked {
                    reason: BlockReason::RegistryUnavailable,
                }
            }
        }
    }

    /// Queue an over-ceiling device, reusing an existing pending attempt for
    /// the same fingerprint.
    async fn hold_for_approval(
        &self,
        user: &User,
        fingerprint: &DeviceFingerprint,
        device_info: &DeviceInfo,
        ceiling: u32,
    ) -> VigilResult<BlockedAttempt> {
        let attempts = self.store.blocked_attempts();
        if let Some(pending) = attempts
            .find_by_fingerprint(user.id, fingerprint, AttemptStatus::Pending)
            .await?
        {
            return Ok(pending);
        }

        let attempt = attempts
            .create(CreateBlockedAttempt {
                user_id: user.id,
                user_email: user.email.clone(),
                user_name: user.full_name.clone(),
                fingerprint: fingerprint.clone(),
                device_info: device_info.clone(),
                reason: format!("Device limit reached ({ceiling})"),
                status: AttemptStatus::Pending,
                notes: None,
            })
            .await?;

        info!(
            user_id = %user.id,
            attempt_id = %attempt.id,
            fingerprint = %fingerprint.short(),
            "Device held for approval"
        );
        self.events.publish(SecurityEvent::PendingApproval {
            attempt_id: attempt.id,
            user_id: user.id,
            fingerprint: fingerprint.clone(),
        });
        audit::record(
            self.store.as_ref(),
            Actor::System,
            AuditAction::DevicePendingApproval,
            Some(attempt.id),
            AuditOutcome::Denied,
            json!({ "user_id": user.id, "fingerprint": fingerprint }),
        )
        .await;
        Ok(attempt)
    }

    async fn audit_block(&self, user: &User, fingerprint: &DeviceFingerprint, reason: &BlockReason) {
        audit::record(
            self.store.as_ref(),
            Actor::System,
            AuditAction::LoginBlocked,
            Some(user.id),
            AuditOutcome::Denied,
            json!({ "fingerprint": fingerprint, "reason": reason }),
        )
        .await;
    }

    /// Re-run the authoritative checks for a live session. Any block
    /// invalidates the session, except a registry outage, which only
    /// denies this request.
    pub async fn recheck(
        &self,
        ctx: &SessionContext,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> VigilResult<GateDecision> {
        let timeout = self.config.registry_timeout;

        let session = match bounded(
            timeout,
            "session lookup",
            self.store.sessions().get_by_id(ctx.session_id),
        )
        .await
        {
            Ok(session) => session,
            Err(VigilError::NotFound { .. }) => {
                return Ok(GateDecision::Blocked {
                    reason: BlockReason::SessionRevoked,
                });
            }
            Err(e) => return Err(e),
        };
        if session.user_id != ctx.user_id || session.device_id != ctx.device_id {
            return Ok(GateDecision::Blocked {
                reason: BlockReason::SessionRevoked,
            });
        }

        let user = bounded(
            timeout,
            "user lookup",
            self.store.users().get_by_id(ctx.user_id),
        )
        .await?;

        let verdict = self
            .check_location(Some(user.id), &user.email, user_agent, ip_address)
            .await;
        if verdict.blocked {
            let reason = BlockReason::OutsideAllowedRegion {
                country_code: verdict.country_code.unwrap_or_default(),
            };
            self.end_session(ctx, &reason).await?;
            return Ok(GateDecision::Blocked { reason });
        }

        let device = match bounded(
            timeout,
            "device lookup",
            self.store.devices().get_by_id(ctx.device_id),
        )
        .await
        {
            Ok(device) => device,
            Err(VigilError::NotFound { .. }) => {
                let reason = BlockReason::DeviceDisabled;
                self.end_session(ctx, &reason).await?;
                return Ok(GateDecision::Blocked { reason });
            }
            Err(e) => {
                error!(session_id = %ctx.session_id, error = %e, "Device re-check failed; denying request");
                return Ok(GateDecision::Blocked {
                    reason: BlockReason::RegistryUnavailable,
                });
            }
        };

        let blacklisted = match bounded(
            timeout,
            "blacklist lookup",
            self.store
                .blocked_attempts()
                .is_blacklisted(user.id, &device.fingerprint),
        )
        .await
        {
            Ok(blacklisted) => blacklisted,
            Err(e) => {
                error!(session_id = %ctx.session_id, error = %e, "Blacklist re-check failed; denying request");
                return Ok(GateDecision::Blocked {
                    reason: BlockReason::RegistryUnavailable,
                });
            }
        };

        let reason = if blacklisted {
            Some(BlockReason::DeviceBlacklisted)
        } else if !device.is_active {
            Some(BlockReason::DeviceDisabled)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.end_session(ctx, &reason).await?;
            return Ok(GateDecision::Blocked { reason });
        }

        Ok(GateDecision::Allowed { device })
    }

    async fn end_session(&self, ctx: &SessionContext, reason: &BlockReason) -> VigilResult<()> {
        self.store.sessions().invalidate(ctx.session_id).await?;
        info!(
            session_id = %ctx.session_id,
            user_id = %ctx.user_id,
            ?reason,
            "Session revoked on re-check"
        );
        self.events.publish(SecurityEvent::SessionsRevoked {
            user_id: ctx.user_id,
            device_id: Some(ctx.device_id),
            reason: reason.message(),
        });
        Ok(())
    }
}
