//! Authentication service: password and biometric login through the login
//! gate, token rotation, logout and bearer authorization.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use vigil_core::error::{VigilError, VigilResult};
use vigil_core::models::audit::{AuditAction, AuditOutcome};
use vigil_core::models::device::ClientEnvironment;
use vigil_core::models::role::RoleTag;
use vigil_core::models::session::{CreateSession, SessionContext};
use vigil_core::models::user::{CreateUser, DeviceCeiling, User, UserStatus};
use vigil_core::repository::{RoleRepository, SessionRepository, TrustStore, UserRepository};

use crate::access::{AccessDecision, AccessPolicy, RouteAccessResolver};
use crate::admin::AdminConsole;
use crate::approval::ApprovalWorkflow;
use crate::audit::{self, Actor};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::events::{SecurityEvent, SecurityEventBus};
use crate::gate::{BlockReason, GateDecision, LocationVerdict, LoginAttempt, LoginGate};
use crate::geo::GeoLocator;
use crate::password;
use crate::registry::DeviceRegistry;
use crate::token;

/// Input for provisioning a portal account.
#[derive(Debug)]
pub struct RegisterUser {
    pub email: String,
    pub full_name: String,
    pub badge_number: Option<String>,
    pub password: String,
    /// Defaults to `[user]` when empty.
    pub roles: Vec<RoleTag>,
    /// Falls back to [`AuthConfig::default_max_devices`].
    pub max_devices: Option<DeviceCeiling>,
}

/// Input for the password login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub environment: ClientEnvironment,
    pub ip_address: Option<String>,
}

/// Input for a login already verified on-device by a biometric check.
#[derive(Debug)]
pub struct BiometricLoginInput {
    pub user_id: Uuid,
    pub environment: ClientEnvironment,
    pub ip_address: Option<String>,
}

/// Input for the refresh token rotation flow.
#[derive(Debug)]
pub struct RefreshInput {
    pub raw_refresh_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Issued token pair.
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    /// Signed JWT access token.
    pub access_token: String,
    /// Raw opaque refresh token (return to client, not stored).
    pub refresh_token: String,
    pub session_id: Uuid,
    /// Device the session is bound to.
    pub device_id: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(AuthTokens),
    /// The device is over the user's ceiling and waits for an administrator.
    PendingApproval { attempt_id: Uuid },
    Blocked { reason: BlockReason },
}

/// Authentication service.
///
/// Generic over the repository bundle and the geolocation client so that
/// the auth layer has no dependency on the database crate.
pub struct AuthService<T: TrustStore, G: GeoLocator> {
    store: Arc<T>,
    config: Arc<AuthConfig>,
    gate: LoginGate<T, G>,
    approvals: ApprovalWorkflow<T>,
    access: RouteAccessResolver<T>,
    admin: AdminConsole<T>,
    events: SecurityEventBus,
}

impl<T: TrustStore, G: GeoLocator> AuthService<T, G> {
    pub fn new(store: Arc<T>, geo: G, config: AuthConfig, events: SecurityEventBus) -> Self {
        Self::with_policy(store, geo, config, events, AccessPolicy::police_portal())
    }

    pub fn with_policy(
        store: Arc<T>,
        geo: G,
        config: AuthConfig,
        events: SecurityEventBus,
        policy: AccessPolicy,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            gate: LoginGate::new(store.clone(), Arc::new(geo), config.clone(), events.clone()),
            approvals: ApprovalWorkflow::new(store.clone(), events.clone()),
            access: RouteAccessResolver::new(store.clone(), policy, config.clone()),
            admin: AdminConsole::new(store.clone()),
            store,
            config,
            events,
        }
    }

    pub fn gate(&self) -> &LoginGate<T, G> {
        &self.gate
    }

    pub fn registry(&self) -> &DeviceRegistry<T> {
        self.gate.registry()
    }

    pub fn approvals(&self) -> &ApprovalWorkflow<T> {
        &self.approvals
    }

    pub fn access(&self) -> &RouteAccessResolver<T> {
        &self.access
    }

    pub fn admin(&self) -> &AdminConsole<T> {
        &self.admin
    }

    pub fn events(&self) -> &SecurityEventBus {
        &self.events
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an account with a hashed password and its role tags.
    pub async fn register_user(&self, input: RegisterUser) -> VigilResult<User> {
        let password_hash = password::hash_password(
            &input.password,
            self.config.pepper.as_deref(),
            self.config.min_password_length,
        )?;

        let user = self
            .store
            .users()
            .create(CreateUser {
                email: input.email,
                full_name: input.full_name,
                badge_number: input.badge_number,
                password_hash,
                max_devices: input.max_devices.unwrap_or(self.config.default_max_devices),
            })
            .await?;

        let roles = if input.roles.is_empty() {
            vec![RoleTag::User]
        } else {
            input.roles
        };
        for role in &roles {
            self.store.roles().assign(user.id, *role).await?;
        }

        info!(user_id = %user.id, ?roles, "User registered");
        Ok(user)
    }

    /// Authenticate with email + password, then run the login gate.
    pub async fn login(&self, input: LoginInput) -> VigilResult<LoginOutcome> {
        let user = match self.store.users().get_by_email(&input.email).await {
            Ok(user) => user,
            Err(VigilError::NotFound { .. }) => {
                self.audit_failure(None, &input.email, "unknown email").await;
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            self.audit_failure(Some(user.id), &user.email, "bad password")
                .await;
            return Err(AuthError::InvalidCredentials.into());
        }

        ensure_active(&user)?;

        let attempt = LoginAttempt {
            environment: input.environment,
            ip_address: input.ip_address,
            known_device_only: false,
        };
        self.admit(&user, attempt, "password").await
    }

    /// Complete a login the client verified with a biometric check. Only
    /// an active device already registered to the user is admitted.
    pub async fn verify_biometric_login(
        &self,
        input: BiometricLoginInput,
    ) -> VigilResult<LoginOutcome> {
        let user = self.store.users().get_by_id(input.user_id).await?;
        ensure_active(&user)?;
        if !user.biometric_enabled {
            self.audit_failure(Some(user.id), &user.email, "biometric not enabled")
                .await;
            return Err(AuthError::BiometricNotEnabled.into());
        }

        // The biometric match happened on an enrolled device, so only a
        // device already trusted for this account may complete it.
        let attempt = LoginAttempt {
            environment: input.environment,
            ip_address: input.ip_address,
            known_device_only: true,
        };
        self.admit(&user, attempt, "biometric").await
    }

    async fn admit(
        &self,
        user: &User,
        attempt: LoginAttempt,
        method: &str,
    ) -> VigilResult<LoginOutcome> {
        let user_agent = attempt.environment.user_agent.clone();
        let ip_address = attempt.ip_address.clone();
        let outcome = self.gate.evaluate(user, &attempt).await;

        match outcome.decision {
            GateDecision::Allowed { device } => {
                let tokens = self
                    .issue_session(user.id, device.id, ip_address.clone(), user_agent)
                    .await?;
                info!(
                    user_id = %user.id,
                    device_id = %device.id,
                    session_id = %tokens.session_id,
                    method,
                    "Login succeeded"
                );
                audit::record(
                    self.store.as_ref(),
                    Actor::User(user.id),
                    AuditAction::LoginSucceeded,
                    Some(tokens.session_id),
                    AuditOutcome::Success,
                    json!({ "method": method, "device_id": device.id, "ip": ip_address }),
                )
                .await;
                Ok(LoginOutcome::Authenticated(tokens))
            }
            GateDecision::PendingApproval { attempt } => Ok(LoginOutcome::PendingApproval {
                attempt_id: attempt.id,
            }),
            GateDecision::Blocked { reason } => Ok(LoginOutcome::Blocked { reason }),
        }
    }

    async fn issue_session(
        &self,
        user_id: Uuid,
        device_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> VigilResult<AuthTokens> {
        let raw_refresh = token::generate_refresh_token();
        let token_hash = token::hash_refresh_token(&raw_refresh);
        let expires_at =
            Utc::now() + Duration::seconds(self.config.refresh_token_lifetime_secs as i64);

        let session = self
            .store
            .sessions()
            .create(CreateSession {
                user_id,
                device_id,
                token_hash,
                ip_address,
                user_agent,
                expires_at,
            })
            .await?;

        let access_token = token::issue_access_token(&session.context(), &self.config)?;

        Ok(AuthTokens {
            access_token,
            refresh_token: raw_refresh,
            session_id: session.id,
            device_id,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    async fn audit_failure(&self, user_id: Option<Uuid>, email: &str, why: &str) {
        warn!(email, why, "Login failed");
        let actor = user_id.map_or(Actor::System, Actor::User);
        audit::record(
            self.store.as_ref(),
            actor,
            AuditAction::LoginFailed,
            user_id,
            AuditOutcome::Failure,
            json!({ "email": email, "reason": why }),
        )
        .await;
    }

    /// Geofence check for an origin before credentials are submitted.
    pub async fn verify_login_location(
        &self,
        email: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> LocationVerdict {
        let user_id = match self.store.users().get_by_email(email).await {
            Ok(user) => Some(user.id),
            Err(VigilError::NotFound { .. }) => None,
            Err(e) => {
                warn!(email, error = %e, "User lookup failed during location check");
                None
            }
        };
        self.gate
            .check_location(user_id, email, user_agent, ip_address)
            .await
    }

    /// Rotate a refresh token: re-check the session's device and origin,
    /// consume the old session and issue a new token pair on the same
    /// device.
    ///
    /// Each refresh token is single-use: the old session is invalidated
    /// before the new one is created.
    pub async fn refresh(&self, input: RefreshInput) -> VigilResult<AuthTokens> {
        let token_hash = token::hash_refresh_token(&input.raw_refresh_token);
        let session = self
            .store
            .sessions()
            .get_by_token_hash(&token_hash)
            .await
            .map_err(|e| match e {
                VigilError::NotFound { .. } => {
                    AuthError::TokenInvalid("refresh token not found or already used".into())
                        .into()
                }
                other => other,
            })?;

        if session.is_expired(Utc::now()) {
            if let Err(e) = self.store.sessions().invalidate(session.id).await {
                warn!(session_id = %session.id, error = %e, "Failed to invalidate expired session");
            }
            return Err(AuthError::TokenExpired.into());
        }

        let ctx = session.context();
        let device = match self
            .gate
            .recheck(&ctx, input.ip_address.as_deref(), input.user_agent.as_deref())
            .await?
        {
            GateDecision::Allowed { device } => device,
            GateDecision::Blocked { reason } => return Err(blocked_error(reason)),
            GateDecision::PendingApproval { .. } => return Err(AuthError::SessionRevoked.into()),
        };

        self.store.sessions().invalidate(session.id).await?;

        let user = self.store.users().get_by_id(session.user_id).await?;
        ensure_active(&user)?;

        self.issue_session(user.id, device.id, input.ip_address, input.user_agent)
            .await
    }

    /// Invalidate a single session (logout).
    pub async fn logout(&self, session_id: Uuid) -> VigilResult<()> {
        self.store.sessions().invalidate(session_id).await
    }

    /// Revoke all sessions for a user (e.g. on password change).
    pub async fn revoke_all_sessions(&self, user_id: Uuid, reason: &str) -> VigilResult<()> {
        self.store
            .sessions()
            .invalidate_user_sessions(user_id)
            .await?;
        info!(user_id = %user_id, reason, "All sessions revoked");
        self.events.publish(SecurityEvent::SessionsRevoked {
            user_id,
            device_id: None,
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Resolve a bearer access token to a live session context.
    pub async fn authorize(&self, bearer: &str) -> VigilResult<SessionContext> {
        let claims = token::validate_access_token(bearer, &self.config)?;
        let ctx = claims.context()?;

        let session = match self.store.sessions().get_by_id(ctx.session_id).await {
            Ok(session) => session,
            Err(VigilError::NotFound { .. }) => return Err(AuthError::SessionRevoked.into()),
            Err(e) => return Err(e),
        };
        if !session.matches(&ctx) || session.is_expired(Utc::now()) {
            return Err(AuthError::SessionRevoked.into());
        }
        Ok(ctx)
    }

    /// Route access for a protected page. Errors mean the decision could not
    /// be made and must be treated as a deny.
    pub async fn check_page_access(
        &self,
        ctx: &SessionContext,
        page: &str,
    ) -> VigilResult<AccessDecision> {
        self.access.resolve(ctx, page).await.inspect_err(|e| {
            warn!(user_id = %ctx.user_id, page, error = %e, "Route access check failed; denying");
        })
    }

    /// Re-run the gate for a live session on protected navigation.
    pub async fn recheck_session(
        &self,
        ctx: &SessionContext,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> VigilResult<GateDecision> {
        self.gate.recheck(ctx, ip_address, user_agent).await
    }
}

fn ensure_active(user: &User) -> Result<(), AuthError> {
    match user.status {
        UserStatus::Active => Ok(()),
        UserStatus::Inactive => Err(AuthError::AccountInactive),
        UserStatus::Suspended => Err(AuthError::AccountSuspended),
    }
}

fn blocked_error(reason: BlockReason) -> VigilError {
    match reason {
        BlockReason::SessionRevoked => AuthError::SessionRevoked.into(),
        other => VigilError::DeviceBlocked {
            reason: other.message(),
        },
    }
}
