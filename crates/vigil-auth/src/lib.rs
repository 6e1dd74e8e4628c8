//! Vigil Auth — device fingerprinting, the login gate, device approvals,
//! route access, access-table administration and token-based sessions.

pub mod access;
pub mod admin;
pub mod approval;
mod audit;
pub mod config;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod gate;
pub mod geo;
pub mod password;
pub mod registry;
pub mod service;
pub mod token;

pub use access::{AccessDecision, AccessPolicy, DenyReason, RouteAccessResolver};
pub use admin::AdminConsole;
pub use approval::{Approval, ApprovalWorkflow, BlacklistRequest};
pub use config::AuthConfig;
pub use error::AuthError;
pub use events::{SecurityEvent, SecurityEventBus, Subscription};
pub use gate::{BlockReason, GateDecision, GateOutcome, LocationVerdict, LoginAttempt, LoginGate};
pub use geo::{GeoConfig, GeoLocation, GeoLocator, HttpGeoLocator};
pub use registry::DeviceRegistry;
pub use service::{
    AuthService, AuthTokens, BiometricLoginInput, LoginInput, LoginOutcome, RefreshInput,
    RegisterUser,
};
pub use token::AccessTokenClaims;
