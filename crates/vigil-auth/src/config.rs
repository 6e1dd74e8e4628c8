//! Authentication and device-trust configuration.

use std::time::Duration;

use vigil_core::models::user::DeviceCeiling;

/// Configuration for the authentication service and the login gate.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for JWT signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for JWT verification.
    pub jwt_public_key_pem: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 43_200 = 12 hours).
    pub refresh_token_lifetime_secs: u64,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// Minimum password length accepted by [`crate::password::hash_password`].
    pub min_password_length: usize,
    /// Ceiling applied to new accounts (default: 3 devices).
    pub default_max_devices: DeviceCeiling,
    /// ISO-3166 alpha-2 codes logins may originate from. Empty disables
    /// the geofence.
    pub allowed_countries: Vec<String>,
    /// Upper bound on a single geolocation lookup (default: 3 s).
    pub geo_timeout: Duration,
    /// Upper bound on a single registry/permission round-trip (default: 5 s).
    pub registry_timeout: Duration,
}

impl AuthConfig {
    /// Whether `country_code` passes the geofence.
    pub fn country_allowed(&self, country_code: &str) -> bool {
        self.allowed_countries.is_empty()
            || self
                .allowed_countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(country_code))
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 43_200,
            jwt_issuer: "vigil".into(),
            pepper: None,
            min_password_length: 12,
            default_max_devices: DeviceCeiling::Limited(3),
            allowed_countries: Vec::new(),
            geo_timeout: Duration::from_secs(3),
            registry_timeout: Duration::from_secs(5),
        }
    }
}
