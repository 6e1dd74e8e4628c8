//! Server configuration from `VIGIL_*` environment variables.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use vigil_auth::{AuthConfig, GeoConfig};
use vigil_core::models::user::DeviceCeiling;
use vigil_db::DbConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub auth: AuthConfig,
    pub geo: GeoConfig,
    /// How often expired sessions are swept.
    pub session_sweep_interval: Duration,
    /// Reverse proxies whose `x-forwarded-for` is believed. Empty means
    /// the socket peer is always the client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| -> Result<Option<u64>> {
            var(key)
                .map(|v| parse::<u64>(key, &v))
                .transpose()
        };

        let mut auth = AuthConfig::default();
        auth.jwt_private_key_pem = pem(&var, "VIGIL_JWT_PRIVATE_KEY")?;
        auth.jwt_public_key_pem = pem(&var, "VIGIL_JWT_PUBLIC_KEY")?;
        if let Some(issuer) = var("VIGIL_JWT_ISSUER") {
            auth.jwt_issuer = issuer;
        }
        auth.pepper = var("VIGIL_PASSWORD_PEPPER");
        if let Some(secs) = parsed("VIGIL_ACCESS_TOKEN_TTL_SECS")? {
            auth.access_token_lifetime_secs = secs;
        }
        if let Some(secs) = parsed("VIGIL_REFRESH_TOKEN_TTL_SECS")? {
            auth.refresh_token_lifetime_secs = secs;
        }
        if let Some(raw) = var("VIGIL_DEFAULT_MAX_DEVICES") {
            let raw = parse::<i64>("VIGIL_DEFAULT_MAX_DEVICES", &raw)?;
            auth.default_max_devices = DeviceCeiling::from_raw(raw)
                .with_context(|| "VIGIL_DEFAULT_MAX_DEVICES out of range")?;
        }
        if let Some(list) = var("VIGIL_ALLOWED_COUNTRIES") {
            auth.allowed_countries = list
                .split(',')
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(ms) = parsed("VIGIL_GEO_TIMEOUT_MS")? {
            auth.geo_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed("VIGIL_REGISTRY_TIMEOUT_MS")? {
            auth.registry_timeout = Duration::from_millis(ms);
        }

        let mut db = DbConfig::default();
        if let Some(url) = var("VIGIL_DB_URL") {
            db.url = url;
        }
        if let Some(ns) = var("VIGIL_DB_NAMESPACE") {
            db.namespace = ns;
        }
        if let Some(name) = var("VIGIL_DB_DATABASE") {
            db.database = name;
        }
        if let Some(user) = var("VIGIL_DB_USERNAME") {
            db.username = user;
        }
        if let Some(pass) = var("VIGIL_DB_PASSWORD") {
            db.password = pass;
        }

        let mut geo = GeoConfig::default();
        if let Some(url) = var("VIGIL_GEO_BASE_URL") {
            geo.base_url = url.trim_end_matches('/').to_string();
        }

        let bind_addr = match var("VIGIL_BIND_ADDR") {
            Some(addr) => parse("VIGIL_BIND_ADDR", &addr)?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };
        let session_sweep_interval =
            Duration::from_secs(parsed("VIGIL_SESSION_SWEEP_SECS")?.unwrap_or(300));
        let trusted_proxies = var("VIGIL_TRUSTED_PROXIES")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| parse::<IpAddr>("VIGIL_TRUSTED_PROXIES", p))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            db,
            auth,
            geo,
            session_sweep_interval,
            trusted_proxies,
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {value:?}"))
}

/// A PEM key given inline as `{KEY}` or as a path in `{KEY}_FILE`.
fn pem(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    if let Some(inline) = var(key) {
        return Ok(inline.replace("\\n", "\n"));
    }
    let file_key = format!("{key}_FILE");
    let path = var(&file_key).with_context(|| format!("{key} or {file_key} must be set"))?;
    std::fs::read_to_string(&path).with_context(|| format!("failed to read {file_key} at {path}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const KEYS: [(&str, &str); 2] = [
        ("VIGIL_JWT_PRIVATE_KEY", "private-pem"),
        ("VIGIL_JWT_PUBLIC_KEY", "public-pem"),
    ];

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&KEYS)).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.auth.default_max_devices, DeviceCeiling::Limited(3));
        assert!(config.auth.allowed_countries.is_empty());
        assert_eq!(config.auth.geo_timeout, Duration::from_secs(3));
        assert_eq!(config.db.namespace, "vigil");
        assert_eq!(config.geo.base_url, "https://ipapi.co");
        assert!(config.trusted_proxies.is_empty());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = KEYS.to_vec();
        pairs.extend([
            ("VIGIL_BIND_ADDR", "127.0.0.1:9443"),
            ("VIGIL_ALLOWED_COUNTRIES", "in, np ,"),
            ("VIGIL_DEFAULT_MAX_DEVICES", "-1"),
            ("VIGIL_GEO_TIMEOUT_MS", "750"),
            ("VIGIL_GEO_BASE_URL", "http://geo.internal/"),
            ("VIGIL_TRUSTED_PROXIES", "10.0.0.2, ::1"),
        ]);
        let config = ServerConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9443".parse::<SocketAddr>().unwrap());
        assert_eq!(config.auth.allowed_countries, vec!["IN", "NP"]);
        assert_eq!(config.auth.default_max_devices, DeviceCeiling::Unlimited);
        assert_eq!(config.auth.geo_timeout, Duration::from_millis(750));
        assert_eq!(config.geo.base_url, "http://geo.internal");
        assert_eq!(
            config.trusted_proxies,
            vec![
                "10.0.0.2".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn missing_keys_are_reported() {
        let err = ServerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("VIGIL_JWT_PRIVATE_KEY"));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let mut pairs = KEYS.to_vec();
        pairs.push(("VIGIL_DEFAULT_MAX_DEVICES", "0"));
        assert!(ServerConfig::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = KEYS.to_vec();
        pairs.push(("VIGIL_GEO_TIMEOUT_MS", "soon"));
        let err = ServerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("VIGIL_GEO_TIMEOUT_MS"));

        let mut pairs = KEYS.to_vec();
        pairs.push(("VIGIL_TRUSTED_PROXIES", "10.0.0.0/8"));
        let err = ServerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("VIGIL_TRUSTED_PROXIES"));
    }
}
