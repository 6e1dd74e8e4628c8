//! Device fingerprinting from client-reported environment signals.
//!
//! The fingerprint is a lookup key for the device registry, not a secret.
//! It is derived from a canonical `|`-joined string of browser, OS, screen,
//! colour depth, pixel ratio, touch capability and timezone, hashed with
//! SHA-256. Only the browser major version contributes, so routine minor
//! updates keep the same fingerprint.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use vigil_core::models::device::{ClientEnvironment, DeviceFingerprint, DeviceInfo};

const UNKNOWN: &str = "Unknown";

/// Browser and OS details extracted from a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAgent {
    pub browser_name: String,
    pub browser_version: String,
    pub os_name: String,
    pub os_version: String,
    pub device_type: String,
}

impl ParsedAgent {
    fn unknown() -> Self {
        Self {
            browser_name: UNKNOWN.into(),
            browser_version: UNKNOWN.into(),
            os_name: UNKNOWN.into(),
            os_version: UNKNOWN.into(),
            device_type: "desktop".into(),
        }
    }

    /// Major component of the browser version (`"126.0.6478.61"` → `"126"`).
    pub fn browser_major(&self) -> &str {
        self.browser_version
            .split('.')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN)
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static user-agent pattern")
}

// Order matters: Edge, Opera and Samsung all also advertise Chrome, and
// every Chromium browser advertises Safari.
static BROWSERS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("Edge", re(r"Edg(?:e|A|iOS)?/([\d.]+)")),
        ("Opera", re(r"(?:OPR|Opera)/([\d.]+)")),
        ("Samsung Internet", re(r"SamsungBrowser/([\d.]+)")),
        ("Chrome", re(r"(?:Chrome|CriOS)/([\d.]+)")),
        ("Firefox", re(r"(?:Firefox|FxiOS)/([\d.]+)")),
        ("Safari", re(r"Version/([\d.]+).*Safari/")),
    ]
});

// iOS before macOS: iPad and iPhone agents contain "like Mac OS X".
static OPERATING_SYSTEMS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("iOS", re(r"(?:iPhone|iPad|iPod).*?OS ([\d_]+)")),
        ("Android", re(r"Android ([\d.]+)")),
        ("ChromeOS", re(r"CrOS \S+ ([\d.]+)")),
        ("Windows", re(r"Windows NT ([\d.]+)")),
        ("macOS", re(r"Mac OS X ([\d_.]+)")),
        ("Linux", re(r"Linux()")),
    ]
});

fn windows_release(nt: &str) -> String {
    match nt {
        "10.0" => "10",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        other => other,
    }
    .to_string()
}

/// Parse a user-agent string. Never fails; unrecognised parts become
/// `Unknown`.
pub fn parse_user_agent(user_agent: &str) -> ParsedAgent {
    let mut parsed = ParsedAgent::unknown();

    if let Some((name, version)) = BROWSERS.iter().find_map(|(name, pattern)| {
        pattern
            .captures(user_agent)
            .and_then(|c| c.get(1))
            .map(|m| (*name, m.as_str()))
    }) {
        parsed.browser_name = name.into();
        parsed.browser_version = version.into();
    }

    if let Some((name, version)) = OPERATING_SYSTEMS.iter().find_map(|(name, pattern)| {
        pattern
            .captures(user_agent)
            .map(|c| (*name, c.get(1).map(|m| m.as_str()).unwrap_or_default()))
    }) {
        parsed.os_name = name.into();
        parsed.os_version = match name {
            "Windows" => windows_release(version),
            _ if version.is_empty() => UNKNOWN.into(),
            _ => version.replace('_', "."),
        };
    }

    parsed.device_type = if user_agent.contains("iPad") || user_agent.contains("Tablet") {
        "tablet"
    } else if user_agent.contains("Mobi") || user_agent.contains("iPhone") {
        "mobile"
    } else if parsed.os_name == "Android" {
        "tablet"
    } else {
        "desktop"
    }
    .into();

    parsed
}

fn or_unknown(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn screen_resolution(env: &ClientEnvironment) -> String {
    match (env.screen_width, env.screen_height) {
        (Some(w), Some(h)) => format!("{w}x{h}"),
        _ => UNKNOWN.into(),
    }
}

/// Parsed snapshot stored alongside device records and blocked attempts.
pub fn describe(env: &ClientEnvironment) -> DeviceInfo {
    let agent = parse_user_agent(env.user_agent.as_deref().unwrap_or_default());
    DeviceInfo {
        browser_name: agent.browser_name,
        browser_version: agent.browser_version,
        os_name: agent.os_name,
        os_version: agent.os_version,
        device_type: agent.device_type,
        screen_resolution: screen_resolution(env),
        color_depth: env.color_depth,
        pixel_ratio: env.pixel_ratio,
        touch_support: env.max_touch_points.is_some_and(|n| n > 0),
        timezone: or_unknown(env.timezone.as_deref()),
        language: env.language.clone(),
        platform: env.platform.clone(),
        user_agent: env.user_agent.clone(),
    }
}

fn canonical(env: &ClientEnvironment) -> String {
    let agent = parse_user_agent(env.user_agent.as_deref().unwrap_or_default());
    let color_depth = env
        .color_depth
        .map(|d| d.to_string())
        .unwrap_or_else(|| UNKNOWN.into());
    let pixel_ratio = env
        .pixel_ratio
        .filter(|r| r.is_finite())
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| UNKNOWN.into());
    let touch = env.max_touch_points.is_some_and(|n| n > 0);
    let screen = screen_resolution(env);
    let timezone = or_unknown(env.timezone.as_deref());

    let parts: [&str; 9] = [
        &agent.browser_name,
        agent.browser_major(),
        &agent.os_name,
        &agent.os_version,
        &screen,
        &color_depth,
        &pixel_ratio,
        if touch { "touch" } else { "no-touch" },
        &timezone,
    ];
    parts.join("|")
}

/// Derive the fingerprint for a client environment: lower-case hex SHA-256
/// of the canonical signal string. Deterministic and infallible.
pub fn generate(env: &ClientEnvironment) -> DeviceFingerprint {
    let digest = Sha256::digest(canonical(env).as_bytes());
    DeviceFingerprint::new(hex::encode(digest))
}
