//! IP geolocation used by the login gate's geofence.

use serde::Deserialize;
use tracing::debug;

use crate::error::AuthError;

/// Where a request appears to originate from.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub ip: String,
    pub country: Option<String>,
    /// ISO-3166 alpha-2, upper case.
    pub country_code: String,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Resolves a network address to a location.
///
/// Implementations report failures as errors; the gate decides whether a
/// failure opens or closes.
pub trait GeoLocator: Send + Sync + 'static {
    fn locate(&self, ip: &str) -> impl Future<Output = Result<GeoLocation, AuthError>> + Send;
}

/// Endpoint settings for [`HttpGeoLocator`].
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Base URL of an ipapi-style service; requests go to `{base}/{ip}/json/`.
    pub base_url: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ipapi.co".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    error: bool,
    reason: Option<String>,
    ip: Option<String>,
    city: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl IpApiResponse {
    fn into_location(self, requested_ip: &str) -> Result<GeoLocation, AuthError> {
        if self.error {
            return Err(AuthError::Geolocation(
                self.reason.unwrap_or_else(|| "lookup rejected".into()),
            ));
        }
        let country_code = self
            .country_code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Geolocation("response has no country code".into()))?;

        Ok(GeoLocation {
            ip: self.ip.unwrap_or_else(|| requested_ip.to_string()),
            country: self.country_name,
            country_code: country_code.to_ascii_uppercase(),
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Geolocation over HTTP with `reqwest`.
#[derive(Clone)]
pub struct HttpGeoLocator {
    client: reqwest::Client,
    config: GeoConfig,
}

impl HttpGeoLocator {
    pub fn new(config: GeoConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

impl GeoLocator for HttpGeoLocator {
    async fn locate(&self, ip: &str) -> Result<GeoLocation, AuthError> {
        let url = format!("{}/{ip}/json/", self.config.base_url.trim_end_matches('/'));
        debug!(%url, "Resolving request origin");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Geolocation(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Geolocation(format!("{status}: {text}")));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Geolocation(format!("bad response body: {e}")))?;
        body.into_location(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_successful_lookup() {
        let body: IpApiResponse = serde_json::from_str(
            r#"{"ip":"49.36.1.1","city":"Bengaluru","country_name":"India",
                "country_code":"in","latitude":12.97,"longitude":77.59}"#,
        )
        .unwrap();
        let loc = body.into_location("49.36.1.1").unwrap();
        assert_eq!(loc.country_code, "IN");
        assert_eq!(loc.city.as_deref(), Some("Bengaluru"));
    }

    #[test]
    fn reserved_address_is_an_error() {
        let body: IpApiResponse = serde_json::from_str(
            r#"{"ip":"127.0.0.1","error":true,"reason":"Reserved IP Address","reserved":true}"#,
        )
        .unwrap();
        assert!(matches!(
            body.into_location("127.0.0.1"),
            Err(AuthError::Geolocation(reason)) if reason == "Reserved IP Address"
        ));
    }

    #[test]
    fn missing_country_is_an_error() {
        let body: IpApiResponse = serde_json::from_str(r#"{"ip":"10.0.0.1"}"#).unwrap();
        assert!(body.into_location("10.0.0.1").is_err());
    }
}
