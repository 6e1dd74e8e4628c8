//! Request extractors: the authenticated caller and client signals.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use vigil_auth::GeoLocator;
use vigil_core::models::session::SessionContext;
use vigil_core::repository::TrustStore;

use crate::error::ApiError;
use crate::state::AppState;

/// Session behind the request's bearer token. The token is verified and
/// the session must still be live; roles are checked later by the service.
pub struct Caller(pub SessionContext);

impl<T: TrustStore, G: GeoLocator> FromRequestParts<AppState<T, G>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<T, G>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::unauthorized("missing bearer token"))?;

        let ctx = state.auth.authorize(bearer.token()).await?;
        Ok(Caller(ctx))
    }
}

/// Originating client address. The socket peer, unless the peer is a
/// trusted proxy, in which case the nearest untrusted `x-forwarded-for`
/// hop.
pub struct ClientIp(pub Option<String>);

impl<T: TrustStore, G: GeoLocator> FromRequestParts<AppState<T, G>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<T, G>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip = client_ip(&parts.headers, peer, &state.trusted_proxies);
        Ok(ClientIp(ip.map(|ip| ip.to_string())))
    }
}

pub struct UserAgent(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for UserAgent {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ua = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Ok(UserAgent(ua))
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted: &[IpAddr]) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted.contains(&peer) {
        return Some(peer);
    }

    // Each proxy appends the address it received from; walk back from the
    // nearest hop past our own proxies.
    let Some(hops) = forwarded_hops(headers) else {
        return Some(peer);
    };
    let client = hops
        .iter()
        .rev()
        .find(|hop| !trusted.contains(*hop))
        .or(hops.first())
        .copied();
    Some(client.unwrap_or(peer))
}

/// Every `x-forwarded-for` hop, or `None` if any of them is not an address.
fn forwarded_hops(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let mut hops = Vec::new();
    for value in headers.get_all("x-forwarded-for") {
        for hop in value.to_str().ok()?.split(',') {
            hops.push(hop.trim().parse().ok()?);
        }
    }
    Some(hops)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(value).unwrap());
        headers
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    const PROXY: &str = "10.0.0.2";

    #[test]
    fn untrusted_peer_cannot_name_the_client() {
        let spoofed = headers("8.8.8.8");
        assert_eq!(
            client_ip(&spoofed, Some(ip("203.0.113.7")), &[]),
            Some(ip("203.0.113.7"))
        );
        assert_eq!(
            client_ip(&spoofed, Some(ip("203.0.113.7")), &[ip(PROXY)]),
            Some(ip("203.0.113.7"))
        );
        assert_eq!(client_ip(&spoofed, None, &[ip(PROXY)]), None);
    }

    #[test]
    fn trusted_proxy_names_the_nearest_untrusted_hop() {
        let trusted = [ip(PROXY), ip("10.0.0.3")];
        assert_eq!(
            client_ip(&headers("203.0.113.7"), Some(ip(PROXY)), &trusted),
            Some(ip("203.0.113.7"))
        );
        // A client-supplied first hop is skipped over.
        assert_eq!(
            client_ip(
                &headers("8.8.8.8, 203.0.113.7, 10.0.0.3"),
                Some(ip(PROXY)),
                &trusted
            ),
            Some(ip("203.0.113.7"))
        );
        assert_eq!(
            client_ip(&headers("2001:db8::1"), Some(ip(PROXY)), &trusted),
            Some(ip("2001:db8::1"))
        );
    }

    #[test]
    fn junk_forwarded_values_fall_back_to_the_peer() {
        let trusted = [ip(PROXY)];
        for junk in ["", "<script>", "203.0.113.7, nope"] {
            assert_eq!(
                client_ip(&headers(junk), Some(ip(PROXY)), &trusted),
                Some(ip(PROXY)),
                "{junk:?}"
            );
        }
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(ip(PROXY)), &trusted),
            Some(ip(PROXY))
        );
    }
}
