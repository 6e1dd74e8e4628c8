use std::net::IpAddr;
use std::sync::Arc;

use vigil_auth::{AuthService, GeoLocator};
use vigil_core::repository::TrustStore;

/// Shared handler state.
pub struct AppState<T: TrustStore, G: GeoLocator> {
    pub auth: Arc<AuthService<T, G>>,
    /// Peers allowed to name the client in `x-forwarded-for`.
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl<T: TrustStore, G: GeoLocator> AppState<T, G> {
    pub fn new(auth: AuthService<T, G>) -> Self {
        Self {
            auth: Arc::new(auth),
            trusted_proxies: Arc::from([]),
        }
    }

    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = proxies.into();
        self
    }
}

impl<T: TrustStore, G: GeoLocator> Clone for AppState<T, G> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}
