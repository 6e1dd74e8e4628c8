//! Vigil Server — application entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use surrealdb::engine::remote::ws::Client;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vigil_auth::{AuthService, HttpGeoLocator, SecurityEvent, SecurityEventBus, Subscription};
use vigil_core::repository::{SessionRepository, TrustStore};
use vigil_db::{DbManager, SurrealStore};

mod config;
mod error;
mod extract;
mod rpc;
mod state;

use config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info")),
        )
        .json()
        .init();

    info!("Starting Vigil server...");

    let config = ServerConfig::from_env().context("failed to load configuration")?;

    let db = DbManager::connect(&config.db)
        .await
        .context("failed to connect to SurrealDB")?;
    let store = Arc::new(db.store());

    let events = SecurityEventBus::default();
    tokio::spawn(log_security_events(events.subscribe()));
    tokio::spawn(sweep_expired_sessions(
        store.clone(),
        config.session_sweep_interval,
    ));

    if !config.trusted_proxies.is_empty() {
        info!(proxies = ?config.trusted_proxies, "Trusting x-forwarded-for from proxies");
    }

    let auth = AuthService::new(
        store,
        HttpGeoLocator::new(config.geo.clone()),
        config.auth.clone(),
        events,
    );

    let app = Router::new()
        .merge(rpc::router::<SurrealStore<Client>, HttpGeoLocator>())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(AppState::new(auth).with_trusted_proxies(config.trusted_proxies.clone()));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "HTTP listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Vigil server stopped.");
    Ok(())
}

/// Operator-facing feed of security events.
async fn log_security_events(mut events: Subscription) {
    while let Some(event) = events.recv().await {
        match &event {
            SecurityEvent::SuspiciousLogin { blocked: true, .. }
            | SecurityEvent::DeviceBlacklisted { .. } => warn!(?event, "Security event"),
            _ => info!(?event, "Security event"),
        }
    }
}

async fn sweep_expired_sessions<T: TrustStore>(store: Arc<T>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        match store.sessions().cleanup_expired().await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Expired sessions removed"),
            Err(e) => error!(error = %e, "Session sweep failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
