pub mod auth;
pub mod config;
pub mod error;
pub mod proxy;
pub mod router;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::proxy::{proxy_handler, ProxyState};
use crate::router::RouteTable;
use axum::routing::any;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the axum application for a configuration
///
/// Auth gates are provisioned while the route table is built, so a route with
/// a bad `auth_redirect` fails here rather than on its first request.
pub fn build_app(config: &GatewayConfig) -> Result<axum::Router> {
    let routes = RouteTable::new(&config.routes)?;
    info!(routes = routes.patterns().len(), "Route table built");

    let state = ProxyState::new(routes, Duration::from_secs(config.server.timeout_secs))?;

    Ok(axum::Router::new()
        .route("/", any(proxy_handler))
        .route("/*path", any(proxy_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http()))
}

/// Validate `config`, bind the listener and serve until the server stops
pub async fn init_gateway(config: GatewayConfig) -> Result<()> {
    config.validate()?;
    let app = build_app(&config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Forward-auth gateway listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::Internal(format!("server stopped: {}", e)))
}

/// Install the global subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "auth_redirect=debug,tower_http=debug".into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
