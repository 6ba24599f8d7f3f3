use crate::error::{GatewayError, Result};
use crate::router::RouteTable;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, Request, Response},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection-scoped headers (RFC 9110 §7.6.1) that never cross a proxy
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Turn an upstream reqwest response into an axum one: same status, every
/// end-to-end header value in order, body buffered
pub(crate) async fn relay(upstream: reqwest::Response) -> reqwest::Result<Response<Body>> {
    let status = upstream.status();
    let mut headers = HeaderMap::with_capacity(upstream.headers().len());
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let body = upstream.bytes().await?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Shared state of the proxy handler
#[derive(Clone)]
pub struct ProxyState {
    routes: Arc<RouteTable>,
    client: reqwest::Client,
}

impl ProxyState {
    pub fn new(routes: RouteTable, backend_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(backend_timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            routes: Arc::new(routes),
            client,
        })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

/// Catch-all handler: look up the route, pass the route's auth gate (if
/// any), then forward to the backend
pub async fn proxy_handler(
    State(state): State<ProxyState>,
    req: Request<Body>,
) -> Result<Response<Body>> {
    let route = state.routes.lookup(req.uri().path(), req.method())?;
    let backend_url = route.backend_url(req.uri().path(), req.uri().query());

    info!(
        method = %req.method(),
        path = %req.uri().path(),
        gated = route.auth_gate.is_some(),
        "Incoming request"
    );

    let forward = |req: Request<Body>| send_to_backend(&state.client, req, &backend_url);
    let result = match &route.auth_gate {
        Some(gate) => gate.handle(req, forward).await,
        None => forward(req).await,
    };

    match &result {
        Ok(response) => info!(status = %response.status(), backend = %backend_url, "Request completed"),
        Err(e) => warn!(error = %e, backend = %backend_url, "Request failed"),
    }
    result
}

async fn send_to_backend(
    client: &reqwest::Client,
    req: Request<Body>,
    backend_url: &str,
) -> Result<Response<Body>> {
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| GatewayError::RequestBody(e.to_string()))?
        .to_bytes();

    let mut outbound = client.request(parts.method, backend_url).body(body);
    for (name, value) in parts.headers.iter().filter(|(name, _)| !is_hop_by_hop(name)) {
        outbound = outbound.header(name, value);
    }

    debug!(backend_url = %backend_url, "Forwarding to backend");

    let backend_error = |e: reqwest::Error| {
        if e.is_timeout() {
            GatewayError::Timeout(format!("backend {}: {}", backend_url, e))
        } else {
            GatewayError::Backend(format!("{}: {}", backend_url, e))
        }
    };

    let upstream = outbound.send().await.map_err(backend_error)?;
    relay(upstream).await.map_err(backend_error)
}
