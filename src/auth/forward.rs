use crate::config::AuthRedirectConfig;
use crate::error::{GatewayError, Result};
use crate::proxy::relay;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, Response, StatusCode},
};
use http_body_util::BodyExt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Time budget for a single authorization call, connect through body
pub const AUTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Outcome of an authorization check
pub enum AuthDecision {
    /// The authorization service answered 200; carries the original request
    /// with its body restored
    Allow(Request<Body>),
    /// Any other status; carries the authorization service's response to send
    /// back to the client as-is
    Deny(Response<Body>),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow(_))
    }
}

/// Forward-auth gate
///
/// Replays each inbound request to an external authorization endpoint and
/// either lets it through or relays the endpoint's rejection. One outbound
/// call per inbound request, never retried.
#[derive(Debug, Clone)]
pub struct AuthGate {
    config: AuthRedirectConfig,
    client: reqwest::Client,
}

impl AuthGate {
    /// Validate the configuration and build the shared outbound client
    pub fn provision(config: AuthRedirectConfig) -> Result<Self> {
        Self::provision_with_timeout(config, AUTH_REQUEST_TIMEOUT)
    }

    /// Same as [`AuthGate::provision`] with an explicit time budget
    pub fn provision_with_timeout(config: AuthRedirectConfig, timeout: Duration) -> Result<Self> {
        config.validate()?;

        // A 3xx from the authorization service is an answer, not a hop.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(url = %config.url, timeout_secs = timeout.as_secs(), "AuthRedirect provisioned");

        Ok(Self { config, client })
    }

    /// The configured authorization endpoint
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Outbound target for an inbound query string
    pub fn target_url(&self, query: Option<&str>) -> String {
        format!("{}?{}", self.config.url, encode_query(query))
    }

    /// Ask the authorization service about `req`
    ///
    /// POST bodies are buffered and put back into the returned request, so the
    /// downstream handler reads the same bytes the authorization service saw.
    pub async fn authorize(&self, req: Request<Body>) -> Result<AuthDecision> {
        let headers = project_headers(req.headers());
        let target = self.target_url(req.uri().query());

        let (req, outbound) = if req.method() == Method::POST {
            let (parts, body) = req.into_parts();
            let body_bytes = body
                .collect()
                .await
                .map_err(|e| GatewayError::RequestBody(e.to_string()))?
                .to_bytes();

            let outbound = self
                .client
                .post(&target)
                .headers(headers)
                .body(body_bytes.clone());

            (Request::from_parts(parts, Body::from(body_bytes)), outbound)
        } else {
            let outbound = self.client.get(&target).headers(headers);
            (req, outbound)
        };

        debug!(
            method = %req.method(),
            target = %target,
            "Sending authorization request"
        );

        let auth_response = outbound.send().await.map_err(transport_error)?;
        let status = auth_response.status();

        if status == StatusCode::OK {
            debug!(target = %target, "Authorization granted");
            return Ok(AuthDecision::Allow(req));
        }

        info!(
            status = %status,
            path = %req.uri().path(),
            "Authorization denied, relaying response"
        );

        Ok(AuthDecision::Deny(relay_response(auth_response).await?))
    }

    /// Gate `req` in front of `next`
    ///
    /// `next` runs exactly once when the request is allowed and never
    /// otherwise.
    pub async fn handle<F, Fut>(&self, req: Request<Body>, next: F) -> Result<Response<Body>>
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Result<Response<Body>>>,
    {
        match self.authorize(req).await {
            Ok(AuthDecision::Allow(req)) => next(req).await,
            Ok(AuthDecision::Deny(response)) => Ok(response),
            Err(e) => {
                warn!(error = %e, url = %self.config.url, "Authorization request failed");
                Err(e)
            }
        }
    }
}

/// Collapse inbound headers to one value per name, keeping the last one seen
///
/// Everything else is forwarded as-is, `Proxy-Authorization` and `Connection`
/// included. Only the framing of the inbound message (`Host`,
/// `Content-Length`, `Transfer-Encoding`) is left for the outbound client to
/// set, since it describes a body the authorization request may not carry.
pub fn project_headers(headers: &HeaderMap) -> HeaderMap {
    let mut projected = HeaderMap::with_capacity(headers.keys_len());

    for (name, value) in headers.iter() {
        let framing = name == header::HOST
            || name == header::CONTENT_LENGTH
            || name == header::TRANSFER_ENCODING;
        if !framing {
            projected.insert(name.clone(), value.clone());
        }
    }

    projected
}

/// Re-encode a query string: keys sorted (stable, so repeated keys keep their
/// order), spaces as `+`, everything outside `A-Z a-z 0-9 - . _ ~` escaped
pub fn encode_query(query: Option<&str>) -> String {
    let mut pairs: Vec<(String, String)> =
        form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", query_escape(k), query_escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Form serialization leaves `*` bare and escapes `~`; flip both so the
/// output only keeps RFC 3986 unreserved bytes literal. `%` in the serializer
/// output always starts an escape, so `%7E` can only mean `~`.
fn query_escape(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Copy status, headers and body of the authorization response
///
/// Repeated headers keep every value, so several `Set-Cookie`s all reach the
/// client. This deliberately departs from copying with a last-value-wins set,
/// which would keep only the final value per name. Hop-by-hop headers are
/// dropped.
async fn relay_response(auth_response: reqwest::Response) -> Result<Response<Body>> {
    relay(auth_response).await.map_err(transport_error)
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(format!("Authorization request timed out: {}", e))
    } else if e.is_connect() {
        GatewayError::AuthUnavailable(format!(
            "Failed to connect to authorization service: {}",
            e
        ))
    } else {
        GatewayError::AuthUnavailable(format!("Authorization request failed: {}", e))
    }
}
