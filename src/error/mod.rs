use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Everything that can stop a request (or the server) short of a response
/// produced by a backend or the authorization service.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Rejected at startup; the gateway never serves with this
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No route for {path}")]
    NoRoute { path: String },

    #[error("{method} is not allowed on {path}")]
    MethodNotAllowed { method: Method, path: String },

    /// The inbound request body could not be read
    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Backend unavailable: {0}")]
    Backend(String),

    #[error("Authorization service unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute { .. } => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::RequestBody(_)
            | GatewayError::Backend(_)
            | GatewayError::AuthUnavailable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Config(_) | GatewayError::Internal(_) | GatewayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
