use crate::auth::AuthGate;
use crate::error::{GatewayError, Result};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Axum middleware that puts an [`AuthGate`] in front of the inner service
///
/// ```ignore
/// let gate = Arc::new(AuthGate::provision(AuthRedirectConfig::new(url))?);
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(gate, auth_redirect_middleware));
/// ```
pub async fn auth_redirect_middleware(
    State(gate): State<Arc<AuthGate>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    gate.handle(request, |req| async move { Ok::<_, GatewayError>(next.run(req).await) })
        .await
}
