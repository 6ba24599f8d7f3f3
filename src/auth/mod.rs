pub mod forward;
pub mod middleware;

pub use forward::{encode_query, project_headers, AuthDecision, AuthGate, AUTH_REQUEST_TIMEOUT};
pub use middleware::auth_redirect_middleware;
