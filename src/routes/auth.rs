// Shared-secret bearer check for agent-facing endpoints (report, pending, ack).

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use super::AppState;
use super::error::ApiError;

/// Passes every request when no key is configured; otherwise requires
/// `Authorization: Bearer <agent_key>` exactly.
pub(super) async fn require_agent_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(ref key) = state.agent_key {
        let presented = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(key.as_ref()) {
            tracing::warn!(path = %req.uri().path(), "rejected agent request with missing or wrong key");
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}
