// GET /api/proxy/summary, GET /api/proxy/workers: pass-through to the pool proxy

use axum::Json;
use axum::extract::State;
use serde_json::Value;

use super::AppState;
use super::error::ApiError;
use crate::proxy_client::ProxyClient;

fn client(state: &AppState) -> Result<&ProxyClient, ApiError> {
    state
        .proxy
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable("proxy not configured".into()))
}

pub(super) async fn summary(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let summary = client(&state)?
        .summary()
        .await
        .map_err(|e| ApiError::BadGateway(format!("failed to get proxy summary: {:#}", e)))?;
    Ok(Json(summary))
}

pub(super) async fn workers(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    let workers = client(&state)?
        .workers()
        .await
        .map_err(|e| ApiError::BadGateway(format!("failed to get proxy workers: {:#}", e)))?;
    Ok(Json(workers))
}
