// Operator overrides and the agent pending/ack handshake under /api/miners/{id}/config

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde_json::Value;

use super::AppState;
use super::error::ApiError;
use crate::models::{ConfigDocument, OkResponse, ReportResponse};

/// Keys the mining process drops from its `GET /1/config` echo of the `cpu` section.
const STRIPPED_CPU_KEYS: &[&str] = &["max-threads-hint"];

/// PUT /api/miners/{id}/config: replaces any previous override; the new one is pending.
pub(super) async fn set(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ConfigDocument>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Json(doc) = body?;
    state.store.set_config_override(&id, &doc).await?;
    tracing::info!(miner_id = %id, "stored config override");
    Ok(Json(OkResponse::OK))
}

/// DELETE /api/miners/{id}/config
pub(super) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_config_override(&id).await?;
    tracing::info!(miner_id = %id, "deleted config override");
    Ok(Json(OkResponse::OK))
}

/// GET /api/miners/{id}/config/pending
pub(super) async fn pending(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let config_override = state.store.get_config_override(&id).await?;
    Ok(Json(ReportResponse::with_override(config_override)))
}

/// POST /api/miners/{id}/config/ack
pub(super) async fn ack(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.mark_config_applied(&id).await?;
    tracing::info!(miner_id = %id, "config override acknowledged");
    Ok(Json(OkResponse::OK))
}

/// Copy `cpu` keys the live API strips from `last_override` into `live` where absent.
pub(crate) fn backfill_stripped_fields(live: &mut ConfigDocument, last_override: &ConfigDocument) {
    let (Some(Value::Object(live_cpu)), Some(Value::Object(override_cpu))) =
        (live.get_mut("cpu"), last_override.get("cpu"))
    else {
        return;
    };
    for key in STRIPPED_CPU_KEYS {
        if !live_cpu.contains_key(*key)
            && let Some(v) = override_cpu.get(*key)
        {
            live_cpu.insert((*key).to_string(), v.clone());
        }
    }
}
