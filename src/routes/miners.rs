// Report ingestion and fleet queries: /api/report, /api/miners, /api/overview, /api/hashrate/history

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use super::overrides::backfill_stripped_fields;
use crate::models::{AgentReport, HashrateSample, Miner, Overview, ReportResponse};

const DEFAULT_HISTORY_HOURS: i64 = 24;
/// Widest history window served: 100 years.
const MAX_HISTORY_HOURS: i64 = 24 * 365 * 100;

/// POST /api/report: upsert the miner and hand back its pending override, if any.
pub(super) async fn report(
    State(state): State<AppState>,
    body: Result<Json<AgentReport>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let Json(report) = body?;
    if report.identity().is_none() {
        return Err(ApiError::BadRequest("miner_id or worker_id required".into()));
    }

    let id = state.store.upsert_miner(&report).await?;
    tracing::debug!(
        miner_id = %id,
        hashrate = report.hashrate.map(|h| h.current),
        "report stored"
    );

    // The report is already persisted; a failed override lookup only delays dispatch.
    let config_override = match state.store.get_config_override(&id).await {
        Ok(pending) => pending,
        Err(e) => {
            tracing::warn!(error = %e, miner_id = %id, operation = "get_config_override", "pending override lookup failed");
            None
        }
    };
    if config_override.is_some() {
        tracing::info!(miner_id = %id, "dispatching config override with report response");
    }
    Ok(Json(ReportResponse::with_override(config_override)))
}

/// GET /api/miners
pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<Miner>>, ApiError> {
    Ok(Json(state.store.get_miners().await?))
}

/// GET /api/miners/{id}: a pending override is shown as the miner's config so callers see the
/// desired state; otherwise fields the live API strips are backfilled from the last override.
pub(super) async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Miner>, ApiError> {
    let Some(mut miner) = state.store.get_miner(&id).await? else {
        return Err(ApiError::NotFound(format!("miner {} not found", id)));
    };

    if let Some(pending) = state.store.get_config_override(&id).await? {
        miner.config = Some(pending);
    } else if let Some(ref mut live) = miner.config
        && let Some(last) = state.store.get_last_override(&id).await?
    {
        backfill_stripped_fields(live, &last);
    }
    Ok(Json(miner))
}

/// GET /api/overview
pub(super) async fn overview(State(state): State<AppState>) -> Result<Json<Overview>, ApiError> {
    Ok(Json(state.store.get_overview().await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryParams {
    miner_id: Option<String>,
    hours: Option<String>,
}

/// Whole hours of history to return. Fractions truncate ("1.5" is 1, "0.5" is 0);
/// absent, unparseable, negative or non-finite values give 24; anything past 100 years is
/// clamped.
pub(super) fn history_window_hours(raw: Option<&str>) -> i64 {
    raw.and_then(|h| h.trim().parse::<f64>().ok())
        .filter(|h| h.is_finite() && *h >= 0.0)
        .map(|h| h.trunc().min(MAX_HISTORY_HOURS as f64) as i64)
        .unwrap_or(DEFAULT_HISTORY_HOURS)
}

/// GET /api/hashrate/history?miner_id=&hours=
pub(super) async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HashrateSample>>, ApiError> {
    let hours = history_window_hours(params.hours.as_deref());
    let since = Utc::now()
        .checked_sub_signed(TimeDelta::hours(hours))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let miner_id = params.miner_id.as_deref().filter(|id| !id.is_empty());
    Ok(Json(state.store.get_hashrate_history(miner_id, since).await?))
}
