//! Monitor control surface — a thin adapter over `MonitorService`.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use sentinel_core::types::FilterPolicy;

use crate::app::AppState;
use crate::auth::AuthedUser;
use crate::error::ApiError;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

/// GET /api/monitor/status
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let status = state.monitor()?.get_status().await;
    Ok(Json(json!(status)))
}

/// POST /api/monitor/start
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.monitor()?.start().await?;
    Ok(Json(json!({ "running": true })))
}

/// POST /api/monitor/stop
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.monitor()?.stop().await;
    Ok(Json(json!({ "running": false })))
}

/// GET /api/monitor/sources
pub async fn get_sources(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let sources = state.monitor()?.get_sources().await;
    Ok(Json(json!({ "sources": sources })))
}

#[derive(Deserialize)]
pub struct SourceBody {
    #[serde(rename = "ref")]
    pub reference: String,
}

/// POST /api/monitor/sources — add a source ref. `added: false` on duplicate.
pub async fn add_source(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SourceBody>,
) -> Result<Json<Value>, ApiError> {
    if body.reference.trim().is_empty() {
        return Err(ApiError::bad_request("'ref' cannot be empty"));
    }
    let outcome = state.monitor()?.add_source(&body.reference).await?;
    Ok(Json(json!(outcome)))
}

/// DELETE /api/monitor/sources
pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SourceBody>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.monitor()?.delete_source(&body.reference).await?;
    if !removed {
        return Err(ApiError::not_found(format!("source '{}'", body.reference)));
    }
    Ok(Json(json!({ "deleted": true })))
}

/// POST /api/monitor/sources/{source}/enable
pub async fn enable_source(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.monitor()?.enable_source(&source).await?;
    Ok(Json(json!({ "ref": source, "disabled": false })))
}

/// POST /api/monitor/sources/{source}/disable
pub async fn disable_source(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.monitor()?.disable_source(&source).await?;
    Ok(Json(json!({ "ref": source, "disabled": true })))
}

/// GET /api/monitor/filters
pub async fn get_filters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Value>, ApiError> {
    let filters = state.monitor()?.get_filters(user.0)?;
    Ok(Json(json!({ "filters": filters })))
}

/// PUT /api/monitor/filters — wholesale replace, echo the merged result.
pub async fn put_filters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Json(policy): Json<FilterPolicy>,
) -> Result<Json<Value>, ApiError> {
    let merged = state.monitor()?.update_filters(user.0, &policy)?;
    Ok(Json(json!({ "filters": merged })))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// GET /api/monitor/history?limit=
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let history = state.monitor()?.get_history(user.0, limit)?;
    Ok(Json(json!({ "history": history })))
}

#[derive(Deserialize)]
pub struct TargetBody {
    pub target: String,
}

/// PUT /api/monitor/target — runtime redirect of the forward destination.
pub async fn put_target(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TargetBody>,
) -> Result<Json<Value>, ApiError> {
    if body.target.trim().is_empty() {
        return Err(ApiError::bad_request("'target' cannot be empty"));
    }
    state.monitor()?.set_target_channel(&body.target).await;
    Ok(Json(json!({ "target": body.target })))
}

/// DELETE /api/monitor/target — back to the configured default.
pub async fn reset_target(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let monitor = state.monitor()?;
    monitor.reset_target_channel().await;
    let status = monitor.get_status().await;
    Ok(Json(json!({ "target": status.target_channel })))
}

#[derive(Deserialize)]
pub struct ForwardingBody {
    pub enabled: bool,
}

/// PUT /api/monitor/forwarding — pause/resume without stopping ingestion.
pub async fn put_forwarding(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ForwardingBody>,
) -> Result<Json<Value>, ApiError> {
    state.monitor()?.set_forwarding(body.enabled).await;
    Ok(Json(json!({ "forwarding": body.enabled })))
}
