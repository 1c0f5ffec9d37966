//! RSS collaborator contract: subscription CRUD backed by the store, plus a
//! feed reachability probe. Fetching and parsing feeds belongs to the
//! external RSS service.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::app::AppState;
use crate::auth::AuthedUser;
use crate::error::ApiError;

const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// GET /api/rss/subscriptions
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Value>, ApiError> {
    let subscriptions = state.store()?.list_subscriptions(user.0)?;
    Ok(Json(json!({ "subscriptions": subscriptions })))
}

#[derive(Deserialize)]
pub struct AddSubscriptionBody {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// POST /api/rss/subscriptions — upsert the source, subscribe the caller.
/// Duplicate subscriptions are success with `added: false`.
pub async fn add_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Json(body): Json<AddSubscriptionBody>,
) -> Result<Json<Value>, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::bad_request("'url' cannot be empty"));
    }
    let store = state.store()?;
    let source_id = store.create_source(body.url.trim(), body.title.trim())?;
    let added = store.add_subscription(user.0, source_id)?;
    Ok(Json(json!({ "added": added, "sourceId": source_id })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSubscriptionBody {
    pub source_id: i64,
}

/// DELETE /api/rss/subscriptions
pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Json(body): Json<DeleteSubscriptionBody>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.store()?.delete_subscription(user.0, body.source_id)?;
    if !deleted {
        return Err(ApiError::not_found(format!(
            "subscription to source {}",
            body.source_id
        )));
    }
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct ValidateBody {
    pub url: String,
}

/// POST /api/rss/validate — reachability only; content checks are the RSS
/// service's job.
pub async fn validate(Json(body): Json<ValidateBody>) -> Result<Json<Value>, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::bad_request("'url' cannot be empty"));
    }

    let client = reqwest::Client::builder()
        .timeout(VALIDATE_TIMEOUT)
        .build()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    match client.get(body.url.trim()).send().await {
        Ok(resp) => Ok(Json(json!({
            "valid": resp.status().is_success(),
            "status": resp.status().as_u16(),
        }))),
        Err(e) => Ok(Json(json!({
            "valid": false,
            "error": e.to_string(),
        }))),
    }
}
