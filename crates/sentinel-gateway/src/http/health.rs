use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — public liveness probe with a service-availability snapshot.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "services": {
            "ai": state.ai.is_available(),
            "rss": state.store.is_some(),
            "monitor": state.monitor.is_some(),
        },
    }))
}
