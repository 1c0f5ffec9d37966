use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::AuthedUser;

/// GET /api/status — caller identity plus service availability.
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Json<Value> {
    let (monitor_running, stream_clients) = match &state.monitor {
        Some(monitor) => (monitor.is_running().await, monitor.subscriber_count()),
        None => (false, 0),
    };

    Json(json!({
        "userId": user.0,
        "services": {
            "ai": state.ai.is_available(),
            "rss": state.store.is_some(),
            "monitor": monitor_running,
        },
        "streamClients": stream_clients,
    }))
}
