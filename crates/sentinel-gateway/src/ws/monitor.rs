//! Real-time fan-out at GET /ws/monitor?token=<apiKey>.
//!
//! Each connection authenticates with its query token, loads the user's
//! filter policy, and then receives exactly the events that policy accepts —
//! the same predicate that gates history persistence. Filter updates apply
//! to the next event.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use sentinel_core::types::FilterPolicy;

use crate::app::AppState;
use crate::auth;

const CLOSE_MISSING_TOKEN: u16 = 4001;
const CLOSE_INVALID_TOKEN: u16 = 4003;
const CLOSE_INTERNAL: u16 = 4000;

type WsSink = SplitSink<WebSocket, Message>;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, query.token))
}

/// Per-connection task — lives for the entire stream session.
async fn handle_connection(mut socket: WebSocket, state: Arc<AppState>, token: Option<String>) {
    // auth happens post-upgrade so the 4xxx close codes can be delivered
    let Some(token) = token else {
        close(&mut socket, CLOSE_MISSING_TOKEN, "missing token").await;
        return;
    };
    let Some(user_id) = auth::lookup(&state.api_keys, &token) else {
        close(&mut socket, CLOSE_INVALID_TOKEN, "invalid token").await;
        return;
    };
    let Some(monitor) = state.monitor.clone() else {
        close(&mut socket, CLOSE_INTERNAL, "monitor unavailable").await;
        return;
    };

    let mut filters = monitor.get_filters(user_id).unwrap_or_else(|e| {
        debug!(user_id, error = %e, "no stored filters, using defaults");
        FilterPolicy::default()
    });

    let (mut tx, mut rx) = socket.split();

    let hello = json!({
        "type": "connected",
        "userId": user_id,
        "filters": filters,
    });
    if send_json(&mut tx, &hello).await.is_err() {
        return;
    }
    info!(user_id, "stream client connected");

    let mut events = monitor.subscribe();

    loop {
        tokio::select! {
            // matched event → forward if this user's predicate accepts
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !filters.accepts(&event) {
                            continue;
                        }
                        let frame = json!({ "type": "message", "data": event });
                        if send_json(&mut tx, &frame).await.is_err() {
                            break; // dead consumer drops out of the set
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id, skipped, "slow stream consumer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // control frames from the client
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(updated) =
                            handle_frame(&mut tx, &monitor, user_id, &text).await
                        {
                            filters = updated;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    info!(user_id, "stream client disconnected");
}

/// Handle one inbound control frame. Returns the new filter policy when the
/// client updated it.
async fn handle_frame(
    tx: &mut WsSink,
    monitor: &Arc<sentinel_monitor::MonitorService>,
    user_id: i64,
    text: &str,
) -> Option<FilterPolicy> {
    let frame: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            let _ = send_json(tx, &json!({ "type": "error", "message": "malformed frame" })).await;
            return None;
        }
    };

    match frame.get("type").and_then(|t| t.as_str()) {
        Some("update_filters") => {
            let policy: FilterPolicy = frame
                .get("filters")
                .cloned()
                .and_then(|f| serde_json::from_value(f).ok())
                .unwrap_or_default();
            match monitor.update_filters(user_id, &policy) {
                Ok(merged) => {
                    let _ = send_json(
                        tx,
                        &json!({ "type": "filters_updated", "filters": merged }),
                    )
                    .await;
                    Some(merged)
                }
                Err(e) => {
                    warn!(user_id, error = %e, "filter update failed");
                    let _ =
                        send_json(tx, &json!({ "type": "error", "message": e.to_string() })).await;
                    None
                }
            }
        }
        Some("ping") => {
            let _ = send_json(tx, &json!({ "type": "pong" })).await;
            None
        }
        other => {
            let message = format!("unknown frame type '{}'", other.unwrap_or("<none>"));
            let _ = send_json(tx, &json!({ "type": "error", "message": message })).await;
            None
        }
    }
}

async fn send_json(tx: &mut WsSink, payload: &serde_json::Value) -> Result<(), axum::Error> {
    let text = serde_json::to_string(payload).unwrap_or_default();
    tx.send(Message::Text(text.into())).await
}

async fn close(socket: &mut WebSocket, code: u16, reason: &str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}
