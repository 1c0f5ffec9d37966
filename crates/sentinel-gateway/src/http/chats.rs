//! Chat thread CRUD and export.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::AuthedUser;
use crate::error::ApiError;

/// GET /api/ai/chats
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Value>, ApiError> {
    let chats = state.ai.get_chats(user.0)?;
    Ok(Json(json!({ "chats": chats })))
}

/// POST /api/ai/chats — create a fresh chat and make it active.
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Value>, ApiError> {
    let chat = state.ai.create_chat(user.0)?;
    Ok(Json(json!({ "chat": chat })))
}

/// GET /api/ai/chats/{id} — thread metadata plus full transcript.
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store()?;
    let chat = store
        .get_chat(user.0, id)?
        .ok_or_else(|| ApiError::not_found(format!("chat {id}")))?;
    let messages = state.ai.get_chat_messages(user.0, id)?;
    Ok(Json(json!({ "chat": chat, "messages": messages })))
}

/// PUT /api/ai/chats/{id} — switch the active chat.
pub async fn switch_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let chat = state.ai.switch_chat(user.0, id)?;
    Ok(Json(json!({ "chat": chat })))
}

/// DELETE /api/ai/chats/{id}/messages
pub async fn clear_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.ai.clear_chat(user.0, id)?;
    Ok(Json(json!({ "cleared": true })))
}

/// POST /api/ai/chats/{id}/export — raw + notes markdown, with note-sink
/// URLs when the collaborator is configured.
pub async fn export_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<i64>,
) -> Result<Json<sentinel_ai::service::ExportReply>, ApiError> {
    let export = state.ai.export_chat(user.0, id).await?;
    Ok(Json(export))
}
