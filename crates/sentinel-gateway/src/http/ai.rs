//! AI endpoints: settings, providers/models, chat (plain + SSE), and the
//! catalog job surface.

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;

use sentinel_ai::catalog::JobId;
use sentinel_ai::service::JobOptions;
use sentinel_ai::StreamEvent;

use crate::app::AppState;
use crate::auth::AuthedUser;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SettingsBody {
    pub provider: String,
    #[serde(default)]
    pub model: String,
}

/// GET /api/ai/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Value>, ApiError> {
    let settings = state.ai.get_settings(user.0)?;
    Ok(Json(json!({ "provider": settings.provider, "model": settings.model })))
}

/// PUT /api/ai/settings
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Json(body): Json<SettingsBody>,
) -> Result<Json<Value>, ApiError> {
    let settings = state.ai.update_settings(user.0, &body.provider, &body.model)?;
    Ok(Json(json!({ "provider": settings.provider, "model": settings.model })))
}

/// GET /api/ai/providers
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "providers": state.ai.list_providers() }))
}

#[derive(Deserialize)]
pub struct ModelsQuery {
    pub provider: String,
}

/// GET /api/ai/models?provider=…
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<Value>, ApiError> {
    let models = state.ai.get_models(&query.provider).await?;
    Ok(Json(json!({ "provider": query.provider, "models": models })))
}

#[derive(Deserialize)]
pub struct ChatBody {
    pub message: String,
}

/// POST /api/ai/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Json(body): Json<ChatBody>,
) -> Result<Json<sentinel_ai::service::ChatReply>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::bad_request("message cannot be empty"));
    }
    let reply = state.ai.chat(user.0, &body.message).await?;
    Ok(Json(reply))
}

/// POST /api/ai/chat/stream — SSE: `meta`, repeated `chunk`, then `done`
/// or `error`.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Json(body): Json<ChatBody>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::bad_request("message cannot be empty"));
    }
    let handle = state.ai.chat_stream(user.0, &body.message).await?;

    let meta = json!({
        "chatId": handle.chat_id,
        "provider": handle.provider,
        "model": handle.model,
    });
    let mut rx = handle.rx;

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("meta").data(meta.to_string()));
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Token { text } => {
                    yield Ok(Event::default()
                        .event("chunk")
                        .data(json!({ "token": text }).to_string()));
                }
                StreamEvent::Done { content } => {
                    yield Ok(Event::default()
                        .event("done")
                        .data(json!({ "content": content }).to_string()));
                    break;
                }
                StreamEvent::Error { message } => {
                    yield Ok(Event::default()
                        .event("error")
                        .data(json!({ "error": message }).to_string()));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Deserialize, Default)]
pub struct JobBody {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(flatten)]
    pub payload: Value,
}

/// POST /api/ai/jobs/{id} and POST /api/ai/{job} — catalog job execution.
/// The per-job routes (`analyze`, `summarize`, `translate`, `filter-match`,
/// …) accept the same bodies; static sibling routes take precedence over
/// the capture.
pub async fn run_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<String>,
    Json(body): Json<JobBody>,
) -> Result<Json<sentinel_ai::service::JobReply>, ApiError> {
    let job =
        JobId::parse(&id).ok_or_else(|| ApiError::not_found(format!("unknown AI job '{id}'")))?;
    let opts = JobOptions {
        provider: body.provider,
        model: body.model,
        retries: body.retries,
    };
    let reply = state.ai.run_job(user.0, job, &body.payload, opts).await?;
    Ok(Json(reply))
}
