use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sentinel_ai::{AiError, ProviderError};
use sentinel_monitor::MonitorError;

/// Error surface of the REST layer. Bodies are always `{"error": <message>}`;
/// auth failures carry no detail beyond "Unauthorized".
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<AiError> for ApiError {
    fn from(e: AiError) -> Self {
        let status = match &e {
            AiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AiError::Provider(ProviderError::Config(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AiError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AiError::Catalog(_) => StatusCode::BAD_REQUEST,
            AiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AiError::NotFound(_) => StatusCode::NOT_FOUND,
            AiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        let status = match &e {
            MonitorError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MonitorError::NotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::Telegram(_) | MonitorError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<sentinel_store::StoreError> for ApiError {
    fn from(e: sentinel_store::StoreError) -> Self {
        Self::internal(e.to_string())
    }
}
