//! Bearer-key authentication and request logging.
//!
//! `API_KEYS` entries come in `key` or `key:userId` form; a bare key is
//! bound to user id = its position + 1. The bound user id is the only scope
//! a request can read or write.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{info, warn};

use crate::app::AppState;

/// The authenticated user id, inserted as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub i64);

#[derive(Debug, Clone)]
pub struct ApiKey {
    pub key: String,
    pub user_id: i64,
}

pub fn parse_api_keys(entries: &[String]) -> Vec<ApiKey> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            let fallback_id = (index as i64) + 1;
            match raw.split_once(':') {
                Some((key, id)) => {
                    let user_id = match id.trim().parse() {
                        Ok(uid) => uid,
                        Err(_) => {
                            warn!(entry = index, "API key has a non-numeric user id, using position");
                            fallback_id
                        }
                    };
                    Some(ApiKey {
                        key: key.trim().to_string(),
                        user_id,
                    })
                }
                None => Some(ApiKey {
                    key: raw.to_string(),
                    user_id: fallback_id,
                }),
            }
        })
        .collect()
}

pub fn lookup(keys: &[ApiKey], token: &str) -> Option<i64> {
    keys.iter().find(|k| k.key == token).map(|k| k.user_id)
}

/// User ids bound to any API key — the monitor's history fan-out set.
pub fn bound_user_ids(entries: &[String]) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::new();
    for key in parse_api_keys(entries) {
        if !ids.contains(&key.user_id) {
            ids.push(key.user_id);
        }
    }
    ids
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Guard for everything under `/api`. Rejections leak no detail.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_id = extract_bearer(req.headers()).and_then(|t| lookup(&state.api_keys, t));
    let Some(user_id) = user_id else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response();
    };

    req.extensions_mut().insert(AuthedUser(user_id));
    let mut res = next.run(req).await;
    // surfaced to the logging layer
    res.extensions_mut().insert(AuthedUser(user_id));
    res
}

/// Global access log: stable request id, method/path/status/duration, and
/// the authenticated user when one was bound.
pub async fn request_log(req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let res = next.run(req).await;

    let user_id = res.extensions().get::<AuthedUser>().map(|u| u.0);
    info!(
        %request_id,
        %method,
        path,
        status = res.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        user_id,
        "request"
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_keys_bind_to_position_plus_one() {
        let keys = parse_api_keys(&entries(&["alpha", "beta"]));
        assert_eq!(lookup(&keys, "alpha"), Some(1));
        assert_eq!(lookup(&keys, "beta"), Some(2));
        assert_eq!(lookup(&keys, "gamma"), None);
    }

    #[test]
    fn explicit_user_ids_win() {
        let keys = parse_api_keys(&entries(&["alpha:42", "beta"]));
        assert_eq!(lookup(&keys, "alpha"), Some(42));
        assert_eq!(lookup(&keys, "beta"), Some(2));
    }

    #[test]
    fn malformed_user_id_falls_back_to_position() {
        let keys = parse_api_keys(&entries(&["alpha:abc"]));
        assert_eq!(lookup(&keys, "alpha"), Some(1));
    }

    #[test]
    fn empty_entries_are_skipped() {
        let keys = parse_api_keys(&entries(&["", "  ", "real"]));
        assert_eq!(keys.len(), 1);
        // position counts the original list, not the filtered one
        assert_eq!(lookup(&keys, "real"), Some(3));
    }

    #[test]
    fn bound_ids_deduplicate() {
        let ids = bound_user_ids(&entries(&["a:7", "b:7", "c"]));
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer tok-1".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Some("tok-1"));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic xyz".parse().unwrap());
        assert_eq!(extract_bearer(&headers), None);
    }
}
