use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use sentinel_ai::AiService;
use sentinel_core::config::SentinelConfig;
use sentinel_monitor::MonitorService;
use sentinel_store::Store;

use crate::auth::{self, ApiKey};
use crate::error::ApiError;

/// Central shared state — passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: SentinelConfig,
    pub store: Option<Arc<Store>>,
    pub ai: Arc<AiService>,
    pub monitor: Option<Arc<MonitorService>>,
    pub api_keys: Vec<ApiKey>,
}

impl AppState {
    pub fn new(
        config: SentinelConfig,
        store: Option<Arc<Store>>,
        ai: Arc<AiService>,
        monitor: Option<Arc<MonitorService>>,
    ) -> Self {
        let api_keys = auth::parse_api_keys(&config.gateway.api_keys);
        Self {
            config,
            store,
            ai,
            monitor,
            api_keys,
        }
    }

    pub fn monitor(&self) -> Result<&Arc<MonitorService>, ApiError> {
        self.monitor
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("monitor service is not available"))
    }

    pub fn store(&self) -> Result<&Arc<Store>, ApiError> {
        self.store
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("storage is not available"))
    }
}

/// Assemble the full Axum router: public health + WS endpoint, and the
/// bearer-authenticated `/api` surface.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/status", get(crate::http::status::status_handler))
        // AI: settings / providers / chat
        .route(
            "/ai/settings",
            get(crate::http::ai::get_settings).put(crate::http::ai::put_settings),
        )
        .route("/ai/providers", get(crate::http::ai::list_providers))
        .route("/ai/models", get(crate::http::ai::list_models))
        .route("/ai/chat", post(crate::http::ai::chat))
        .route("/ai/chat/stream", post(crate::http::ai::chat_stream))
        // AI: chats CRUD + export
        .route(
            "/ai/chats",
            get(crate::http::chats::list_chats).post(crate::http::chats::create_chat),
        )
        .route(
            "/ai/chats/{id}",
            get(crate::http::chats::get_chat).put(crate::http::chats::switch_chat),
        )
        .route(
            "/ai/chats/{id}/messages",
            delete(crate::http::chats::clear_chat),
        )
        .route("/ai/chats/{id}/export", post(crate::http::chats::export_chat))
        // AI: generic + per-job endpoints (static routes above win over the capture)
        .route("/ai/jobs/{id}", post(crate::http::ai::run_job))
        .route("/ai/{job}", post(crate::http::ai::run_job))
        // Monitor
        .route(
            "/monitor/sources",
            get(crate::http::monitor::get_sources)
                .post(crate::http::monitor::add_source)
                .delete(crate::http::monitor::delete_source),
        )
        .route(
            "/monitor/sources/{source}/enable",
            post(crate::http::monitor::enable_source),
        )
        .route(
            "/monitor/sources/{source}/disable",
            post(crate::http::monitor::disable_source),
        )
        .route(
            "/monitor/filters",
            get(crate::http::monitor::get_filters).put(crate::http::monitor::put_filters),
        )
        .route("/monitor/history", get(crate::http::monitor::get_history))
        .route("/monitor/status", get(crate::http::monitor::status))
        .route("/monitor/start", post(crate::http::monitor::start))
        .route("/monitor/stop", post(crate::http::monitor::stop))
        .route(
            "/monitor/target",
            put(crate::http::monitor::put_target).delete(crate::http::monitor::reset_target),
        )
        .route("/monitor/forwarding", put(crate::http::monitor::put_forwarding))
        // RSS collaborator contract
        .route(
            "/rss/subscriptions",
            get(crate::http::rss::list_subscriptions)
                .post(crate::http::rss::add_subscription)
                .delete(crate::http::rss::delete_subscription),
        )
        .route("/rss/validate", post(crate::http::rss::validate))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws/monitor", get(crate::ws::monitor::ws_handler))
        .nest("/api", api)
        .layer(middleware::from_fn(auth::request_log))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
