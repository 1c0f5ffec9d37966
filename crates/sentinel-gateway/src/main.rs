use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use sentinel_ai::{AiService, ProviderRegistry};
use sentinel_core::config::SentinelConfig;
use sentinel_monitor::MonitorService;
use sentinel_store::Store;
use sentinel_telegram::client::GrammersGateway;
use sentinel_telegram::TelegramGateway;

mod app;
mod auth;
mod error;
mod http;
mod ws;

#[derive(Parser)]
#[command(name = "sentinel-gateway", about = "Telegram monitoring + AI backend")]
struct Args {
    /// Path to sentinel.toml (default: ~/.sentinel/sentinel.toml)
    #[arg(long)]
    config: Option<String>,
    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = SentinelConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        SentinelConfig::default()
    });
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    // Every subsystem below degrades gracefully: a missing store, an
    // unconfigured Telegram session or zero provider keys disable that
    // subsystem only.
    let store = match Store::open(&config.database.path) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!(error = %e, "store unavailable, running without persistence");
            None
        }
    };

    let registry = Arc::new(ProviderRegistry::from_config(&config.providers));
    if !registry.any_configured() {
        info!("no AI provider configured; AI endpoints will report unavailable");
    }
    let ai = Arc::new(AiService::new(store.clone(), Arc::clone(&registry), None));

    let monitor = build_monitor(&config, store.clone()).await;

    let state = Arc::new(app::AppState::new(config.clone(), store, ai, monitor.clone()));
    let router = app::build_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!("sentinel gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // deregister the MTProto listener before the store drops
    if let Some(monitor) = &monitor {
        monitor.stop().await;
    }
    info!("sentinel gateway stopped");
    Ok(())
}

/// Bring up the Telegram gateway and monitor service when the MTProto
/// session is configured. Start failures leave the monitor stopped but the
/// API surface alive.
async fn build_monitor(
    config: &SentinelConfig,
    store: Option<Arc<Store>>,
) -> Option<Arc<MonitorService>> {
    if !config.telegram.is_configured() {
        info!("telegram not configured; monitor disabled");
        return None;
    }

    let rate = Duration::from_millis(config.monitor.rate_limit_ms);
    let gateway = match GrammersGateway::new(&config.telegram, rate).await {
        Ok(gateway) => Arc::new(gateway) as Arc<dyn TelegramGateway>,
        Err(e) => {
            warn!(error = %e, "telegram gateway unavailable, monitor disabled");
            return None;
        }
    };
    if let Err(e) = gateway.connect().await {
        warn!(error = %e, "telegram connect failed, monitor disabled");
        return None;
    }

    let service = Arc::new(MonitorService::new(
        gateway,
        store,
        config.monitor.clone(),
        auth::bound_user_ids(&config.gateway.api_keys),
    ));

    if config.monitor.sources.is_empty() {
        info!("no sources configured; monitor idle until sources are added");
    } else if let Err(e) = service.start().await {
        warn!(error = %e, "monitor did not start");
    }

    Some(service)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
