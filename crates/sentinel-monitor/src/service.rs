use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sentinel_core::config::MonitorConfig;
use sentinel_core::refs::{normalize_ref, refs_equal};
use sentinel_core::types::{FilterPolicy, MonitorEvent};
use sentinel_store::Store;
use sentinel_telegram::{TelegramGateway, TelegramUpdate};

use crate::broadcast::EventBroadcaster;
use crate::error::{MonitorError, Result};
use crate::pipeline;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub running: bool,
    pub forwarding: bool,
    pub target_channel: Option<String>,
    pub sources: Vec<SourceStatus>,
    pub stream_clients: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    #[serde(rename = "ref")]
    pub reference: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddSourceOutcome {
    pub added: bool,
    pub resolved: bool,
}

/// Mutable runtime state. Mutations go through the service lock; `start`,
/// `stop` and source changes are mutually exclusive.
struct RuntimeState {
    running: bool,
    /// Ordered configured refs, as written by the operator.
    sources: Vec<String>,
    /// Normalized refs muted from forwarding (still persisted and emitted).
    disabled: HashSet<String>,
    forwarding: bool,
    /// Runtime redirect; `None` means the config default applies.
    target_override: Option<String>,
    cancel: Option<CancellationToken>,
}

struct Inner {
    gateway: Arc<dyn TelegramGateway>,
    store: Option<Arc<Store>>,
    broadcaster: EventBroadcaster,
    defaults: MonitorConfig,
    /// API-key-bound ids ∪ ALLOWED_USERS — the history fan-out set.
    eligible_users: Vec<i64>,
    state: Mutex<RuntimeState>,
}

pub struct MonitorService {
    inner: Arc<Inner>,
}

impl MonitorService {
    pub fn new(
        gateway: Arc<dyn TelegramGateway>,
        store: Option<Arc<Store>>,
        config: MonitorConfig,
        api_user_ids: Vec<i64>,
    ) -> Self {
        let mut eligible_users = api_user_ids;
        for id in &config.allowed_users {
            if !eligible_users.contains(id) {
                eligible_users.push(*id);
            }
        }

        let state = RuntimeState {
            running: false,
            sources: config.sources.clone(),
            disabled: HashSet::new(),
            forwarding: true,
            target_override: None,
            cancel: None,
        };

        Self {
            inner: Arc::new(Inner {
                gateway,
                store,
                broadcaster: EventBroadcaster::new(),
                defaults: config,
                eligible_users,
                state: Mutex::new(state),
            }),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// `stopped → running`. Resolves every configured source (zero resolved
    /// is fatal) and spawns the single receive-all ingest task.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.running {
            debug!("monitor already running");
            return Ok(());
        }
        if state.sources.is_empty() {
            return Err(MonitorError::Unavailable("no sources configured".into()));
        }

        let resolved = self.resolve_all(&state.sources).await;
        if resolved == 0 {
            return Err(MonitorError::Unavailable(
                "none of the configured sources resolved".into(),
            ));
        }

        if let Some(store) = &self.inner.store {
            if let Err(e) = store.ensure_monitor_tables() {
                warn!(error = %e, "could not verify monitor tables");
            }
        }

        let token = CancellationToken::new();
        state.cancel = Some(token.clone());
        state.running = true;
        drop(state);

        let inner = Arc::clone(&self.inner);
        let mut rx = inner.gateway.incoming();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    update = rx.recv() => match update {
                        Ok(update) => process_update(&inner, update).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "ingest stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            info!("monitor ingest task stopped");
        });

        info!(resolved, "monitor started");
        Ok(())
    }

    /// `running → stopped`. Deregisters the ingest task.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
        if state.running {
            state.running = false;
            info!("monitor stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    // ── Source lifecycle ────────────────────────────────────────────────────

    /// Append a source ref and refresh entity resolution. An unresolvable
    /// ref is stored anyway — the caller sees `resolved: false`.
    pub async fn add_source(&self, reference: &str) -> Result<AddSourceOutcome> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(MonitorError::NotFound("empty source ref".into()));
        }

        let mut state = self.inner.state.lock().await;
        if state.sources.iter().any(|s| refs_equal(s, reference)) {
            return Ok(AddSourceOutcome {
                added: false,
                resolved: true,
            });
        }

        let resolved = match self.inner.gateway.resolve_ref(reference).await {
            Ok(peer) => peer.is_some(),
            Err(e) => {
                warn!(reference, error = %e, "resolution failed for new source");
                false
            }
        };
        if !resolved {
            warn!(reference, "source stored but not yet resolvable");
        }

        state.sources.push(reference.to_string());
        let sources = state.sources.clone();
        drop(state);

        // refresh: re-warm the peer cache so the new source gets updates
        // immediately (receive-all mode itself needs no re-registration)
        self.resolve_all(&sources).await;
        Ok(AddSourceOutcome {
            added: true,
            resolved,
        })
    }

    /// Remove a source ref. Emptying the list stops the monitor.
    pub async fn delete_source(&self, reference: &str) -> Result<bool> {
        let mut state = self.inner.state.lock().await;
        let before = state.sources.len();
        state.sources.retain(|s| !refs_equal(s, reference));
        let removed = state.sources.len() != before;
        if removed {
            state.disabled.remove(&normalize_ref(reference));
        }

        if removed && state.sources.is_empty() && state.running {
            if let Some(token) = state.cancel.take() {
                token.cancel();
            }
            state.running = false;
            info!("last source removed, monitor stopped");
        }
        Ok(removed)
    }

    /// Mute a source from forwarding. It keeps persisting and emitting.
    pub async fn disable_source(&self, reference: &str) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if !state.sources.iter().any(|s| refs_equal(s, reference)) {
            return Err(MonitorError::NotFound(format!("source '{reference}'")));
        }
        state.disabled.insert(normalize_ref(reference));
        Ok(())
    }

    pub async fn enable_source(&self, reference: &str) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if !state.sources.iter().any(|s| refs_equal(s, reference)) {
            return Err(MonitorError::NotFound(format!("source '{reference}'")));
        }
        state.disabled.remove(&normalize_ref(reference));
        Ok(())
    }

    // ── Runtime toggles ─────────────────────────────────────────────────────

    /// Pause or resume forwarding without stopping ingestion.
    pub async fn set_forwarding(&self, enabled: bool) {
        let mut state = self.inner.state.lock().await;
        state.forwarding = enabled;
        info!(enabled, "forwarding toggled");
    }

    pub async fn set_target_channel(&self, target: &str) {
        let mut state = self.inner.state.lock().await;
        state.target_override = Some(target.to_string());
        info!(target, "target channel overridden");
    }

    /// Back to the configured default.
    pub async fn reset_target_channel(&self) {
        let mut state = self.inner.state.lock().await;
        state.target_override = None;
    }

    // ── Per-user filters & history ──────────────────────────────────────────

    pub fn get_filters(&self, user_id: i64) -> Result<FilterPolicy> {
        let store = self.store()?;
        Ok(store.get_filters(user_id)?)
    }

    pub fn update_filters(&self, user_id: i64, policy: &FilterPolicy) -> Result<FilterPolicy> {
        let store = self.store()?;
        store.set_filters(user_id, policy)?;
        Ok(store.get_filters(user_id)?)
    }

    pub fn get_history(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<sentinel_store::types::HistoryRow>> {
        let store = self.store()?;
        Ok(store.get_history(user_id, limit)?)
    }

    // ── Introspection & stream ──────────────────────────────────────────────

    pub async fn get_status(&self) -> MonitorStatus {
        let state = self.inner.state.lock().await;
        MonitorStatus {
            running: state.running,
            forwarding: state.forwarding,
            target_channel: effective_target(&state, &self.inner.defaults),
            sources: source_statuses(&state),
            stream_clients: self.inner.broadcaster.subscriber_count(),
        }
    }

    pub async fn get_sources(&self) -> Vec<SourceStatus> {
        let state = self.inner.state.lock().await;
        source_statuses(&state)
    }

    /// Live event stream; subscribers apply their own filter policy.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.broadcaster.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcaster.subscriber_count()
    }

    fn store(&self) -> Result<&Arc<Store>> {
        self.inner
            .store
            .as_ref()
            .ok_or_else(|| MonitorError::Unavailable("storage is unavailable".into()))
    }

    /// Warm the gateway's peer cache for every configured ref; returns how
    /// many resolved.
    async fn resolve_all(&self, sources: &[String]) -> usize {
        let mut resolved = 0;
        for reference in sources {
            match self.inner.gateway.resolve_ref(reference).await {
                Ok(Some(_)) => resolved += 1,
                Ok(None) => debug!(reference, "source did not resolve"),
                Err(e) => warn!(reference, error = %e, "source resolution error"),
            }
        }
        resolved
    }
}

fn source_statuses(state: &RuntimeState) -> Vec<SourceStatus> {
    state
        .sources
        .iter()
        .map(|s| SourceStatus {
            reference: s.clone(),
            disabled: state.disabled.contains(&normalize_ref(s)),
        })
        .collect()
}

fn effective_target(state: &RuntimeState, defaults: &MonitorConfig) -> Option<String> {
    state
        .target_override
        .clone()
        .or_else(|| defaults.target_channel.clone())
        .filter(|t| !t.is_empty())
}

/// The per-event pipeline. Errors in any fan-out branch are logged and
/// swallowed; one branch failing never takes down another.
async fn process_update(inner: &Arc<Inner>, update: TelegramUpdate) {
    // gate
    if update.text.trim().is_empty() {
        return;
    }

    // snapshot runtime state; the rest of the pipeline runs lock-free
    let (running, sources, disabled, forwarding, target) = {
        let state = inner.state.lock().await;
        (
            state.running,
            state.sources.clone(),
            state.disabled.clone(),
            state.forwarding,
            effective_target(&state, &inner.defaults),
        )
    };
    if !running {
        return;
    }

    // source match
    let Some((matched_ref, source_name)) = pipeline::match_source(&sources, &update) else {
        return;
    };

    // global gates
    if !pipeline::sender_allowed(&inner.defaults.from_users, &update) {
        return;
    }
    if !pipeline::keywords_pass(&inner.defaults.keywords, &update.text) {
        return;
    }

    let event = MonitorEvent::new(update.text.clone(), source_name.clone(), update.chat_id);
    debug!(source = %source_name, id = %event.id, "event matched");

    // forward (spawned so a slow send never stalls ingestion; ordering of
    // outgoing sends is preserved by the gateway's rate limiter queue)
    let source_muted = disabled.contains(&normalize_ref(matched_ref));
    if forwarding && !source_muted {
        if let Some(target) = target {
            let alert = pipeline::format_alert(&update.text, &source_name);
            let gateway = Arc::clone(&inner.gateway);
            tokio::spawn(async move {
                if let Err(e) = gateway.send_message(&target, &alert).await {
                    warn!(error = %e, "alert forwarding failed");
                }
            });
        }
    }

    // per-user history fan-out
    if let Some(store) = &inner.store {
        for user_id in &inner.eligible_users {
            let policy = match store.get_filters(*user_id) {
                Ok(p) => p,
                Err(e) => {
                    warn!(user_id, error = %e, "could not load filters, skipping user");
                    continue;
                }
            };
            if !policy.accepts(&event) {
                continue;
            }
            if let Err(e) = store.add_history(*user_id, &event) {
                warn!(user_id, error = %e, "history write failed");
            }
        }
    }

    // emit unconditionally; stream subscribers run their own predicate
    inner.broadcaster.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_telegram::ResolvedPeer;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Gateway double: scripted resolution, captured sends, manual event feed.
    struct MockGateway {
        events: broadcast::Sender<TelegramUpdate>,
        sent: StdMutex<Vec<(String, String)>>,
        resolvable: Vec<String>,
    }

    impl MockGateway {
        fn new(resolvable: &[&str]) -> Arc<Self> {
            let (events, _) = broadcast::channel(64);
            Arc::new(Self {
                events,
                sent: StdMutex::new(Vec::new()),
                resolvable: resolvable.iter().map(|s| s.to_string()).collect(),
            })
        }

        fn feed(&self, update: TelegramUpdate) {
            let _ = self.events.send(update);
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TelegramGateway for MockGateway {
        async fn connect(&self) -> sentinel_telegram::Result<()> {
            Ok(())
        }

        async fn resolve_ref(
            &self,
            reference: &str,
        ) -> sentinel_telegram::Result<Option<ResolvedPeer>> {
            let hit = self.resolvable.iter().any(|r| refs_equal(r, reference));
            Ok(hit.then(|| ResolvedPeer {
                id: 1,
                username: None,
                title: reference.to_string(),
            }))
        }

        fn incoming(&self) -> broadcast::Receiver<TelegramUpdate> {
            self.events.subscribe()
        }

        async fn send_message(&self, peer_ref: &str, text: &str) -> sentinel_telegram::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((peer_ref.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn update(chat_id: i64, username: Option<&str>, text: &str) -> TelegramUpdate {
        TelegramUpdate {
            message_id: 1,
            chat_id,
            chat_username: username.map(str::to_string),
            chat_title: None,
            sender_id: Some(500),
            sender_username: Some("alice".to_string()),
            text: text.to_string(),
        }
    }

    fn config(sources: &[&str], target: Option<&str>, keywords: &[&str]) -> MonitorConfig {
        MonitorConfig {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            target_channel: target.map(str::to_string),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    async fn recv_event(
        rx: &mut broadcast::Receiver<MonitorEvent>,
    ) -> Option<MonitorEvent> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .and_then(|r| r.ok())
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
        for _ in 0..100 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cond()
    }

    #[tokio::test]
    async fn start_fails_when_nothing_resolves() {
        let gateway = MockGateway::new(&[]);
        let service = MonitorService::new(
            gateway,
            None,
            config(&["@ghost"], Some("@target"), &[]),
            vec![],
        );
        let err = service.start().await.unwrap_err();
        assert!(matches!(err, MonitorError::Unavailable(_)));
        assert!(!service.is_running().await);
    }

    #[tokio::test]
    async fn normalized_source_match_forwards_persists_and_emits() {
        let gateway = MockGateway::new(&["-1001234567890", "@news"]);
        let store = Arc::new(Store::open_in_memory().unwrap());
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            Some(Arc::clone(&store)),
            config(&["-1001234567890", "@news"], Some("@target"), &[]),
            vec![1],
        );
        service.start().await.unwrap();
        let mut stream = service.subscribe();

        gateway.feed(update(1234567890, None, "hello"));

        let event = recv_event(&mut stream).await.expect("event emitted");
        assert_eq!(event.text, "hello");
        assert_eq!(event.source, "1234567890");
        assert_eq!(event.source_id, 1234567890);

        assert!(
            wait_until(|| !gateway.sent().is_empty()).await,
            "alert was not sent"
        );
        let sent = gateway.sent();
        assert_eq!(sent[0].0, "@target");
        assert_eq!(
            sent[0].1,
            "🔔【New Alert】\n\nhello\n\n— Source: 1234567890"
        );

        let history = store.get_history(1, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "hello");
        assert_eq!(history[0].source, "1234567890");
    }

    #[tokio::test]
    async fn keyword_sentinel_disables_global_filter() {
        let gateway = MockGateway::new(&["@news"]);
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            None,
            config(&["@news"], Some("@target"), &["none"]),
            vec![],
        );
        service.start().await.unwrap();
        let mut stream = service.subscribe();

        gateway.feed(update(7, Some("news"), "totally unrelated"));

        assert!(recv_event(&mut stream).await.is_some());
        assert!(wait_until(|| !gateway.sent().is_empty()).await);
    }

    #[tokio::test]
    async fn global_keyword_filter_drops_non_matching() {
        let gateway = MockGateway::new(&["@news"]);
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            None,
            config(&["@news"], Some("@target"), &["bitcoin"]),
            vec![],
        );
        service.start().await.unwrap();
        let mut stream = service.subscribe();

        gateway.feed(update(7, Some("news"), "nothing interesting"));
        gateway.feed(update(7, Some("news"), "Bitcoin is moving"));

        let event = recv_event(&mut stream).await.expect("matching event");
        assert_eq!(event.text, "Bitcoin is moving");
    }

    #[tokio::test]
    async fn per_user_filters_diverge_on_history() {
        let gateway = MockGateway::new(&["@news"]);
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .set_filters(
                1,
                &FilterPolicy {
                    keywords: vec!["bitcoin".to_string()],
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .set_filters(
                2,
                &FilterPolicy {
                    enabled: false,
                    ..Default::default()
                },
            )
            .unwrap();

        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            Some(Arc::clone(&store)),
            config(&["@news"], None, &[]),
            vec![1, 2],
        );
        service.start().await.unwrap();
        let mut stream = service.subscribe();

        gateway.feed(update(7, Some("news"), "Bitcoin at ATH"));
        recv_event(&mut stream).await.expect("event emitted");

        assert!(wait_until(|| store.get_history(1, 10).unwrap().len() == 1).await);
        assert!(store.get_history(2, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn forwarding_pause_still_persists_and_emits() {
        let gateway = MockGateway::new(&["@news"]);
        let store = Arc::new(Store::open_in_memory().unwrap());
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            Some(Arc::clone(&store)),
            config(&["@news"], Some("@target"), &[]),
            vec![1],
        );
        service.start().await.unwrap();
        service.set_forwarding(false).await;
        let mut stream = service.subscribe();

        gateway.feed(update(7, Some("news"), "still flowing"));

        recv_event(&mut stream).await.expect("event emitted");
        assert!(wait_until(|| store.get_history(1, 10).unwrap().len() == 1).await);
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn disabled_source_is_muted_from_forwarding_only() {
        let gateway = MockGateway::new(&["@news"]);
        let store = Arc::new(Store::open_in_memory().unwrap());
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            Some(Arc::clone(&store)),
            config(&["@news"], Some("@target"), &[]),
            vec![1],
        );
        service.start().await.unwrap();
        service.disable_source("@news").await.unwrap();
        let mut stream = service.subscribe();

        gateway.feed(update(7, Some("news"), "muted source"));

        recv_event(&mut stream).await.expect("event emitted");
        assert!(wait_until(|| store.get_history(1, 10).unwrap().len() == 1).await);
        assert!(gateway.sent().is_empty());

        service.enable_source("@news").await.unwrap();
        gateway.feed(update(7, Some("news"), "unmuted"));
        recv_event(&mut stream).await.expect("event emitted");
        assert!(wait_until(|| !gateway.sent().is_empty()).await);
    }

    #[tokio::test]
    async fn target_override_and_reset() {
        let gateway = MockGateway::new(&["@news"]);
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            None,
            config(&["@news"], Some("@default_target"), &[]),
            vec![],
        );
        service.start().await.unwrap();
        service.set_target_channel("@override").await;
        let mut stream = service.subscribe();

        gateway.feed(update(7, Some("news"), "one"));
        recv_event(&mut stream).await.unwrap();
        assert!(wait_until(|| !gateway.sent().is_empty()).await);
        assert_eq!(gateway.sent()[0].0, "@override");

        service.reset_target_channel().await;
        let status = service.get_status().await;
        assert_eq!(status.target_channel.as_deref(), Some("@default_target"));
    }

    #[tokio::test]
    async fn empty_text_is_dropped() {
        let gateway = MockGateway::new(&["@news"]);
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            None,
            config(&["@news"], Some("@target"), &[]),
            vec![],
        );
        service.start().await.unwrap();
        let mut stream = service.subscribe();

        gateway.feed(update(7, Some("news"), "   "));
        gateway.feed(update(7, Some("news"), "real message"));

        let event = recv_event(&mut stream).await.unwrap();
        assert_eq!(event.text, "real message");
    }

    #[tokio::test]
    async fn duplicate_add_source_reports_not_added() {
        let gateway = MockGateway::new(&["@news", "@extra"]);
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            None,
            config(&["@news"], None, &[]),
            vec![],
        );
        let outcome = service.add_source("@extra").await.unwrap();
        assert!(outcome.added);
        assert!(outcome.resolved);

        let outcome = service.add_source("extra").await.unwrap();
        assert!(!outcome.added);

        // unresolvable refs are stored with a warning
        let outcome = service.add_source("@ghost").await.unwrap();
        assert!(outcome.added);
        assert!(!outcome.resolved);
    }

    #[tokio::test]
    async fn deleting_last_source_stops_the_monitor() {
        let gateway = MockGateway::new(&["@news"]);
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            None,
            config(&["@news"], None, &[]),
            vec![],
        );
        service.start().await.unwrap();
        assert!(service.is_running().await);

        assert!(service.delete_source("news").await.unwrap());
        assert!(!service.is_running().await);
        assert!(service.get_sources().await.is_empty());
    }

    #[tokio::test]
    async fn stopped_monitor_does_not_emit() {
        let gateway = MockGateway::new(&["@news"]);
        let service = MonitorService::new(
            Arc::clone(&gateway) as Arc<dyn TelegramGateway>,
            None,
            config(&["@news"], None, &[]),
            vec![],
        );
        service.start().await.unwrap();
        service.stop().await;
        let mut stream = service.subscribe();

        gateway.feed(update(7, Some("news"), "after stop"));

        assert!(
            tokio::time::timeout(Duration::from_millis(200), stream.recv())
                .await
                .is_err(),
            "no event should arrive after stop"
        );
    }
}
