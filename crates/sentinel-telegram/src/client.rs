//! Production gateway over a grammers MTProto session.
//!
//! Session management, dialog sync, and event pumping are kept apart: `new`
//! opens the session, `connect` syncs dialogs and starts the single update
//! pump, and the peer cache is warmed from both paths so downstream filter
//! logic can work with stable numeric ids.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use grammers_client::{Client, Config, InitParams, Update};
use grammers_session::{PackedChat, Session};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use sentinel_core::config::TelegramConfig;
use sentinel_core::refs::normalize_ref;

use crate::error::{Result, TelegramError};
use crate::gateway::{ResolvedPeer, TelegramGateway, TelegramUpdate};
use crate::ratelimit::RateLimiter;

const EVENT_CAPACITY: usize = 1024;

struct CachedPeer {
    packed: PackedChat,
    peer: ResolvedPeer,
}

pub struct GrammersGateway {
    client: Client,
    limiter: RateLimiter,
    /// Normalized ref (username or id string) → resolved peer.
    peers: DashMap<String, CachedPeer>,
    events: broadcast::Sender<TelegramUpdate>,
    pump_started: AtomicBool,
    session_path: String,
}

impl GrammersGateway {
    /// Open the stored session and verify it is signed in.
    ///
    /// The userbot never performs an interactive login; the session file must
    /// have been authorized once out of band.
    pub async fn new(config: &TelegramConfig, min_interval: Duration) -> Result<Self> {
        if !config.is_configured() {
            return Err(TelegramError::NotConfigured);
        }

        let session = Session::load_file_or_create(&config.session_path)
            .map_err(|e| TelegramError::Session(e.to_string()))?;

        let client = Client::connect(Config {
            session,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| TelegramError::Connect(e.to_string()))?;

        if !client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connect(e.to_string()))?
        {
            return Err(TelegramError::NotAuthorized);
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            client,
            limiter: RateLimiter::new(min_interval),
            peers: DashMap::new(),
            events,
            pump_started: AtomicBool::new(false),
            session_path: config.session_path.clone(),
        })
    }

    fn cache_chat(&self, chat: &grammers_client::types::Chat) {
        let peer = ResolvedPeer {
            id: chat.id(),
            username: chat.username().map(str::to_string),
            title: chat.name().to_string(),
        };
        let cached = || CachedPeer {
            packed: chat.pack(),
            peer: peer.clone(),
        };
        if let Some(username) = chat.username() {
            self.peers.insert(normalize_ref(username), cached());
        }
        self.peers.insert(chat.id().to_string(), cached());
    }

    fn cached(&self, reference: &str) -> Option<(PackedChat, ResolvedPeer)> {
        self.peers
            .get(&normalize_ref(reference))
            .map(|entry| (entry.packed, entry.peer.clone()))
    }

    /// Walk all dialogs so the library's session knows every subscribed
    /// channel. Without this, events for passive channels may never arrive.
    async fn sync_dialogs(&self) -> Result<usize> {
        let mut count = 0;
        let mut dialogs = self.client.iter_dialogs();
        loop {
            match dialogs.next().await {
                Ok(Some(dialog)) => {
                    self.cache_chat(dialog.chat());
                    count += 1;
                }
                Ok(None) => break,
                Err(e) => return Err(TelegramError::Connect(e.to_string())),
            }
        }
        debug!(count, "dialogs synced");
        Ok(count)
    }

    /// Start the single receive-all update pump (idempotent).
    fn start_pump(&self) {
        if self.pump_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            info!("telegram update pump started");
            loop {
                match client.next_update().await {
                    Ok(Update::NewMessage(message)) => {
                        if message.outgoing() {
                            continue;
                        }
                        let chat = message.chat();
                        let sender = message.sender();
                        let update = TelegramUpdate {
                            message_id: message.id(),
                            chat_id: chat.id(),
                            chat_username: chat.username().map(str::to_string),
                            chat_title: Some(chat.name().to_string()),
                            sender_id: sender.as_ref().map(|s| s.id()),
                            sender_username: sender
                                .as_ref()
                                .and_then(|s| s.username())
                                .map(str::to_string),
                            text: message.text().to_string(),
                        };
                        // no subscribers is fine — the monitor may be stopped
                        let _ = events.send(update);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "update pump error, retrying in 1s");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl TelegramGateway for GrammersGateway {
    async fn connect(&self) -> Result<()> {
        let count = self.sync_dialogs().await?;
        info!(dialogs = count, "telegram connected");
        if let Err(e) = self.client.session().save_to_file(&self.session_path) {
            warn!(error = %e, "could not persist session");
        }
        self.start_pump();
        Ok(())
    }

    async fn resolve_ref(&self, reference: &str) -> Result<Option<ResolvedPeer>> {
        if let Some((_, peer)) = self.cached(reference) {
            return Ok(Some(peer));
        }

        let normalized = normalize_ref(reference);
        // numeric ids only resolve through the dialog cache
        if normalized.chars().all(|c| c.is_ascii_digit()) {
            return Ok(None);
        }

        match self.client.resolve_username(&normalized).await {
            Ok(Some(chat)) => {
                self.cache_chat(&chat);
                Ok(self.cached(reference).map(|(_, peer)| peer))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(TelegramError::Resolve {
                reference: reference.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn incoming(&self) -> broadcast::Receiver<TelegramUpdate> {
        self.events.subscribe()
    }

    async fn send_message(&self, peer_ref: &str, text: &str) -> Result<()> {
        let packed = match self.cached(peer_ref) {
            Some((packed, _)) => packed,
            None => {
                self.resolve_ref(peer_ref).await?;
                self.cached(peer_ref)
                    .map(|(packed, _)| packed)
                    .ok_or_else(|| TelegramError::Resolve {
                        reference: peer_ref.to_string(),
                        reason: "unknown peer".to_string(),
                    })?
            }
        };

        let client = self.client.clone();
        let text = text.to_string();
        self.limiter
            .submit(async move { client.send_message(packed, text).await })
            .await?
            .map_err(|e| TelegramError::Send(e.to_string()))?;
        Ok(())
    }
}
