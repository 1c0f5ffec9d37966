use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;

/// A new-message event as seen by the monitor pipeline.
#[derive(Debug, Clone)]
pub struct TelegramUpdate {
    pub message_id: i32,
    /// Raw chat id as delivered by the client library (bare, unsigned form).
    pub chat_id: i64,
    pub chat_username: Option<String>,
    pub chat_title: Option<String>,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub text: String,
}

/// A resolved chat/channel entity.
#[derive(Debug, Clone)]
pub struct ResolvedPeer {
    pub id: i64,
    pub username: Option<String>,
    pub title: String,
}

/// The capability set the monitor consumes from the MTProto layer.
///
/// The event stream is receive-all by design: the underlying library's
/// chat-scoped filters are unreliable for passive channels, so consumers do
/// their own source matching.
#[async_trait]
pub trait TelegramGateway: Send + Sync {
    /// Establish the session and sync dialogs so events for passive channels
    /// start arriving.
    async fn connect(&self) -> Result<()>;

    /// Resolve a `@username` / id ref, warming the internal peer cache.
    /// `None` when the ref cannot be resolved to a known entity.
    async fn resolve_ref(&self, reference: &str) -> Result<Option<ResolvedPeer>>;

    /// Subscribe to the receive-all new-message stream.
    fn incoming(&self) -> broadcast::Receiver<TelegramUpdate>;

    /// Send a text message to the referenced peer. Serialized through the
    /// rate limiter.
    async fn send_message(&self, peer_ref: &str, text: &str) -> Result<()>;
}
