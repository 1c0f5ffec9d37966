use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram is not configured (TG_API_ID / TG_API_HASH missing)")]
    NotConfigured,

    #[error("session error: {0}")]
    Session(String),

    #[error("session is not authorized; sign in once with an interactive MTProto tool")]
    NotAuthorized,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("could not resolve '{reference}': {reason}")]
    Resolve { reference: String, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("send queue closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, TelegramError>;
