use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("telegram error: {0}")]
    Telegram(#[from] sentinel_telegram::TelegramError),

    #[error("storage error: {0}")]
    Store(#[from] sentinel_store::StoreError),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
