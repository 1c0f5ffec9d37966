use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
