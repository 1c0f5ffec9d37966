//! MTProto userbot gateway.
//!
//! The monitor consumes Telegram through the [`gateway::TelegramGateway`]
//! capability; [`client::GrammersGateway`] is the production implementation
//! over a grammers session. Outgoing sends serialize through the
//! [`ratelimit::RateLimiter`] — no other send path exists.

pub mod client;
pub mod error;
pub mod gateway;
pub mod ratelimit;

pub use error::{Result, TelegramError};
pub use gateway::{ResolvedPeer, TelegramGateway, TelegramUpdate};
pub use ratelimit::RateLimiter;
