use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3900;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1_000;
/// Sources with this many consecutive fetch errors are retired from
/// collaborator listings.
pub const MAX_SOURCE_ERRORS: i64 = 5;

/// Top-level config (sentinel.toml + enumerated env overrides).
///
/// Nothing here is a hard startup requirement: subsystems with missing
/// credentials self-disable and report `Unavailable` when invoked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// API keys in `key` or `key:userId` form. A bare `key` is bound to
    /// user id = position in this list + 1.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// MTProto session credentials (from https://my.telegram.org).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub api_id: i32,
    #[serde(default)]
    pub api_hash: String,
    #[serde(default = "default_session_path")]
    pub session_path: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            session_path: default_session_path(),
        }
    }
}

impl TelegramConfig {
    /// The userbot can only start when both MTProto credentials are present.
    pub fn is_configured(&self) -> bool {
        self.api_id != 0 && !self.api_hash.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Channel refs to monitor: `@username`, signed id, or `-100…` form.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Destination for forwarded alerts. Empty disables forwarding.
    #[serde(default)]
    pub target_channel: Option<String>,
    /// Global keyword filter, stored lowercased. `["none"]` is a sentinel
    /// that disables keyword filtering entirely.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Global sender allowlist (usernames or numeric ids). Empty = no gate.
    #[serde(default)]
    pub from_users: Vec<String>,
    /// User ids eligible for history fan-out in addition to API-key-bound ids.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    /// Minimum spacing between outgoing MTProto sends.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            target_channel: None,
            keywords: Vec::new(),
            from_users: Vec::new(),
            allowed_users: Vec::new(),
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub groq: Option<ApiKeyConfig>,
    pub gemini: Option<ApiKeyConfig>,
    pub openai: Option<ApiKeyConfig>,
    pub anthropic: Option<ApiKeyConfig>,
    /// Additional OpenAI-compatible endpoints (e.g. NVIDIA NIM). Entries with
    /// a known `id` get their base URL filled from the provider table.
    #[serde(default)]
    pub openai_compat: Vec<OpenAiCompatEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub api_key: String,
    pub base_url: Option<String>,
}

/// A single OpenAI-compatible provider entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatEntry {
    /// Provider identifier — matches a known ID (e.g. "nvidia") or a custom label.
    pub id: String,
    pub api_key: String,
    /// Base URL without trailing slash. Required for unknown IDs.
    pub base_url: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_rate_limit_ms() -> u64 {
    DEFAULT_RATE_LIMIT_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.sentinel/sentinel.db", home)
}
fn default_session_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.sentinel/userbot.session", home)
}

impl SentinelConfig {
    /// Load config from a TOML file, then apply enumerated env overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.sentinel/sentinel.toml
    ///
    /// A missing file is fine (defaults apply); a malformed file is an error.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: SentinelConfig = Figment::new()
            .merge(Serialized::defaults(SentinelConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SENTINEL_").split("__"))
            .extract()
            .map_err(|e| crate::error::ConfigError::Parse(e.to_string()))?;

        config.apply_env();
        Ok(config)
    }

    /// Apply the flat, operationally-documented environment variables on top
    /// of whatever the file layer produced. Invalid values warn and keep the
    /// previous value; nothing fails startup.
    fn apply_env(&mut self) {
        if let Some(v) = env_u16("PORT") {
            self.gateway.port = v;
        }
        if let Some(v) = env_list("API_KEYS") {
            self.gateway.api_keys = v;
        }
        if let Some(v) = env_string("DATABASE_PATH") {
            self.database.path = v;
        }

        if let Some(v) = env_i32("TG_API_ID") {
            self.telegram.api_id = v;
        }
        if let Some(v) = env_string("TG_API_HASH") {
            self.telegram.api_hash = v;
        }
        if let Some(v) = env_string("TG_SESSION_PATH") {
            self.telegram.session_path = v;
        }

        if let Some(v) = env_list("SOURCE_CHANNELS") {
            self.monitor.sources = v;
        }
        if let Some(v) = env_string("TARGET_CHANNEL") {
            self.monitor.target_channel = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = env_list("KEYWORDS") {
            self.monitor.keywords = v.into_iter().map(|k| k.to_lowercase()).collect();
        }
        if let Some(v) = env_list("FROM_USERS") {
            self.monitor.from_users = v;
        }
        if let Some(v) = env_list("ALLOWED_USERS") {
            self.monitor.allowed_users = v
                .into_iter()
                .filter_map(|s| match s.parse::<i64>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(value = %s, "ALLOWED_USERS entry is not a numeric user id, skipping");
                        None
                    }
                })
                .collect();
        }
        if let Some(v) = env_u64("RATE_LIMIT_MS") {
            self.monitor.rate_limit_ms = v;
        }

        for (var, slot) in [
            ("GROQ_API_KEY", &mut self.providers.groq),
            ("GEMINI_API_KEY", &mut self.providers.gemini),
            ("OPENAI_API_KEY", &mut self.providers.openai),
            ("ANTHROPIC_API_KEY", &mut self.providers.anthropic),
        ] {
            if let Some(key) = env_string(var) {
                if !key.is_empty() {
                    let base_url = slot.as_ref().and_then(|c| c.base_url.clone());
                    *slot = Some(ApiKeyConfig { api_key: key, base_url });
                }
            }
        }
        if let Some(key) = env_string("NVIDIA_API_KEY") {
            if !key.is_empty() && !self.providers.openai_compat.iter().any(|e| e.id == "nvidia") {
                self.providers.openai_compat.push(OpenAiCompatEntry {
                    id: "nvidia".to_string(),
                    api_key: key,
                    base_url: None,
                });
            }
        }
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.sentinel/sentinel.toml", home)
}

// Typed env readers. Present-but-invalid values warn and are treated as absent
// so the file/default layer wins.

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

fn env_list(name: &str) -> Option<Vec<String>> {
    env_string(name).map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn env_u16(name: &str) -> Option<u16> {
    parse_env(name)
}

fn env_u64(name: &str) -> Option<u64> {
    parse_env(name)
}

fn env_i32(name: &str) -> Option<i32> {
    parse_env(name)
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "invalid value, keeping configured default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_contained() {
        let cfg = SentinelConfig::default();
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
        assert_eq!(cfg.monitor.rate_limit_ms, DEFAULT_RATE_LIMIT_MS);
        assert!(cfg.gateway.api_keys.is_empty());
        assert!(!cfg.telegram.is_configured());
    }

    #[test]
    fn telegram_configured_requires_both_credentials() {
        let mut tg = TelegramConfig::default();
        assert!(!tg.is_configured());
        tg.api_id = 12345;
        assert!(!tg.is_configured());
        tg.api_hash = "abcdef".to_string();
        assert!(tg.is_configured());
    }
}
