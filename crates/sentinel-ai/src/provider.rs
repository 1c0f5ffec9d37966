use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Request to an LLM provider: prior history, an optional system preamble,
/// and a final user turn carrying `prompt`.
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub model: String,
    pub prompt: String,
    pub history: Vec<ChatMessage>,
    pub system: Option<String>,
}

impl ChatExchange {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            history: Vec::new(),
            system: None,
        }
    }
}

/// Uniform response shape across providers. `thinking` aggregates any
/// chain-of-thought-tagged blocks; empty when the backend has no such
/// concept.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub thinking: String,
    pub content: String,
}

/// A model offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Events emitted during a streaming provider call.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text content from the model.
    Token { text: String },
    /// Stream completed; carries the full assembled content.
    Done { content: String },
    /// Error during streaming.
    Error { message: String },
}

/// Common interface for all LLM backends (Groq, Gemini, OpenAI, Anthropic,
/// OpenAI-compatible endpoints).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable key used in settings and API routes (e.g. "groq").
    fn key(&self) -> &str;

    /// Human-readable name.
    fn display_name(&self) -> &str;

    /// Whether the provider has the credentials it needs.
    fn is_configured(&self) -> bool;

    /// Recommended model when the user has not picked one.
    fn default_model(&self) -> &str;

    /// Curated list used when the live model endpoint is unreachable.
    fn fallback_models(&self) -> Vec<ModelInfo>;

    /// Query the provider's model list endpoint.
    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    /// Send the exchange and wait for the full response. Runs under the
    /// provider's deadline; on timeout the underlying request is dropped,
    /// which aborts the socket.
    async fn call(&self, req: &ChatExchange) -> Result<ChatOutcome, ProviderError>;

    /// Stream the response through a channel.
    /// Default: falls back to the non-streaming call, emits the whole
    /// content as one token followed by `Done`.
    async fn call_stream(
        &self,
        req: &ChatExchange,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let outcome = self.call(req).await?;
        let _ = tx
            .send(StreamEvent::Token {
                text: outcome.content.clone(),
            })
            .await;
        let _ = tx
            .send(StreamEvent::Done {
                content: outcome.content,
            })
            .await;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl ProviderError {
    /// Timeouts, transport errors and 5xx responses are worth one retry;
    /// configuration problems and 4xx rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } | ProviderError::Http(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Run `fut` under a deadline, mapping expiry to [`ProviderError::Timeout`].
/// Dropping the future tears down the in-flight reqwest call.
pub(crate) async fn with_deadline<T, F>(secs: u64, fut: F) -> Result<T, ProviderError>
where
    F: std::future::Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(std::time::Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout { secs }),
    }
}

/// Cap an error body for inclusion in error messages.
pub(crate) fn snippet(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::Timeout { secs: 60 }.is_retryable());
        assert!(ProviderError::Api {
            status: 502,
            message: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::Api {
            status: 400,
            message: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::Config("no key".into()).is_retryable());
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let long = "é".repeat(600);
        let s = snippet(&long);
        assert!(s.len() <= 520);
        assert!(s.ends_with('…'));
    }
}
