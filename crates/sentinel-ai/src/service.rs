//! AI orchestration: chat threads with memory, catalog jobs, and exports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sentinel_store::types::{AiChat, AiMessage, NEW_CHAT_TITLE};
use sentinel_store::Store;

use crate::catalog::{self, JobId};
use crate::error::{AiError, Result};
use crate::provider::{ChatExchange, ChatMessage, ChatOutcome, Provider, Role, StreamEvent};
use crate::registry::{ProviderRegistry, ProviderSummary};

/// Messages of prior history sent with each chat turn.
const HISTORY_WINDOW: usize = 4;
/// Refresh the rolling summary every this many stored messages.
const SUMMARY_EVERY: i64 = 6;
/// Messages fed into a summary refresh.
const SUMMARY_WINDOW: usize = 20;
/// Auto-assigned titles are clipped to this many characters.
const TITLE_MAX_CHARS: usize = 40;
/// Backoff before the single retry of a failed provider call.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
/// Export notes are generated from at most this much raw transcript.
const EXPORT_NOTES_BUDGET: usize = 15_000;

/// External note storage (GitHub collaborator). Disabled unless wired in.
#[async_trait]
pub trait NoteSink: Send + Sync {
    fn is_ready(&self) -> bool;
    async fn save_note(&self, path: &str, content: &str, commit_message: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub content: String,
    pub thinking: String,
    pub chat_id: i64,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReply {
    pub job: String,
    pub content: String,
    pub thinking: String,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub retries: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReply {
    pub raw: String,
    pub notes: String,
    pub raw_url: Option<String>,
    pub notes_url: Option<String>,
}

/// Handle returned by [`AiService::chat_stream`]: metadata plus the event
/// receiver the transport drains.
pub struct ChatStreamHandle {
    pub chat_id: i64,
    pub provider: String,
    pub model: String,
    pub rx: mpsc::Receiver<StreamEvent>,
}

pub struct AiService {
    store: Option<Arc<Store>>,
    registry: Arc<ProviderRegistry>,
    notes: Option<Arc<dyn NoteSink>>,
}

impl AiService {
    pub fn new(
        store: Option<Arc<Store>>,
        registry: Arc<ProviderRegistry>,
        notes: Option<Arc<dyn NoteSink>>,
    ) -> Self {
        Self {
            store,
            registry,
            notes,
        }
    }

    /// "A configured provider exists" — reachability is probed at call time.
    pub fn is_available(&self) -> bool {
        self.registry.any_configured()
    }

    fn store(&self) -> Result<&Arc<Store>> {
        self.store
            .as_ref()
            .ok_or_else(|| AiError::Unavailable("storage is unavailable".into()))
    }

    /// Pick the provider and model for a call: explicit override, then the
    /// user's saved settings, then the first configured provider.
    fn resolve(
        &self,
        user_id: i64,
        provider_override: Option<&str>,
        model_override: Option<&str>,
    ) -> Result<(Arc<dyn Provider>, String)> {
        if let Some(key) = provider_override {
            let provider = self
                .registry
                .get(key)
                .ok_or_else(|| AiError::InvalidArgument(format!("unknown provider '{key}'")))?;
            let model = model_override
                .map(str::to_string)
                .unwrap_or_else(|| provider.default_model().to_string());
            return Ok((provider, model));
        }

        if let Some(store) = &self.store {
            if let Some(settings) = store.get_settings(user_id)? {
                if let Some(provider) = self.registry.get(&settings.provider) {
                    let model = model_override
                        .map(str::to_string)
                        .unwrap_or(settings.model);
                    return Ok((provider, model));
                }
                warn!(
                    provider = %settings.provider,
                    "saved provider no longer registered, falling back to default"
                );
            }
        }

        let provider = self
            .registry
            .default_provider()
            .ok_or_else(|| AiError::Unavailable("no AI provider is configured".into()))?;
        let model = model_override
            .map(str::to_string)
            .unwrap_or_else(|| provider.default_model().to_string());
        Ok((provider, model))
    }

    /// One retry with a short backoff. Timeouts and 5xx retry; 4xx does not.
    async fn call_with_retry(
        provider: &Arc<dyn Provider>,
        exchange: &ChatExchange,
        retries: u32,
    ) -> std::result::Result<ChatOutcome, crate::provider::ProviderError> {
        let mut attempt = 0;
        loop {
            match provider.call(exchange).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < retries && e.is_retryable() => {
                    attempt += 1;
                    warn!(provider = provider.key(), attempt, error = %e, "provider call failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ── Chat ────────────────────────────────────────────────────────────────

    pub async fn chat(&self, user_id: i64, message: &str) -> Result<ChatReply> {
        let (provider, model, chat, exchange) = self.prepare_turn(user_id, message)?;

        let outcome = Self::call_with_retry(&provider, &exchange, 1).await?;

        let store = self.store()?;
        store.save_message(chat.id, Role::Assistant.as_str(), &outcome.content)?;
        self.maybe_refresh_summary(chat.id, &provider, &model)?;

        Ok(ChatReply {
            content: outcome.content,
            thinking: outcome.thinking,
            chat_id: chat.id,
            provider: provider.key().to_string(),
            model,
        })
    }

    /// Streaming variant: tokens flow through the returned handle; the
    /// assistant turn is persisted when the stream completes.
    pub async fn chat_stream(&self, user_id: i64, message: &str) -> Result<ChatStreamHandle> {
        let (provider, model, chat, exchange) = self.prepare_turn(user_id, message)?;

        let (provider_tx, mut provider_rx) = mpsc::channel::<StreamEvent>(64);
        let (out_tx, out_rx) = mpsc::channel::<StreamEvent>(64);

        let call_provider = Arc::clone(&provider);
        let call_exchange = exchange.clone();
        tokio::spawn(async move {
            if let Err(e) = call_provider.call_stream(&call_exchange, provider_tx).await {
                warn!(error = %e, "streaming provider call failed");
            }
        });

        let store = Arc::clone(self.store()?);
        let chat_id = chat.id;
        let relay_provider = Arc::clone(&provider);
        let relay_model = model.clone();
        tokio::spawn(async move {
            while let Some(event) = provider_rx.recv().await {
                if let StreamEvent::Done { content } = &event {
                    if let Err(e) = store.save_message(chat_id, Role::Assistant.as_str(), content)
                    {
                        warn!(error = %e, "could not persist streamed assistant turn");
                    }
                    maybe_refresh_summary_inner(&store, chat_id, &relay_provider, &relay_model);
                }
                if out_tx.send(event).await.is_err() {
                    break; // client went away
                }
            }
        });

        Ok(ChatStreamHandle {
            chat_id: chat.id,
            provider: provider.key().to_string(),
            model,
            rx: out_rx,
        })
    }

    /// Shared preamble of both chat paths: persist the user turn, assign the
    /// title on the first message, and assemble the provider exchange.
    fn prepare_turn(
        &self,
        user_id: i64,
        message: &str,
    ) -> Result<(Arc<dyn Provider>, String, AiChat, ChatExchange)> {
        if message.trim().is_empty() {
            return Err(AiError::InvalidArgument("message cannot be empty".into()));
        }

        let (provider, model) = self.resolve(user_id, None, None)?;
        let store = self.store()?;

        let chat = store.get_or_create_active_chat(user_id)?;
        store.save_message(chat.id, Role::User.as_str(), message)?;

        if store.message_count(chat.id)? == 1 && chat.title == NEW_CHAT_TITLE {
            store.rename_chat(chat.id, &derive_title(message))?;
        }

        // history = up to HISTORY_WINDOW turns before the one just saved
        let mut history = store.recent_messages(chat.id, HISTORY_WINDOW + 1)?;
        history.pop();
        let history: Vec<ChatMessage> = history
            .iter()
            .filter_map(|m| {
                Role::parse(&m.role).map(|role| ChatMessage {
                    role,
                    content: m.content.clone(),
                })
            })
            .collect();

        let base_system = catalog::system(JobId::Chat);
        let system = match chat.summary.as_deref().filter(|s| !s.is_empty()) {
            Some(summary) => format!("[Previous conversation summary: {summary}]\n\n{base_system}"),
            None => base_system.to_string(),
        };

        let exchange = ChatExchange {
            model: model.clone(),
            prompt: message.to_string(),
            history,
            system: Some(system),
        };

        Ok((provider, model, chat, exchange))
    }

    /// Every [`SUMMARY_EVERY`] stored messages, refresh the chat summary in
    /// the background. Never blocks or fails the caller.
    fn maybe_refresh_summary(
        &self,
        chat_id: i64,
        provider: &Arc<dyn Provider>,
        model: &str,
    ) -> Result<()> {
        let store = Arc::clone(self.store()?);
        maybe_refresh_summary_inner(&store, chat_id, provider, model);
        Ok(())
    }

    // ── Jobs ────────────────────────────────────────────────────────────────

    pub async fn run_job(
        &self,
        user_id: i64,
        job: JobId,
        payload: &Value,
        opts: JobOptions,
    ) -> Result<JobReply> {
        let prompt = catalog::build_prompt(job, payload)?;
        let (provider, model) =
            self.resolve(user_id, opts.provider.as_deref(), opts.model.as_deref())?;

        let exchange = ChatExchange {
            model: model.clone(),
            prompt,
            history: Vec::new(),
            system: Some(catalog::system(job).to_string()),
        };

        debug!(job = job.as_str(), provider = provider.key(), %model, "running catalog job");
        let outcome =
            Self::call_with_retry(&provider, &exchange, opts.retries.unwrap_or(1)).await?;

        Ok(JobReply {
            job: job.as_str().to_string(),
            content: outcome.content,
            thinking: outcome.thinking,
            provider: provider.key().to_string(),
            model,
        })
    }

    // ── Settings / providers ────────────────────────────────────────────────

    pub fn get_settings(&self, user_id: i64) -> Result<SettingsView> {
        if let Some(store) = &self.store {
            if let Some(settings) = store.get_settings(user_id)? {
                return Ok(SettingsView {
                    provider: settings.provider,
                    model: settings.model,
                });
            }
        }
        let provider = self
            .registry
            .default_provider()
            .ok_or_else(|| AiError::Unavailable("no AI provider is configured".into()))?;
        Ok(SettingsView {
            provider: provider.key().to_string(),
            model: provider.default_model().to_string(),
        })
    }

    pub fn update_settings(&self, user_id: i64, provider: &str, model: &str) -> Result<SettingsView> {
        let known = self
            .registry
            .get(provider)
            .ok_or_else(|| AiError::InvalidArgument(format!("unknown provider '{provider}'")))?;
        let model = if model.is_empty() {
            known.default_model().to_string()
        } else {
            model.to_string()
        };
        self.store()?.set_settings(user_id, provider, &model)?;
        Ok(SettingsView {
            provider: provider.to_string(),
            model,
        })
    }

    pub fn list_providers(&self) -> Vec<ProviderSummary> {
        self.registry.list()
    }

    pub async fn get_models(&self, provider: &str) -> Result<Vec<crate::provider::ModelInfo>> {
        Ok(self.registry.models(provider).await?)
    }

    // ── Chats CRUD ──────────────────────────────────────────────────────────

    pub fn get_chats(&self, user_id: i64) -> Result<Vec<AiChat>> {
        Ok(self.store()?.list_chats(user_id)?)
    }

    pub fn create_chat(&self, user_id: i64) -> Result<AiChat> {
        Ok(self.store()?.create_chat(user_id, None)?)
    }

    pub fn switch_chat(&self, user_id: i64, chat_id: i64) -> Result<AiChat> {
        let store = self.store()?;
        store.set_active_chat(user_id, chat_id)?;
        store
            .get_chat(user_id, chat_id)?
            .ok_or_else(|| AiError::NotFound(format!("chat {chat_id}")))
    }

    pub fn get_chat_messages(&self, user_id: i64, chat_id: i64) -> Result<Vec<AiMessage>> {
        let store = self.store()?;
        store
            .get_chat(user_id, chat_id)?
            .ok_or_else(|| AiError::NotFound(format!("chat {chat_id}")))?;
        Ok(store.all_messages(chat_id)?)
    }

    pub fn clear_chat(&self, user_id: i64, chat_id: i64) -> Result<()> {
        let store = self.store()?;
        store
            .get_chat(user_id, chat_id)?
            .ok_or_else(|| AiError::NotFound(format!("chat {chat_id}")))?;
        store.clear_messages(chat_id)?;
        Ok(())
    }

    // ── Export ──────────────────────────────────────────────────────────────

    pub async fn export_chat(&self, user_id: i64, chat_id: i64) -> Result<ExportReply> {
        let store = self.store()?;
        let chat = store
            .get_chat(user_id, chat_id)?
            .ok_or_else(|| AiError::NotFound(format!("chat {chat_id}")))?;
        let messages = store.all_messages(chat_id)?;

        let raw = render_transcript(&chat, &messages);
        let clipped: String = raw.chars().take(EXPORT_NOTES_BUDGET).collect();
        let notes_reply = self
            .run_job(
                user_id,
                JobId::ChatNotes,
                &serde_json::json!({ "text": clipped }),
                JobOptions::default(),
            )
            .await?;
        let notes = notes_reply.content;

        let (raw_url, notes_url) = match &self.notes {
            Some(sink) if sink.is_ready() => {
                let slug = format!("chat-{}-{}", chat.id, chrono::Utc::now().format("%Y%m%d"));
                let commit = format!("Export chat '{}'", chat.title);
                let raw_url = sink
                    .save_note(&format!("raw/{slug}.md"), &raw, &commit)
                    .await?;
                let notes_url = sink
                    .save_note(&format!("notes/{slug}.md"), &notes, &commit)
                    .await?;
                info!(chat_id, "chat exported to note sink");
                (Some(raw_url), Some(notes_url))
            }
            _ => (None, None),
        };

        Ok(ExportReply {
            raw,
            notes,
            raw_url,
            notes_url,
        })
    }
}

/// First message becomes the chat title, clipped with an ellipsis.
fn derive_title(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        let clipped: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{clipped}...")
    } else {
        trimmed.to_string()
    }
}

fn render_transcript(chat: &AiChat, messages: &[AiMessage]) -> String {
    let mut out = format!("# {}\n\n", chat.title);
    let body: Vec<String> = messages
        .iter()
        .map(|m| {
            let label = match m.role.as_str() {
                "assistant" => "Assistant",
                _ => "User",
            };
            format!("**{label}:**\n\n{}", m.content)
        })
        .collect();
    out.push_str(&body.join("\n\n---\n\n"));
    out
}

/// Fire-and-forget summary refresh over the most recent messages.
fn maybe_refresh_summary_inner(
    store: &Arc<Store>,
    chat_id: i64,
    provider: &Arc<dyn Provider>,
    model: &str,
) {
    let total = match store.message_count(chat_id) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "summary check failed");
            return;
        }
    };
    if total == 0 || total % SUMMARY_EVERY != 0 {
        return;
    }

    let store = Arc::clone(store);
    let provider = Arc::clone(provider);
    let model = model.to_string();
    tokio::spawn(async move {
        let messages = match store.recent_messages(chat_id, SUMMARY_WINDOW) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "summary refresh: could not load messages");
                return;
            }
        };
        let transcript: Vec<String> = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect();
        let prompt = match catalog::build_prompt(
            JobId::ChatSummary,
            &serde_json::json!({ "text": transcript.join("\n") }),
        ) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "summary refresh: bad payload");
                return;
            }
        };

        let exchange = ChatExchange {
            model,
            prompt,
            history: Vec::new(),
            system: Some(catalog::system(JobId::ChatSummary).to_string()),
        };
        match provider.call(&exchange).await {
            Ok(outcome) => {
                if let Err(e) = store.set_summary(chat_id, &outcome.content) {
                    warn!(error = %e, "summary refresh: could not persist");
                } else {
                    debug!(chat_id, "chat summary refreshed");
                }
            }
            Err(e) => warn!(error = %e, "summary refresh: provider call failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ModelInfo, ProviderError};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted provider: pops one canned result per call.
    struct MockProvider {
        calls: AtomicU32,
        script: Mutex<VecDeque<std::result::Result<ChatOutcome, ProviderError>>>,
    }

    impl MockProvider {
        fn with_script(
            script: Vec<std::result::Result<ChatOutcome, ProviderError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn ok(content: &str) -> std::result::Result<ChatOutcome, ProviderError> {
            Ok(ChatOutcome {
                thinking: String::new(),
                content: content.to_string(),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn key(&self) -> &str {
            "mock"
        }
        fn display_name(&self) -> &str {
            "Mock"
        }
        fn is_configured(&self) -> bool {
            true
        }
        fn default_model(&self) -> &str {
            "mock-1"
        }
        fn fallback_models(&self) -> Vec<ModelInfo> {
            vec![ModelInfo::new("mock-1", "Mock One")]
        }
        async fn fetch_models(&self) -> std::result::Result<Vec<ModelInfo>, ProviderError> {
            Ok(self.fallback_models())
        }
        async fn call(
            &self,
            _req: &ChatExchange,
        ) -> std::result::Result<ChatOutcome, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| MockProvider::ok("default reply"))
        }
    }

    fn timeout_err() -> std::result::Result<ChatOutcome, ProviderError> {
        Err(ProviderError::Timeout { secs: 60 })
    }

    async fn retry_through(
        provider: &Arc<MockProvider>,
    ) -> std::result::Result<ChatOutcome, ProviderError> {
        let dyn_provider: Arc<dyn Provider> = Arc::clone(provider) as Arc<dyn Provider>;
        let exchange = ChatExchange::new("mock-1", "ping");
        AiService::call_with_retry(&dyn_provider, &exchange, 1).await
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_retries_exactly_once() {
        let provider = MockProvider::with_script(vec![timeout_err(), timeout_err()]);
        let err = retry_through(&provider).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_success_recovers() {
        let provider = MockProvider::with_script(vec![timeout_err(), MockProvider::ok("pong")]);
        let outcome = retry_through(&provider).await.unwrap();
        assert_eq!(outcome.content, "pong");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_is_not_retried() {
        let provider = MockProvider::with_script(vec![Err(ProviderError::Api {
            status: 400,
            message: "bad request".into(),
        })]);
        let err = retry_through(&provider).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn derive_title_clips_long_messages() {
        let msg = "A very long question about sharded key-value stores and consensus protocols";
        let title = derive_title(msg);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
        assert!(title.starts_with("A very long question"));

        assert_eq!(derive_title("short"), "short");
    }

    #[test]
    fn transcript_renders_role_labels_and_separators() {
        let chat = AiChat {
            id: 1,
            user_id: 1,
            title: "T".into(),
            summary: None,
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let messages = vec![
            AiMessage {
                id: 1,
                chat_id: 1,
                role: "user".into(),
                content: "hi".into(),
                created_at: String::new(),
            },
            AiMessage {
                id: 2,
                chat_id: 1,
                role: "assistant".into(),
                content: "hello".into(),
                created_at: String::new(),
            },
        ];
        let raw = render_transcript(&chat, &messages);
        assert!(raw.contains("**User:**\n\nhi"));
        assert!(raw.contains("\n\n---\n\n"));
        assert!(raw.contains("**Assistant:**\n\nhello"));
    }
}
