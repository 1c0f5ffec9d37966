use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::provider::{
    snippet, with_deadline, ChatExchange, ChatOutcome, ModelInfo, Provider, ProviderError,
    StreamEvent,
};
use crate::thinking::split_thinking;

const TIMEOUT_SECS: u64 = 90;

/// OpenAI and every OpenAI-compatible backend (Groq, NVIDIA NIM, custom
/// endpoints). The base URL includes the version segment, so the chat path
/// is always `/chat/completions`.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    key: String,
    display_name: String,
    api_key: String,
    base_url: String,
    default_model: String,
    fallback: &'static [(&'static str, &'static str)],
}

impl OpenAiCompatProvider {
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        api_key: String,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        fallback: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            key: key.into(),
            display_name: display_name.into(),
            api_key,
            base_url: base_url.into(),
            default_model: default_model.into(),
            fallback,
        }
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Config(format!(
                "{} API key is missing",
                self.display_name
            )));
        }
        Ok(&self.api_key)
    }

    fn build_body(&self, req: &ChatExchange, stream: bool) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = Vec::new();
        if let Some(system) = &req.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        for m in &req.history {
            messages.push(serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": req.prompt }));

        serde_json::json!({
            "model": req.model,
            "messages": messages,
            "stream": stream,
        })
    }

    async fn post_chat(
        &self,
        req: &ChatExchange,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let api_key = self.require_key()?.to_string();
        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = %self.key, model = %req.model, "sending chat request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&self.build_body(req, stream))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(provider = %self.key, status, body = %text, "chat API error");
            return Err(ProviderError::Api {
                status,
                message: snippet(&text),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn key(&self) -> &str {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn fallback_models(&self) -> Vec<ModelInfo> {
        self.fallback
            .iter()
            .map(|(id, name)| ModelInfo::new(*id, *name))
            .collect()
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let api_key = self.require_key()?.to_string();
        let url = format!("{}/models", self.base_url);

        with_deadline(30, async {
            let resp = self.client.get(&url).bearer_auth(api_key).send().await?;
            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(ProviderError::Api {
                    status,
                    message: snippet(&text),
                });
            }
            let listing: ModelListing = resp
                .json()
                .await
                .map_err(|e| ProviderError::Parse(e.to_string()))?;
            Ok(listing
                .data
                .into_iter()
                .map(|m| ModelInfo::new(m.id.clone(), m.id))
                .collect())
        })
        .await
    }

    async fn call(&self, req: &ChatExchange) -> Result<ChatOutcome, ProviderError> {
        with_deadline(TIMEOUT_SECS, async {
            let resp = self.post_chat(req, false).await?;
            let api_resp: ApiResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::Parse(e.to_string()))?;

            let choice = api_resp
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::Parse("response has no choices".into()))?;

            // Reasoning models surface chain-of-thought either as a separate
            // field or inline as <think> spans.
            let raw = choice.message.content.unwrap_or_default();
            let (inline_thinking, content) = split_thinking(&raw);
            let thinking = choice
                .message
                .reasoning_content
                .filter(|r| !r.is_empty())
                .unwrap_or(inline_thinking);

            Ok(ChatOutcome { thinking, content })
        })
        .await
    }

    async fn call_stream(
        &self,
        req: &ChatExchange,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        with_deadline(TIMEOUT_SECS, async {
            let resp = self.post_chat(req, true).await?;
            process_sse_stream(resp, tx).await;
            Ok(())
        })
        .await
    }
}

/// Parse an OpenAI-style SSE body and emit one [`StreamEvent::Token`] per
/// content delta. `data: [DONE]` terminates the stream.
async fn process_sse_stream(resp: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    use futures_util::StreamExt;

    let mut content = String::new();
    let mut line_buf = String::new();
    let mut byte_stream = resp.bytes_stream();

    'outer: while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };
        let Ok(text) = std::str::from_utf8(&chunk) else {
            continue;
        };

        line_buf.push_str(text);
        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, remainder) = lines.split_at(lines.len() - 1);
        let remainder = remainder.first().unwrap_or(&"").to_string();

        for line in complete {
            let line = line.trim();
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data.trim() == "[DONE]" {
                break 'outer;
            }
            let Ok(chunk_resp) = serde_json::from_str::<StreamChunk>(data) else {
                continue;
            };
            for choice in &chunk_resp.choices {
                if let Some(delta) = &choice.delta.content {
                    if !delta.is_empty() {
                        content.push_str(delta);
                        if tx
                            .send(StreamEvent::Token {
                                text: delta.clone(),
                            })
                            .await
                            .is_err()
                        {
                            return; // receiver dropped
                        }
                    }
                }
            }
        }

        line_buf = remainder;
    }

    let _ = tx.send(StreamEvent::Done { content }).await;
}

// OpenAI API response types (private — only used for deserialization)

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
    /// DeepSeek-style separated reasoning field.
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct ModelListing {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
