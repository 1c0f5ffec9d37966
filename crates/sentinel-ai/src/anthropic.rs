use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{
    snippet, with_deadline, ChatExchange, ChatOutcome, ModelInfo, Provider, ProviderError,
};

const API_VERSION: &str = "2023-06-01";
const TIMEOUT_SECS: u64 = 120;
const MAX_TOKENS: u32 = 4096;

const FALLBACK_MODELS: &[(&str, &str)] = &[
    ("claude-sonnet-4-20250514", "Claude Sonnet 4"),
    ("claude-3-7-sonnet-20250219", "Claude 3.7 Sonnet"),
    ("claude-3-5-haiku-20241022", "Claude 3.5 Haiku"),
];

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Config("Anthropic API key is missing".into()));
        }
        Ok(&self.api_key)
    }

    fn build_body(&self, req: &ChatExchange) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = req
            .history
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();
        messages.push(serde_json::json!({ "role": "user", "content": req.prompt }));

        let mut body = serde_json::json!({
            "model": req.model,
            "max_tokens": MAX_TOKENS,
            "messages": messages,
        });
        if let Some(system) = &req.system {
            body["system"] = serde_json::json!(system);
        }
        body
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn key(&self) -> &str {
        "anthropic"
    }

    fn display_name(&self) -> &str {
        "Anthropic"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn default_model(&self) -> &str {
        FALLBACK_MODELS[0].0
    }

    fn fallback_models(&self) -> Vec<ModelInfo> {
        FALLBACK_MODELS
            .iter()
            .map(|(id, name)| ModelInfo::new(*id, *name))
            .collect()
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let api_key = self.require_key()?.to_string();
        let url = format!("{}/v1/models", self.base_url);

        with_deadline(30, async {
            let resp = self
                .client
                .get(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", API_VERSION)
                .send()
                .await?;
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
                .map(|m| {
                    let name = m.display_name.unwrap_or_else(|| m.id.clone());
                    ModelInfo::new(m.id, name)
                })
                .collect())
        })
        .await
    }

    async fn call(&self, req: &ChatExchange) -> Result<ChatOutcome, ProviderError> {
        let api_key = self.require_key()?.to_string();
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %req.model, "sending request to Anthropic");

        with_deadline(TIMEOUT_SECS, async {
            let resp = self
                .client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .json(&self.build_body(req))
                .send()
                .await?;

            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                let text = resp.text().await.unwrap_or_default();
                warn!(status, body = %text, "Anthropic API error");
                return Err(ProviderError::Api {
                    status,
                    message: snippet(&text),
                });
            }

            let api_resp: ApiResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::Parse(e.to_string()))?;

            let mut thinking_parts: Vec<String> = Vec::new();
            let mut text_parts: Vec<String> = Vec::new();
            for block in api_resp.content {
                match block {
                    ContentBlock::Text { text } => text_parts.push(text),
                    ContentBlock::Thinking { thinking } => thinking_parts.push(thinking),
                    ContentBlock::Unknown => {}
                }
            }

            Ok(ChatOutcome {
                thinking: thinking_parts.join("\n"),
                content: text_parts.join(""),
            })
        })
        .await
    }
}

// Anthropic API response types (private — only used for deserialization)

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thinking")]
    Thinking { thinking: String },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct ModelListing {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    display_name: Option<String>,
}
