use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{
    snippet, with_deadline, ChatExchange, ChatOutcome, ModelInfo, Provider, ProviderError, Role,
};

const TIMEOUT_SECS: u64 = 90;

const FALLBACK_MODELS: &[(&str, &str)] = &[
    ("gemini-2.0-flash", "Gemini 2.0 Flash"),
    ("gemini-2.0-flash-lite", "Gemini 2.0 Flash Lite"),
    ("gemini-1.5-pro", "Gemini 1.5 Pro"),
];

/// Google AI (Gemini) over the native `generateContent` API. The assistant
/// role is renamed to `model` on the wire.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
        }
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Config("Gemini API key is missing".into()));
        }
        Ok(&self.api_key)
    }

    fn build_body(&self, req: &ChatExchange) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = req
            .history
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": m.content }],
                })
            })
            .collect();
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{ "text": req.prompt }],
        }));

        let mut body = serde_json::json!({ "contents": contents });
        if let Some(system) = &req.system {
            body["system_instruction"] = serde_json::json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn key(&self) -> &str {
        "gemini"
    }

    fn display_name(&self) -> &str {
        "Google Gemini"
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
        let url = format!("{}/v1beta/models?key={}", self.base_url, api_key);

        with_deadline(30, async {
            let resp = self.client.get(&url).send().await?;
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
                .models
                .into_iter()
                .map(|m| {
                    // API names come back as "models/gemini-…"
                    let id = m
                        .name
                        .strip_prefix("models/")
                        .unwrap_or(&m.name)
                        .to_string();
                    let name = m.display_name.unwrap_or_else(|| id.clone());
                    ModelInfo::new(id, name)
                })
                .collect())
        })
        .await
    }

    async fn call(&self, req: &ChatExchange) -> Result<ChatOutcome, ProviderError> {
        let api_key = self.require_key()?.to_string();
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, req.model, api_key
        );
        debug!(model = %req.model, "sending request to Gemini");

        with_deadline(TIMEOUT_SECS, async {
            let resp = self
                .client
                .post(&url)
                .header("content-type", "application/json")
                .json(&self.build_body(req))
                .send()
                .await?;

            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                let text = resp.text().await.unwrap_or_default();
                warn!(status, body = %text, "Gemini API error");
                return Err(ProviderError::Api {
                    status,
                    message: snippet(&text),
                });
            }

            let api_resp: ApiResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::Parse(e.to_string()))?;

            let content = api_resp
                .candidates
                .into_iter()
                .next()
                .map(|c| {
                    c.content
                        .parts
                        .into_iter()
                        .filter_map(|p| p.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .ok_or_else(|| ProviderError::Parse("response has no candidates".into()))?;

            Ok(ChatOutcome {
                thinking: String::new(),
                content,
            })
        })
        .await
    }
}

// Gemini API response types (private — only used for deserialization)

#[derive(Deserialize)]
struct ApiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ModelListing {
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}
