//! Provider registry — owns the configured backend set, resolves providers
//! by key, and serves model lists with caching and curated fallbacks.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use sentinel_core::config::ProvidersConfig;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiCompatProvider;
use crate::provider::{ModelInfo, Provider, ProviderError};

/// A well-known OpenAI-compatible endpoint.
struct KnownCompat {
    id: &'static str,
    name: &'static str,
    base_url: &'static str,
    default_model: &'static str,
    fallback: &'static [(&'static str, &'static str)],
}

const GROQ_FALLBACK: &[(&str, &str)] = &[
    ("llama-3.3-70b-versatile", "Llama 3.3 70B"),
    ("llama-3.1-8b-instant", "Llama 3.1 8B Instant"),
    ("deepseek-r1-distill-llama-70b", "DeepSeek R1 Distill 70B"),
];

const OPENAI_FALLBACK: &[(&str, &str)] = &[
    ("gpt-4o", "GPT-4o"),
    ("gpt-4o-mini", "GPT-4o mini"),
    ("o3-mini", "o3-mini"),
];

const NVIDIA_FALLBACK: &[(&str, &str)] = &[
    ("meta/llama-3.3-70b-instruct", "Llama 3.3 70B"),
    ("deepseek-ai/deepseek-r1", "DeepSeek R1"),
];

const KNOWN_COMPAT: &[KnownCompat] = &[KnownCompat {
    id: "nvidia",
    name: "NVIDIA NIM",
    base_url: "https://integrate.api.nvidia.com/v1",
    default_model: "meta/llama-3.3-70b-instruct",
    fallback: NVIDIA_FALLBACK,
}];

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSummary {
    pub key: String,
    pub name: String,
    pub configured: bool,
    pub default_model: String,
}

pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    /// Last successful model list per provider key.
    model_cache: DashMap<String, Vec<ModelInfo>>,
}

impl ProviderRegistry {
    /// Build the full backend set. Providers without credentials are still
    /// registered (so they show up as unconfigured) but refuse calls.
    pub fn from_config(cfg: &ProvidersConfig) -> Self {
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

        let key_of = |c: &Option<sentinel_core::config::ApiKeyConfig>| {
            c.as_ref().map(|c| c.api_key.clone()).unwrap_or_default()
        };
        let url_of = |c: &Option<sentinel_core::config::ApiKeyConfig>| {
            c.as_ref().and_then(|c| c.base_url.clone())
        };

        providers.push(Arc::new(OpenAiCompatProvider::new(
            "groq",
            "Groq",
            key_of(&cfg.groq),
            url_of(&cfg.groq).unwrap_or_else(|| "https://api.groq.com/openai/v1".to_string()),
            GROQ_FALLBACK[0].0,
            GROQ_FALLBACK,
        )));
        providers.push(Arc::new(GeminiProvider::new(
            key_of(&cfg.gemini),
            url_of(&cfg.gemini),
        )));
        providers.push(Arc::new(OpenAiCompatProvider::new(
            "openai",
            "OpenAI",
            key_of(&cfg.openai),
            url_of(&cfg.openai).unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            OPENAI_FALLBACK[0].0,
            OPENAI_FALLBACK,
        )));
        providers.push(Arc::new(AnthropicProvider::new(
            key_of(&cfg.anthropic),
            url_of(&cfg.anthropic),
        )));

        for entry in &cfg.openai_compat {
            let known = KNOWN_COMPAT.iter().find(|k| k.id == entry.id);
            let base_url = entry
                .base_url
                .clone()
                .or_else(|| known.map(|k| k.base_url.to_string()));
            let Some(base_url) = base_url else {
                warn!(id = %entry.id, "openai_compat entry has no base_url and is not a known provider, skipping");
                continue;
            };
            providers.push(Arc::new(OpenAiCompatProvider::new(
                entry.id.clone(),
                known.map(|k| k.name.to_string()).unwrap_or_else(|| entry.id.clone()),
                entry.api_key.clone(),
                base_url,
                known.map(|k| k.default_model).unwrap_or(""),
                known.map(|k| k.fallback).unwrap_or(&[]),
            )));
        }

        Self {
            providers,
            model_cache: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.key() == key).cloned()
    }

    /// First configured provider, in registration order.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.is_configured()).cloned()
    }

    pub fn any_configured(&self) -> bool {
        self.providers.iter().any(|p| p.is_configured())
    }

    pub fn list(&self) -> Vec<ProviderSummary> {
        self.providers
            .iter()
            .map(|p| ProviderSummary {
                key: p.key().to_string(),
                name: p.display_name().to_string(),
                configured: p.is_configured(),
                default_model: p.default_model().to_string(),
            })
            .collect()
    }

    /// Model discovery with fallback: a successful upstream call refreshes
    /// the cache; on failure the last successful list is served, and with no
    /// cache the provider's curated fallback.
    pub async fn models(&self, key: &str) -> Result<Vec<ModelInfo>, ProviderError> {
        let provider = self
            .get(key)
            .ok_or_else(|| ProviderError::Config(format!("unknown provider '{key}'")))?;

        match provider.fetch_models().await {
            Ok(models) if !models.is_empty() => {
                self.model_cache.insert(key.to_string(), models.clone());
                Ok(models)
            }
            Ok(_) => Ok(provider.fallback_models()),
            Err(e) => {
                debug!(provider = key, error = %e, "model listing failed, using cache/fallback");
                if let Some(cached) = self.model_cache.get(key) {
                    return Ok(cached.clone());
                }
                Ok(provider.fallback_models())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::config::{ApiKeyConfig, OpenAiCompatEntry};

    fn config_with_groq() -> ProvidersConfig {
        ProvidersConfig {
            groq: Some(ApiKeyConfig {
                api_key: "gsk-test".to_string(),
                // unroutable port so fetch_models fails fast in tests
                base_url: Some("http://127.0.0.1:9".to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn registers_all_primary_backends() {
        let registry = ProviderRegistry::from_config(&ProvidersConfig::default());
        for key in ["groq", "gemini", "openai", "anthropic"] {
            assert!(registry.get(key).is_some(), "missing provider {key}");
        }
        assert!(!registry.any_configured());
        assert!(registry.default_provider().is_none());
    }

    #[test]
    fn configured_flag_follows_api_keys() {
        let registry = ProviderRegistry::from_config(&config_with_groq());
        assert!(registry.any_configured());
        assert_eq!(registry.default_provider().unwrap().key(), "groq");
        let summary = registry.list();
        let groq = summary.iter().find(|p| p.key == "groq").unwrap();
        assert!(groq.configured);
        let openai = summary.iter().find(|p| p.key == "openai").unwrap();
        assert!(!openai.configured);
    }

    #[test]
    fn known_compat_entry_fills_base_url() {
        let cfg = ProvidersConfig {
            openai_compat: vec![OpenAiCompatEntry {
                id: "nvidia".to_string(),
                api_key: "nvapi-test".to_string(),
                base_url: None,
            }],
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&cfg);
        let nvidia = registry.get("nvidia").unwrap();
        assert!(nvidia.is_configured());
        assert_eq!(nvidia.default_model(), "meta/llama-3.3-70b-instruct");
    }

    #[test]
    fn unknown_compat_entry_without_url_is_skipped() {
        let cfg = ProvidersConfig {
            openai_compat: vec![OpenAiCompatEntry {
                id: "mystery".to_string(),
                api_key: "k".to_string(),
                base_url: None,
            }],
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&cfg);
        assert!(registry.get("mystery").is_none());
    }

    #[tokio::test]
    async fn model_listing_falls_back_on_upstream_failure() {
        let registry = ProviderRegistry::from_config(&config_with_groq());
        let models = registry.models("groq").await.unwrap();
        let fallback = registry.get("groq").unwrap().fallback_models();
        assert_eq!(
            models.iter().map(|m| &m.id).collect::<Vec<_>>(),
            fallback.iter().map(|m| &m.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn unconfigured_provider_lists_fallback() {
        let registry = ProviderRegistry::from_config(&ProvidersConfig::default());
        // no API key → fetch_models errors with Config → fallback list
        let models = registry.models("anthropic").await.unwrap();
        assert!(!models.is_empty());
    }
}
