//! Provider selection — builds the configured backend.

use std::sync::Arc;
use cairn_config::AppConfig;
use cairn_core::error::ProviderError;
use cairn_core::provider::Provider;
use crate::hashing::HashingProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider named by `config.provider`.
///
/// `api_url` overrides the base URL of any kind; `custom` requires it.
/// `hashing` is the offline embedder and cannot complete.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    if config.provider == "hashing" {
        return Ok(Arc::new(HashingProvider::new()));
    }

    let api_key = config.api_key.clone().unwrap_or_default();
    let needs_key = config.provider != "ollama";
    if needs_key && api_key.is_empty() {
        return Err(ProviderError::NotConfigured(format!(
            "no API key for provider '{}' (set CAIRN_API_KEY or api_key in config.toml)",
            config.provider
        )));
    }

    let provider = match (config.provider.as_str(), config.api_url.as_deref()) {
        ("ollama", url) => OpenAiCompatProvider::ollama(url),
        (name, Some(url)) => OpenAiCompatProvider::new(name, url, api_key),
        ("openai", None) => OpenAiCompatProvider::openai(api_key),
        ("openrouter", None) => OpenAiCompatProvider::openrouter(api_key),
        (other, None) => {
            return Err(ProviderError::NotConfigured(format!(
                "provider '{other}' needs api_url"
            )));
        }
    };

    tracing::debug!(provider = %config.provider, model = %config.model, "Provider built");
    Ok(Arc::new(provider))
}
