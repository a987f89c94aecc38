//! Subcommand implementations and the setup they share.

pub mod chat;
pub mod config_cmd;
pub mod doc;
pub mod search;

use cairn_config::AppConfig;
use cairn_core::provider::Provider;
use cairn_store::DocumentStore;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Load the config from `path`, or the default location, with env overrides.
pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env();
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

/// Build the configured provider and a store embedding through it.
pub fn open_store(config: &AppConfig) -> CliResult<(Arc<dyn Provider>, DocumentStore)> {
    let provider = cairn_providers::build_from_config(config)?;
    let store = DocumentStore::from_config(config, Arc::clone(&provider))?;
    tracing::debug!(provider = provider.name(), loaded = store.loaded_count(), "CLI store ready");
    Ok((provider, store))
}

/// Parse a command-line value as JSON, falling back to a plain string.
pub fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_parse_as_json_first() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value(r#"{"a": [1]}"#), json!({"a": [1]}));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("Rouen"), json!("Rouen"));
        assert_eq!(parse_value("[unclosed"), json!("[unclosed"));
    }

    #[test]
    fn explicit_config_path_is_used() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = \"hashing\"\nmodel = \"m\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.model, "m");
    }
}
