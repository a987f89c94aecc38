//! `cairn config` — Configuration management commands.

use super::{CliResult, load_config};
use cairn_config::AppConfig;
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Check the configuration and report problems
    Validate,
    /// Write a default config file if none exists
    Init,
}

pub async fn run(config_path: Option<&Path>, command: ConfigCommand) -> CliResult {
    let file = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_path);
    match command {
        ConfigCommand::Show => {
            let mut config = load_config(config_path)?;
            if config.api_key.is_some() {
                config.api_key = Some("***".into());
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommand::Path => println!("{}", file.display()),
        ConfigCommand::Validate => validate(config_path)?,
        ConfigCommand::Init => {
            if file.exists() {
                println!("Config already exists at {}", file.display());
            } else {
                if let Some(parent) = file.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&file, AppConfig::default_toml())?;
                println!("Wrote {}", file.display());
            }
        }
    }
    Ok(())
}

fn default_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

fn validate(config_path: Option<&Path>) -> CliResult {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Config error: {e}");
            return Err(e);
        }
    };

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("All checks passed");
    } else {
        for w in &warnings {
            println!("warning: {w}");
        }
    }
    println!();
    println!("  Provider:   {}", config.provider);
    println!("  Model:      {}", config.model);
    println!(
        "  Embedding:  {} ({} dims, precision {})",
        config.embedding.model, config.embedding.dimensions, config.embedding.precision
    );
    println!("  Documents:  {}", config.store_dir().display());
    Ok(())
}

/// Settings that load fine but will not work as intended.
pub fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    let needs_key = !matches!(config.provider.as_str(), "ollama" | "hashing");
    if needs_key && !config.has_api_key() {
        warnings.push("No API key set (set CAIRN_API_KEY or api_key in config.toml)");
    }
    if config.provider == "custom" && config.api_url.is_none() {
        warnings.push("Provider 'custom' needs api_url");
    }
    if config.provider == "hashing" {
        warnings.push("Provider 'hashing' only embeds; chat will not work");
    }
    if config.context.retrieval_threshold > 0.9 {
        warnings.push("context.retrieval_threshold above 0.9 rarely matches anything");
    }
    warnings
}
