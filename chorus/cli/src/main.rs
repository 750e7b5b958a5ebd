//! Chorus - multi-model chat in the terminal
//!
//! Sends each prompt to up to three models at once and prints their streamed
//! reasoning and answers side by side.
//!
//! # Usage
//!
//! ```bash
//! # Use the configured default models
//! CHORUS_API_KEY=sk-... chorus
//!
//! # Compare two models
//! chorus -m gpt-4o -m deepseek-r1
//!
//! # Custom config file
//! chorus --config /path/to/config.toml
//! ```

mod commands;
mod repl;
mod view;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chorus_core::{default_config_path, ChatClient, ClientConfig, ConfigOverrides, ModelId};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::repl::Repl;

/// Chorus - ask several models at once
#[derive(Parser, Debug)]
#[command(name = "chorus")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "CHORUS_CONFIG")]
    config: Option<PathBuf>,

    /// Model to send prompts to (repeat for up to three)
    #[arg(short = 'm', long = "model", value_name = "ID")]
    models: Vec<String>,

    /// Chat completions endpoint URL
    #[arg(long)]
    api_url: Option<String>,

    /// System prompt prepended to every request
    #[arg(long)]
    system_prompt: Option<String>,

    /// Number of turns kept as context
    #[arg(long)]
    history_limit: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CHORUS_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.api_url {
            overrides = overrides.with_api_url(url.clone());
        }
        if !self.models.is_empty() {
            overrides =
                overrides.with_models(self.models.iter().map(|m| ModelId::from(m.as_str())).collect());
        }
        if let Some(limit) = self.history_limit {
            overrides = overrides.with_history_limit(limit);
        }
        if let Some(ref prompt) = self.system_prompt {
            overrides = overrides.with_system_prompt(prompt.clone());
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config =
        ClientConfig::load_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);

    tracing::info!(
        source = %config.source(),
        api_url = %config.api_url,
        "Starting chorus"
    );

    let client = ChatClient::new(config).context("Failed to start chat client")?;

    Repl::new(client).run().await
}

/// Initialize logging
///
/// Logs go to stderr so they never mix with streamed answers.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chorus={level},chorus_core={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_overrides() {
        let args = Args::try_parse_from([
            "chorus",
            "-m",
            "gpt-4o",
            "--model",
            "deepseek-r1",
            "--history-limit",
            "8",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(
            overrides.models,
            Some(vec![ModelId::from("gpt-4o"), ModelId::from("deepseek-r1")])
        );
        assert_eq!(overrides.history_limit, Some(8));
        assert!(overrides.api_url.is_none());
    }

    #[test]
    fn test_no_models_keeps_config_defaults() {
        let args = Args::try_parse_from(["chorus"]).unwrap();
        assert!(args.overrides().models.is_none());
    }
}
