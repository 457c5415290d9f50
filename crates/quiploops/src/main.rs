mod config;
mod interactive;
mod models;
mod render;
mod sessions;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use quiploops_agent::{BackendResolver, ProviderRegistry};
use quiploops_core::{RefinementSession, SessionConfig};
use quiploops_logging::{init_tracing, LogFormat, Logger, SessionWriter};

use crate::config::{Overrides, ProjectConfig, RoleConfig};
use crate::sessions::SessionsAction;

#[derive(Parser, Debug)]
#[command(
    name = "quiploops",
    about = "Write a joke, have it critiqued, and refine it",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// What the joke is about (asked for if omitted)
    #[arg(short, long)]
    topic: Option<String>,

    /// Provider for both roles
    #[arg(short, long)]
    provider: Option<String>,

    /// Model for both roles
    #[arg(short, long)]
    model: Option<String>,

    /// Provider for the generator only
    #[arg(long)]
    generator_provider: Option<String>,

    /// Model for the generator only
    #[arg(long)]
    generator_model: Option<String>,

    /// Provider for the evaluator only
    #[arg(long)]
    evaluator_provider: Option<String>,

    /// Model for the evaluator only
    #[arg(long)]
    evaluator_model: Option<String>,

    #[arg(long)]
    generator_temperature: Option<f32>,

    #[arg(long)]
    evaluator_temperature: Option<f32>,

    /// Per-call time limit in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Working directory holding quiploops.toml (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Tracing level filter (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Write tracing output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not record a session transcript
    #[arg(long)]
    no_transcript: bool,

    /// Dry run: show the resolved configuration without calling any model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Browse recorded sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// List known models and which providers have API keys
    Models {
        /// Only this provider
        #[arg(long)]
        provider: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            generator: RoleConfig {
                provider: self.generator_provider.clone(),
                model: self.generator_model.clone(),
                temperature: self.generator_temperature,
                max_tokens: None,
            },
            evaluator: RoleConfig {
                provider: self.evaluator_provider.clone(),
                model: self.evaluator_model.clone(),
                temperature: self.evaluator_temperature,
                max_tokens: None,
            },
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    let _guard = init_tracing(&cli.log_level, log_format, cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    match cli.command.take() {
        Some(Commands::Sessions { action }) => {
            return sessions::handle_sessions_command(action).await
        }
        Some(Commands::Models { provider, json }) => {
            return models::handle_models_command(provider, json)
        }
        None => {}
    }

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let project = ProjectConfig::load(&working_dir)?;
    let session_config = config::resolve(project.as_ref(), &cli.overrides())?;
    session_config.validate()?;

    if cli.dry_run {
        eprintln!("=== Dry Run ===");
        if let Some(ref topic) = cli.topic {
            eprintln!("Topic: {}", render::truncate(topic, 100));
        }
        eprintln!("Working dir: {}", working_dir.display());
        render::print_config(&session_config);
        return Ok(());
    }

    let registry: Arc<ProviderRegistry> = Arc::new(ProviderRegistry::new());
    check_credentials(registry.as_ref(), &session_config).await?;

    let topic = interactive::read_topic(cli.topic.clone())?;

    let logger = Arc::new(Logger::new(log_format));
    let mut session = RefinementSession::new(registry, logger);
    if !cli.no_transcript {
        match SessionWriter::new(&topic) {
            Ok(writer) => session = session.with_transcript(writer),
            Err(e) => tracing::warn!(error = %e, "Session transcript disabled"),
        }
    }

    interactive::run(&mut session, &topic, session_config).await
}

/// Fail early when a configured provider has no usable API key
async fn check_credentials(resolver: &dyn BackendResolver, config: &SessionConfig) -> Result<()> {
    let providers: BTreeSet<_> = [config.generator.provider, config.evaluator.provider]
        .into_iter()
        .collect();

    for provider in providers {
        let backend = resolver.resolve(provider)?;
        if !backend.is_available().await {
            anyhow::bail!(
                "No API key for {}. Set {} (see `quiploops models`).",
                provider.display_name(),
                provider.api_key_env().bright_cyan()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "quiploops",
            "--provider",
            "openai",
            "--evaluator-model",
            "gpt-4o",
            "--generator-temperature",
            "1.1",
            "--timeout-secs",
            "10",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.provider.as_deref(), Some("openai"));
        assert_eq!(overrides.evaluator.model.as_deref(), Some("gpt-4o"));
        assert_eq!(overrides.generator.temperature, Some(1.1));
        assert_eq!(overrides.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_sessions_subcommand_parses() {
        let cli = Cli::parse_from(["quiploops", "sessions", "list", "--status", "active"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Sessions {
                action: SessionsAction::List { .. }
            })
        ));
    }
}
