use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use lunchbot_core::config::{Config, WarnLevel};

#[derive(Parser)]
#[command(
    name = "lunchbot",
    about = "Lunch ordering bot for organizations with their own lunch deadlines",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot until SIGINT or SIGTERM
    Run {
        /// Path to the YAML configuration
        #[arg(long, default_value = "lunchbot.yaml")]
        config: PathBuf,

        /// Bot token; overrides telegram.token from the configuration
        #[arg(long, env = "LUNCHBOT_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Validate the configuration for common mistakes
    CheckConfig {
        /// Path to the YAML configuration
        #[arg(long, default_value = "lunchbot.yaml")]
        config: PathBuf,

        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
}

fn load(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn run(config: &Path, token: Option<String>) -> anyhow::Result<()> {
    let mut cfg = load(config)?;
    if let Some(token) = token {
        cfg.telegram.token = token;
    }
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(lunchbot::runtime::run(cfg))
}

fn check_config(config: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = load(config)?;
    let warnings = cfg.validate();

    if json {
        let value = serde_json::json!({ "warnings": warnings });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("{errors} configuration error(s)");
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        Commands::CheckConfig { .. } => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run { config, token } => run(&config, token),
        Commands::CheckConfig { config, json } => check_config(&config, json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
