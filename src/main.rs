//! claude-notifier hook entrypoint
//!
//! Reads a Claude Code hook payload from stdin, evaluates it against the
//! configured events and prints what fired as JSON on stdout.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use claude_notifier::channels::LogChannel;
use claude_notifier::{ConfigLoader, HookContext, Notifier};

/// Environment variable carrying the hook event name
const HOOK_EVENT_ENV: &str = "CLAUDE_HOOK_EVENT";
/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "CLAUDE_NOTIFIER_LOG";

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "claude-notifier",
    about = "Routes Claude Code hook events to notification channels",
    version
)]
struct Cli {
    /// Configuration file (defaults to ~/.claude-notifier/config.yaml)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Hook event name (PreToolUse, PostToolUse, Stop, Notification, ...).
    /// Falls back to CLAUDE_HOOK_EVENT, then to the payload's hook_event_name.
    #[clap(long)]
    event: Option<String>,

    /// Evaluate and print triggered events without dispatching them
    #[clap(long)]
    dry_run: bool,

    /// Log level, overridden by CLAUDE_NOTIFIER_LOG
    #[clap(long, default_value = "warn")]
    log_level: LogLevel,
}

fn initialize_tracing(log_level: &LogLevel) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    // stdout is reserved for hook output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);

    let config = match &cli.config {
        Some(path) => ConfigLoader::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load default config")?,
    };

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read hook payload from stdin")?;
    let payload: serde_json::Value = if buffer.trim().is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(&buffer).context("Failed to parse hook payload")?
    };

    let event_name = cli
        .event
        .clone()
        .or_else(|| std::env::var(HOOK_EVENT_ENV).ok());
    let ctx = HookContext::from_hook_payload(event_name.as_deref(), payload);
    debug!("Hook context: {:?}", ctx.fields());

    let mut notifier = Notifier::from_config(&config)?;

    let output = if cli.dry_run {
        serde_json::to_value(notifier.manager().process_context(&ctx))?
    } else {
        for name in config.enabled_channels() {
            notifier.channels_mut().register(LogChannel::new(name));
        }
        serde_json::to_value(notifier.handle(&ctx))?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
