//! # hwbot
//!
//! Polls the homework review API and relays status changes to Telegram.
//!
//! Usage:
//!   hwbot                           # poll forever, secrets from .env / environment
//!   hwbot --config hwbot.toml       # with a TOML config file
//!   hwbot --once                    # run a single cycle and exit
//!   hwbot -v                        # debug logging

use anyhow::Result;
use clap::Parser;
use hwbot_channels::TelegramChannel;
use hwbot_core::HwBotConfig;
use hwbot_scheduler::PollLoop;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hwbot",
    version,
    about = "📚 Homework review status bot"
)]
struct Cli {
    /// Optional TOML config file (environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dotenv file with PRACTICUM_TOKEN, TELEGRAM_TOKEN, TELEGRAM_CHAT_ID
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "hwbot=debug,hwbot_core=debug,hwbot_practicum=debug,hwbot_channels=debug,hwbot_scheduler=debug"
    } else {
        "hwbot=info,hwbot_core=info,hwbot_practicum=info,hwbot_channels=info,hwbot_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // A missing .env is fine: the variables may already be in the environment.
    if let Err(e) = dotenvy::from_path(&cli.env_file) {
        if !e.not_found() {
            tracing::warn!("⚠️ Could not load {}: {e}", cli.env_file.display());
        }
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ {e}");
            return Err(e.into());
        }
    };

    let source = hwbot_practicum::create_source(&config)?;
    let telegram = TelegramChannel::new(&config.telegram)?;
    match telegram.get_me().await {
        Ok(me) => tracing::info!(
            "🤖 Telegram bot: @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.first_name
        ),
        Err(e) => tracing::warn!("⚠️ Could not reach Telegram yet: {e}"),
    }

    let mut poll_loop = PollLoop::new(&config, source, Box::new(telegram));

    if cli.once {
        poll_loop.run_cycles(1).await?;
        return Ok(());
    }

    if config.telegram.commands_enabled {
        poll_loop = poll_loop.with_commands(Box::new(TelegramChannel::new(&config.telegram)?));
    }

    tokio::select! {
        result = poll_loop.run() => result?,
        _ = shutdown_signal() => tracing::info!("👋 Shutting down"),
    }
    Ok(())
}

fn load_config(cli: &Cli) -> hwbot_core::Result<HwBotConfig> {
    let config = HwBotConfig::load(cli.config.as_deref())?;
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("⚠️ Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("⚠️ SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
