//! Scriptbot Daemon -- private script distribution bot.
//!
//! Usage:
//!
//!   scriptbot-daemon [OPTIONS]
//!
//! Options:
//!
//!   --data-dir <PATH>        Data directory (default: platform-specific)
//!   --bot-handle <NAME>      Bot handle used in deep links
//!   --default-owner <ID>     Owner provisioned on first run
//!   --rate-limit <N>         Requests per window (default: 5)
//!   --rate-window <SECS>     Window length (default: 10)
//!   --code-length <N>        Script code length (default: 8)
//!   --config <PATH>          Load config from JSON file
//!
//! Environment:
//!
//!   RUST_LOG                 Log level filter (default: info)
//!
//! Events are read from stdin. The daemon runs until stdin closes,
//! `quit` is entered or it is interrupted with Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use scriptbot_core::access::AccessControl;
use scriptbot_core::dispatcher::Dispatcher;
use scriptbot_core::rate_limiter::RateLimiter;
use scriptbot_storage::authority::AuthorityRecord;
use scriptbot_storage::codes::RandomCodes;
use scriptbot_storage::scripts::{ScriptBook, ScriptStore};
use scriptbot_storage::snapshot::JsonFile;
use scriptbot_types::{Result, ScriptbotError};
use tokio::sync::watch;

mod config;
mod console;
mod event_loop;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    // Tracing / logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    print_banner();

    let cli = config::CliArgs::parse();

    // Load or merge config file if provided.
    let daemon_config = match &cli.config_path {
        Some(path) => match config::DaemonConfig::load(path) {
            Ok(cfg) => cfg.merge_cli(&cli),
            Err(e) => {
                tracing::error!("failed to load config file: {e}");
                std::process::exit(1);
            }
        },
        None => config::DaemonConfig::from_cli(&cli),
    };

    if let Err(e) = daemon_config.validate() {
        tracing::error!("{e}");
        std::process::exit(1);
    }

    if let Err(e) = run_daemon(daemon_config).await {
        tracing::error!("daemon error: {e}");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Daemon main logic
// ---------------------------------------------------------------------------

async fn run_daemon(cfg: config::DaemonConfig) -> Result<()> {
    std::fs::create_dir_all(&cfg.data_dir).map_err(|e| ScriptbotError::PersistenceFailure {
        reason: format!("failed to create data directory: {e}"),
    })?;
    tracing::info!(data_dir = %cfg.data_dir.display(), "data directory ready");

    // -----------------------------------------------------------------------
    // 1. Services
    // -----------------------------------------------------------------------

    let access = Arc::new(AccessControl::load(
        Box::new(JsonFile::<AuthorityRecord>::new(cfg.authority_path())),
        cfg.app.default_owner,
    ));
    let owner = access.owner()?;

    let scripts = Arc::new(ScriptStore::open(
        Box::new(JsonFile::<ScriptBook>::new(cfg.scripts_path())),
        Box::new(RandomCodes::new(cfg.app.code_length)),
        cfg.app.code_attempts,
    ));

    let limiter = RateLimiter::new(
        cfg.app.rate_limit,
        Duration::from_secs(cfg.app.rate_window_secs),
        owner,
    );

    let dispatcher = Dispatcher::new(
        Arc::clone(&access),
        Arc::clone(&scripts),
        limiter,
        cfg.bot_handle.clone(),
    );

    // -----------------------------------------------------------------------
    // 2. Event loop
    // -----------------------------------------------------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (bot, loop_task) = event_loop::spawn(dispatcher, shutdown_rx);

    // -----------------------------------------------------------------------
    // 3. Status summary
    // -----------------------------------------------------------------------

    println!();
    println!("============================================================");
    println!("  Scriptbot running");
    println!("============================================================");
    println!("  Bot handle:   @{}", cfg.bot_handle.trim_start_matches('@'));
    println!("  Owner:        {owner}");
    println!("  Admins:       {}", access.admins()?.len());
    println!("  Scripts:      {}", scripts.len()?);
    println!(
        "  Rate limit:   {} per {}s",
        cfg.app.rate_limit, cfg.app.rate_window_secs
    );
    println!("  Data dir:     {}", cfg.data_dir.display());
    println!("============================================================");
    println!("  Press Ctrl+C to stop");
    println!("============================================================");
    println!();

    // -----------------------------------------------------------------------
    // 4. Console transport until EOF / quit / Ctrl+C
    // -----------------------------------------------------------------------

    console::run(bot).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = loop_task.await {
        tracing::error!(%e, "event loop panicked");
    }

    tracing::info!("daemon stopped");
    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ___         _      _   _         _
 / __| __ _ _(_)_ __| |_| |__  ___| |_
 \__ \/ _| '_| | '_ \  _| '_ \/ _ \  _|
 |___/\__|_| |_| .__/\__|_.__/\___/\__|
               |_|          daemon v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
