//! omni-send - Background daemon for scheduled posting
//!
//! Runs the scheduler loop: scans the queue on a fixed interval and
//! publishes posts as they come due.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use libomnicast::logging::{self, LogFormat};
use libomnicast::scheduler::Scheduler;
use libomnicast::store::PostStore;
use libomnicast::{Config, OmnicastError, PlatformRegistry, Result};
use tokio::time::{sleep, Duration};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "omni-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
omni-send - Background daemon for scheduled posting

DESCRIPTION:
    omni-send is a long-running daemon that watches the Omnicast queue and
    publishes scheduled posts when they come due. Each due post is fanned
    out to its target accounts concurrently; accounts whose platform cannot
    carry the post's media are skipped before any network call.

USAGE:
    # Run in foreground (logs to stderr)
    omni-send

    # Run with a custom poll interval
    omni-send --poll-interval 10

    # Process due posts once and exit
    omni-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the in-flight scan)

CONFIGURATION:
    Configuration file: ~/.config/omnicast/config.toml
    Database location:  ~/.local/share/omnicast/posts.db

    [scheduler]
    poll_interval = 30     # seconds between scans
    dispatch_timeout = 120 # per-account publish timeout
    max_retries = 0        # extra attempts on transient failures
    retry_delay = 1        # base backoff in seconds

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Log output format (text, json, or pretty)
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init(cli.log_format, "info", cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(interval) = cli.poll_interval {
        config.scheduler.poll_interval = interval;
    }

    let store = PostStore::new(&config.database.path).await?;
    let registry = PlatformRegistry::from_config(&config)?;
    if registry.is_empty() {
        return Err(OmnicastError::Config(
            libomnicast::error::ConfigError::MissingField(
                "no platform is enabled in the configuration".to_string(),
            ),
        ));
    }

    info!(
        platforms = ?registry.platforms(),
        poll_interval = config.scheduler.poll_interval,
        "omni-send starting"
    );

    let mut scheduler = Scheduler::new(store, registry, &config.scheduler);

    if cli.once {
        let reports = scheduler.tick().await?;
        info!(dispatched = reports.len(), "Processed due posts once, exiting");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let handle = scheduler.start();

    while !shutdown.load(Ordering::Relaxed) {
        sleep(Duration::from_millis(250)).await;
    }

    handle.shutdown().await;
    info!("omni-send stopped");
    Ok(())
}

/// SIGTERM and SIGINT flip the shutdown flag
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| OmnicastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            if matches!(sig, SIGTERM | SIGINT) {
                info!("Received shutdown signal, stopping gracefully");
                shutdown.store(true, Ordering::Relaxed);
                break;
            }
        }
    });

    Ok(())
}
