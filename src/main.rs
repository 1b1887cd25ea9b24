//! Service Health Watchdog Binary

use clap::Parser;
use std::path::PathBuf;
use svc_watchdog::notify::build_notifiers;
use svc_watchdog::{Config, Result, Runner, StopHandle, WatchdogError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "svc-watchdog", version, about = "Health-check daemon with alerting")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "WATCHDOG_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Log probe and connection details
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    initialize_tracing(args.verbose);

    info!("Starting svc-watchdog v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args).await {
        error!("Watchdog failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    // Load configuration
    let mut config = Config::from_file(&args.config)?;
    config.apply_env_overrides();
    config.validate().map_err(WatchdogError::Config)?;

    info!(
        "Loaded {} services ({} enabled) from {}",
        config.service.len(),
        config.enabled_services(),
        args.config.display()
    );

    let notifiers = build_notifiers(&config.notificator)?;
    if notifiers.is_empty() {
        warn!("No notification channel enabled, alerts will only be logged");
    }

    let mut runner = Runner::new(&config.service, notifiers, config.probe_timeout(), args.verbose)?;

    let failures = runner.init_services().await;
    if failures > 0 {
        warn!("{} services could not connect at startup, their checks will retry", failures);
    }

    let stop = runner
        .stop_handle()
        .ok_or_else(|| WatchdogError::Runner("stop handle already taken".to_string()))?;
    tokio::spawn(wait_for_signal(stop));

    runner.run(CancellationToken::new()).await
}

/// Turn SIGINT/SIGTERM into a graceful stop request
async fn wait_for_signal(stop: StopHandle) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to wait for shutdown signal: {}", e);
                return;
            }
        }
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    stop.stop();
}

/// Initialize structured logging
fn initialize_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
