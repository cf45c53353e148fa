//! arp-notify daemon - Main entry point
//!
//! Runs the presence monitor and serves the LINE webhook and health endpoint.

mod api;
mod config;
mod server;
mod state;

use anyhow::{Context, Result};
use arp_notify_core::TargetList;
use arp_notify_discovery::CycleOutcome;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "arp-notify")]
#[command(about = "Announce device arrivals on the LAN through LINE")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "arp-notify.toml")]
    config: PathBuf,

    /// Path to the JSON target list (overrides the config file)
    #[arg(short, long)]
    targets: Option<PathBuf>,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single scan cycle and exit
    #[arg(long)]
    scan_once: bool,

    /// Log notifications instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("arp-notify v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;
    config.apply_env(|key| std::env::var(key).ok());

    // Command line wins over file and environment
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }
    if let Some(targets) = &args.targets {
        config.monitor.targets_path = targets.display().to_string();
    }

    config
        .validate(!args.dry_run)
        .context("invalid configuration")?;

    info!(
        iface = %config.arp_scan.iface,
        interval_secs = config.arp_scan.interval_secs,
        absence_reset_min = config.monitor.absence_reset_min,
        "Configuration loaded"
    );

    let targets_path = PathBuf::from(&config.monitor.targets_path);
    let targets = TargetList::load(&targets_path)
        .with_context(|| format!("failed to load targets from {}", targets_path.display()))?;
    targets.validate().context("invalid target list")?;
    info!(count = targets.targets.len(), "Targets loaded");

    // Create application state
    let state = state::AppState::new(config.clone(), targets.targets, args.dry_run)?;

    if args.scan_once {
        info!("Running single scan cycle");
        match state.monitor.try_run_cycle().await {
            CycleOutcome::Completed(report) => {
                println!("Strategy: {}", report.strategy);
                println!("Scans: {} ({} failed)", report.scans, report.failed_scans);
                println!("Present ({}):", report.found.len());
                for mac in &report.found {
                    let marker = if report.notified.contains(mac) {
                        " [notified]"
                    } else {
                        ""
                    };
                    println!("  - {}{}", mac, marker);
                }
                println!("Absent ({}):", report.absent.len());
                for mac in &report.absent {
                    println!("  - {}", mac);
                }
            }
            CycleOutcome::Skipped => println!("Cycle skipped: another scan is running"),
        }
        state.monitor.drain().await;
    } else {
        // Daemon mode - run web server and monitor until Ctrl-C
        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown requested");
                    signal_cancel.cancel();
                }
                Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
            }
        });

        server::run(state, &config.daemon.bind, cancel).await?;
    }

    Ok(())
}
