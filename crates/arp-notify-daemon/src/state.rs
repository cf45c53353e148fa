//! Application state management

use anyhow::{Context, Result};
use arp_notify_core::{Notifier, Target};
use arp_notify_discovery::{ArpScan, PresenceMonitor};
use arp_notify_line::LineClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Presence monitor
    pub monitor: Arc<PresenceMonitor>,
    /// LINE client, absent in dry-run mode
    pub line: Option<LineClient>,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, targets: Vec<Target>, dry_run: bool) -> Result<Arc<Self>> {
        let scanner = ArpScan::new(config.arp_scan.bin.clone(), config.arp_scan.iface.clone())?;

        let line = if dry_run {
            None
        } else {
            Some(
                LineClient::new(config.line.channel_access_token.clone())
                    .context("failed to create LINE client")?,
            )
        };

        let notifier: Arc<dyn Notifier> = match &line {
            Some(client) => Arc::new(client.clone()),
            None => {
                info!("Dry run: notifications will be logged, not sent");
                Arc::new(LogNotifier)
            }
        };

        let monitor = Arc::new(PresenceMonitor::new(
            config.to_monitor_config(),
            targets,
            Arc::new(scanner),
            notifier,
        ));

        Ok(Arc::new(Self {
            monitor,
            line,
            config,
        }))
    }
}

/// Notifier that only logs, used for dry runs
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        info!(recipient = %recipient, message = %message, "Dry run: notification not sent");
        Ok(())
    }
}
