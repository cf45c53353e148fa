//! Presence monitor: periodic scan cycles and arrival notifications

use arp_notify_core::{is_present, Notifier, PresenceEntry, PresenceStore, Target};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::arpscan::ScanExecutor;
use crate::strategy::{partition_misses, ScanStrategy};

/// Monitor timing configuration
#[derive(Debug, Clone, Serialize)]
pub struct MonitorConfig {
    /// Time between scan cycles
    pub interval: Duration,
    /// Budget for one scan of the whole segment
    pub broadcast_timeout: Duration,
    /// Budget for each single-IP scan
    pub targeted_timeout: Duration,
    /// Minutes without a sighting after which a device re-arms
    pub absence_reset_min: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            broadcast_timeout: Duration::from_secs(15),
            targeted_timeout: Duration::from_secs(2),
            absence_reset_min: 60,
        }
    }
}

/// Monitor event for real-time observers
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A scan cycle acquired the lock and started
    CycleStarted(ScanStrategy),
    /// A tick was dropped because the previous cycle still runs
    CycleSkipped,
    /// A target was present but its arrival was already announced
    DeviceSeen { mac: String },
    /// A target arrived and a notification was dispatched
    DeviceArrived { mac: String, receivers: usize },
    /// A scan cycle finished
    CycleCompleted(CycleReport),
}

/// Summary of one scan cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub strategy: ScanStrategy,
    /// Targets matched in any scan of the cycle
    pub found: Vec<String>,
    /// Targets whose arrival was announced
    pub notified: Vec<String>,
    /// Targets not matched by any successful scan
    pub absent: Vec<String>,
    /// Scan invocations, successful or not
    pub scans: usize,
    /// Scan invocations that failed or timed out
    pub failed_scans: usize,
}

impl CycleReport {
    /// Empty report for a cycle using `strategy`
    pub fn new(strategy: ScanStrategy) -> Self {
        Self {
            strategy,
            found: Vec::new(),
            notified: Vec::new(),
            absent: Vec::new(),
            scans: 0,
            failed_scans: 0,
        }
    }
}

/// Result of attempting a cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Skipped,
}

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MonitorStats {
    pub cycles_run: u64,
    pub cycles_skipped: u64,
}

/// Presence monitor service
pub struct PresenceMonitor {
    config: MonitorConfig,
    targets: RwLock<Arc<Vec<Target>>>,
    store: Mutex<PresenceStore>,
    /// Single-flight slot; a cycle runs only while holding it
    cycle_lock: Mutex<()>,
    scanner: Arc<dyn ScanExecutor>,
    notifier: Arc<dyn Notifier>,
    tasks: TaskTracker,
    event_tx: broadcast::Sender<MonitorEvent>,
    cycles_run: AtomicU64,
    cycles_skipped: AtomicU64,
}

impl PresenceMonitor {
    /// Create a new monitor over the given targets
    pub fn new(
        config: MonitorConfig,
        targets: Vec<Target>,
        scanner: Arc<dyn ScanExecutor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let store = PresenceStore::with_reset_minutes(config.absence_reset_min);
        Self {
            config,
            targets: RwLock::new(Arc::new(targets)),
            store: Mutex::new(store),
            cycle_lock: Mutex::new(()),
            scanner,
            notifier,
            tasks: TaskTracker::new(),
            event_tx,
            cycles_run: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Subscribe to monitor events
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.event_tx.subscribe()
    }

    /// Current target list
    pub async fn targets(&self) -> Arc<Vec<Target>> {
        self.targets.read().await.clone()
    }

    /// Swap the target list; takes effect from the next cycle
    pub async fn replace_targets(&self, targets: Vec<Target>) {
        let count = targets.len();
        *self.targets.write().await = Arc::new(targets);
        info!(targets = count, "Target list replaced");
    }

    /// Presence state of every device sighted so far
    pub async fn presence(&self) -> Vec<PresenceEntry> {
        self.store.lock().await.snapshot()
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
        }
    }

    /// Run one cycle unless another one is in progress.
    ///
    /// Never waits for the lock: a busy monitor drops the attempt and
    /// counts it as skipped.
    pub async fn try_run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            warn!("Scan already in progress, skipping this interval");
            let _ = self.event_tx.send(MonitorEvent::CycleSkipped);
            return CycleOutcome::Skipped;
        };

        let report = self.run_cycle().await;
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
        CycleOutcome::Completed(report)
    }

    async fn run_cycle(&self) -> CycleReport {
        // Snapshot so a concurrent replace_targets cannot change this cycle
        let targets = self.targets().await;
        let strategy = ScanStrategy::select(&targets);
        let _ = self.event_tx.send(MonitorEvent::CycleStarted(strategy));

        let mut report = CycleReport::new(strategy);

        let all: Vec<&Target> = targets.iter().collect();
        match strategy {
            ScanStrategy::Targeted => {
                debug!(targets = all.len(), "Starting targeted arp-scan");
                self.targeted_pass(&all, &mut report).await;
            }
            ScanStrategy::Broadcast => {
                self.broadcast_pass(&all, &mut report).await;
            }
        }

        info!(
            strategy = %strategy,
            found = report.found.len(),
            notified = report.notified.len(),
            absent = report.absent.len(),
            failed = report.failed_scans,
            "Scan cycle complete"
        );
        let _ = self.event_tx.send(MonitorEvent::CycleCompleted(report.clone()));

        report
    }

    async fn broadcast_pass(&self, targets: &[&Target], report: &mut CycleReport) {
        info!("Starting broadcast arp-scan");
        report.scans += 1;

        let output = match self.scanner.broadcast(self.config.broadcast_timeout).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Broadcast arp-scan failed");
                report.failed_scans += 1;
                return;
            }
        };

        let mut misses = Vec::new();
        for &target in targets {
            if is_present(&output, &target.mac) {
                self.on_found(target, report).await;
            } else {
                misses.push(target);
            }
        }

        let (fallback, unreachable) = partition_misses(&misses);
        for target in unreachable {
            debug!(mac = %target.mac, "Not found in broadcast scan and no IP to re-check");
            report.absent.push(target.mac.clone());
        }

        if !fallback.is_empty() {
            info!(
                targets = fallback.len(),
                "Re-checking broadcast misses with targeted scans"
            );
            self.targeted_pass(&fallback, report).await;
        }
    }

    /// One bounded scan per target, sequentially
    async fn targeted_pass(&self, targets: &[&Target], report: &mut CycleReport) {
        for &target in targets {
            let Some(ip) = target.known_ip() else {
                debug!(mac = %target.mac, "Skipping targeted scan, no IP configured");
                report.absent.push(target.mac.clone());
                continue;
            };

            debug!(mac = %target.mac, ip = %ip, "Running targeted arp-scan");
            report.scans += 1;

            let output = match self.scanner.targeted(ip, self.config.targeted_timeout).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(mac = %target.mac, ip = %ip, error = %e, "Targeted arp-scan failed");
                    report.failed_scans += 1;
                    continue;
                }
            };

            if is_present(&output, &target.mac) {
                self.on_found(target, report).await;
            } else {
                debug!(mac = %target.mac, ip = %ip, "Not found in targeted scan");
                report.absent.push(target.mac.clone());
            }
        }
    }

    async fn on_found(&self, target: &Target, report: &mut CycleReport) {
        info!(mac = %target.mac, "Target found in scan output");
        report.found.push(target.mac.clone());

        let should_notify = {
            let mut store = self.store.lock().await;
            let notify = store.record_sighting(&target.mac, Utc::now());
            if notify {
                store.mark_notified(&target.mac);
            }
            notify
        };

        if !should_notify {
            debug!(mac = %target.mac, "Already notified, skipping notification");
            let _ = self.event_tx.send(MonitorEvent::DeviceSeen {
                mac: target.mac.clone(),
            });
            return;
        }

        info!(
            mac = %target.mac,
            receivers = target.receivers.len(),
            "Sending arrival notification"
        );
        report.notified.push(target.mac.clone());
        let _ = self.event_tx.send(MonitorEvent::DeviceArrived {
            mac: target.mac.clone(),
            receivers: target.receivers.len(),
        });

        // Detached: delivery never holds up the cycle
        self.tasks.spawn(dispatch(
            self.notifier.clone(),
            target.mac.clone(),
            target.receivers.clone(),
            target.message.clone(),
        ));
    }

    /// Run cycles until `cancel` fires.
    ///
    /// A cold-start cycle runs immediately, then one per interval. Each
    /// cycle is spawned so that a slow one holds the lock and later ticks
    /// are dropped instead of queued. Cancellation stops new cycles only;
    /// in-flight cycles end on their own scan timeouts.
    ///
    /// An interval too long to schedule leaves only the cold-start cycle.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.config.interval;
        info!(
            interval = ?period,
            broadcast_timeout = ?self.config.broadcast_timeout,
            targeted_timeout = ?self.config.targeted_timeout,
            "Presence monitor started"
        );

        self.spawn_cycle();

        let Some(start) = Instant::now().checked_add(period) else {
            warn!(interval = ?period, "Interval out of range, no further cycles will run");
            cancel.cancelled().await;
            info!("Stopping presence monitor due to cancellation");
            return;
        };

        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stopping presence monitor due to cancellation");
                    break;
                }
                _ = ticker.tick() => {
                    self.spawn_cycle();
                }
            }
        }
    }

    fn spawn_cycle(self: &Arc<Self>) {
        let monitor = self.clone();
        self.tasks.spawn(async move {
            monitor.try_run_cycle().await;
        });
    }

    /// Wait for spawned cycles and pending notifications to finish
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

/// Deliver one message to each recipient in order, tolerating failures
async fn dispatch(
    notifier: Arc<dyn Notifier>,
    mac: String,
    receivers: Vec<String>,
    message: String,
) {
    for receiver in &receivers {
        match notifier.send(receiver, &message).await {
            Ok(()) => info!(mac = %mac, receiver = %receiver, "Notification sent"),
            Err(e) => warn!(
                mac = %mac,
                receiver = %receiver,
                error = %e,
                "Failed to send notification"
            ),
        }
    }
}
