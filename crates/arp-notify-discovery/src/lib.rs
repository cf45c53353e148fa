//! arp-notify discovery - Scanning and the presence monitor
//!
//! This crate provides:
//! - `arp-scan` execution behind the [`ScanExecutor`] boundary
//! - Broadcast vs. targeted strategy selection
//! - The [`PresenceMonitor`] scheduler that drives scan cycles and
//!   dispatches arrival notifications

pub mod arpscan;
pub mod monitor;
pub mod strategy;

pub use arpscan::{check_bin, validate_iface, ArpScan, ScanError, ScanExecutor};
pub use monitor::{
    CycleOutcome, CycleReport, MonitorConfig, MonitorEvent, MonitorStats, PresenceMonitor,
};
pub use strategy::ScanStrategy;
