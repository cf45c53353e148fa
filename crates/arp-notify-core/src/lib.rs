//! arp-notify core - Targets, presence state, and shared boundaries
//!
//! This crate provides the foundational pieces of the presence monitor:
//! - The target list and its on-disk JSON format
//! - Substring matching of hardware addresses against scan output
//! - The per-device presence store that debounces arrival notifications
//! - The [`Notifier`] boundary implemented by message transports

pub mod matcher;
pub mod notify;
pub mod presence;
pub mod target;

pub use matcher::is_present;
pub use notify::Notifier;
pub use presence::{DeviceState, PresenceEntry, PresenceStore};
pub use target::{Target, TargetError, TargetList};
