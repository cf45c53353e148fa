//! Scan strategy selection from the shape of the target list

use arp_notify_core::Target;
use serde::Serialize;

/// How a cycle looks for its targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    /// One scan of the whole segment, then targeted fallback for misses
    Broadcast,
    /// One scan per target IP, no broadcast
    Targeted,
}

impl ScanStrategy {
    /// Targeted only when every target has a known IP.
    ///
    /// An empty list is vacuously all-targeted, so it never triggers a
    /// broadcast scan.
    pub fn select(targets: &[Target]) -> Self {
        if targets.iter().all(Target::has_known_ip) {
            Self::Targeted
        } else {
            Self::Broadcast
        }
    }
}

impl std::fmt::Display for ScanStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Broadcast => write!(f, "broadcast"),
            Self::Targeted => write!(f, "targeted"),
        }
    }
}

/// Split broadcast misses into those that can be re-checked by IP and
/// those that cannot.
pub fn partition_misses<'a>(misses: &[&'a Target]) -> (Vec<&'a Target>, Vec<&'a Target>) {
    misses.iter().copied().partition(|t| t.has_known_ip())
}
