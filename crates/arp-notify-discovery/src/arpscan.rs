//! arp-scan execution
//!
//! Runs the external `arp-scan` binary either across the local segment
//! (`--localnet`) or against a single IP, and returns its raw output. The
//! output is not parsed here; presence is decided by substring matching.

use async_trait::async_trait;
use regex::Regex;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

static IFACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9._-]{0,15}$").expect("interface pattern is valid")
});

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid interface name: {0:?}")]
    InvalidInterface(String),
    #[error("Invalid target address: {0:?}")]
    InvalidAddress(String),
    #[error("Binary {0:?} not found in PATH: {1}")]
    BinaryNotFound(String, which::Error),
    #[error("Failed to run arp-scan: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("arp-scan exited with {status}: {output}")]
    Exit { status: String, output: String },
    #[error("arp-scan timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of raw scan reports.
///
/// Both calls are bounded by `timeout`; expiry is reported as
/// [`ScanError::Timeout`] like any other failure.
#[async_trait]
pub trait ScanExecutor: Send + Sync {
    /// Scan the whole local segment
    async fn broadcast(&self, timeout: Duration) -> Result<String, ScanError>;

    /// Scan a single IP address
    async fn targeted(&self, ip: &str, timeout: Duration) -> Result<String, ScanError>;
}

/// Validate an interface name before it reaches the command line
pub fn validate_iface(iface: &str) -> Result<(), ScanError> {
    if IFACE_RE.is_match(iface) {
        Ok(())
    } else {
        Err(ScanError::InvalidInterface(iface.to_string()))
    }
}

/// Resolve a binary name against `PATH`
pub fn check_bin(bin: &str) -> Result<PathBuf, ScanError> {
    which::which(bin).map_err(|e| ScanError::BinaryNotFound(bin.to_string(), e))
}

/// [`ScanExecutor`] backed by the `arp-scan` command
#[derive(Debug, Clone)]
pub struct ArpScan {
    bin: String,
    iface: String,
}

impl ArpScan {
    pub fn new(bin: impl Into<String>, iface: impl Into<String>) -> Result<Self, ScanError> {
        let iface = iface.into();
        validate_iface(&iface)?;
        Ok(Self {
            bin: bin.into(),
            iface,
        })
    }

    /// Arguments for a scan of the local segment.
    /// `-x` drops the header and footer lines.
    fn broadcast_args(&self) -> Vec<String> {
        vec![
            "-I".to_string(),
            self.iface.clone(),
            "--localnet".to_string(),
            "-x".to_string(),
        ]
    }

    fn targeted_args(&self, ip: IpAddr) -> Vec<String> {
        vec![
            "-I".to_string(),
            self.iface.clone(),
            "-x".to_string(),
            ip.to_string(),
        ]
    }

    async fn run(&self, args: Vec<String>, timeout: Duration) -> Result<String, ScanError> {
        trace!(bin = %self.bin, ?args, "Spawning arp-scan");

        // No shell involved; the child is killed if the timeout drops it
        let child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| ScanError::Timeout(timeout))??;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ScanError::Exit {
                status: output.status.to_string(),
                output: text.trim().to_string(),
            });
        }

        debug!(lines = text.lines().count(), "arp-scan finished");
        Ok(text)
    }
}

#[async_trait]
impl ScanExecutor for ArpScan {
    async fn broadcast(&self, timeout: Duration) -> Result<String, ScanError> {
        self.run(self.broadcast_args(), timeout).await
    }

    async fn targeted(&self, ip: &str, timeout: Duration) -> Result<String, ScanError> {
        // Parsing rules out anything that could be read as a flag
        let ip: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| ScanError::InvalidAddress(ip.to_string()))?;
        self.run(self.targeted_args(ip), timeout).await
    }
}
