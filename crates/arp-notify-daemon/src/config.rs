//! Configuration loading and validation

use anyhow::{bail, Context, Result};
use arp_notify_discovery::{check_bin, validate_iface, MonitorConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Longest accepted scan interval (one week)
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted budget for a single arp-scan run
const MAX_SCAN_TIMEOUT_SECS: u64 = 10 * 60;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub arp_scan: ArpScanConfig,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub line: LineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the webhook/health server
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArpScanConfig {
    /// arp-scan binary, resolved against PATH
    #[serde(default = "default_bin")]
    pub bin: String,
    /// Interface to scan on; must be set
    #[serde(default)]
    pub iface: String,
    /// Seconds between scan cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Budget for a --localnet scan
    #[serde(default = "default_broadcast_timeout")]
    pub broadcast_timeout_secs: u64,
    /// Budget for each single-IP scan
    #[serde(default = "default_targeted_timeout")]
    pub targeted_timeout_secs: u64,
}

impl Default for ArpScanConfig {
    fn default() -> Self {
        Self {
            bin: default_bin(),
            iface: String::new(),
            interval_secs: default_interval(),
            broadcast_timeout_secs: default_broadcast_timeout(),
            targeted_timeout_secs: default_targeted_timeout(),
        }
    }
}

fn default_bin() -> String {
    "arp-scan".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_broadcast_timeout() -> u64 {
    15
}

fn default_targeted_timeout() -> u64 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Minutes of absence after which a device notifies again
    #[serde(default = "default_absence_reset")]
    pub absence_reset_min: u64,
    /// Path to the JSON target list
    #[serde(default = "default_targets_path")]
    pub targets_path: String,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            absence_reset_min: default_absence_reset(),
            targets_path: default_targets_path(),
        }
    }
}

fn default_absence_reset() -> u64 {
    60
}

fn default_targets_path() -> String {
    "monitor_config.json".to_string()
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_access_token: String,
    #[serde(default)]
    pub channel_secret: String,
}

// Credentials stay out of logs
impl std::fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConfig")
            .field("channel_access_token", &redact(&self.channel_access_token))
            .field("channel_secret", &redact(&self.channel_secret))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Config {
    /// Apply environment variable overrides.
    ///
    /// Numeric values that fail to parse are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(bin) = lookup("ARP_SCAN_BIN") {
            self.arp_scan.bin = bin;
        }
        if let Some(iface) = lookup("ARP_SCAN_IFACE") {
            self.arp_scan.iface = iface;
        }
        if let Some(v) = number("ARP_SCAN_INTERVAL_SECS") {
            self.arp_scan.interval_secs = v;
        }
        if let Some(v) = number("ARP_SCAN_BROADCAST_TIMEOUT_SECS") {
            self.arp_scan.broadcast_timeout_secs = v;
        }
        if let Some(v) = number("ARP_SCAN_INDIVIDUAL_TIMEOUT_SECS") {
            self.arp_scan.targeted_timeout_secs = v;
        }
        if let Some(v) = number("MONITOR_ABSENCE_RESET_MIN") {
            self.monitor.absence_reset_min = v;
        }
        if let Some(token) = lookup("LINE_BOT_CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = token;
        }
        if let Some(secret) = lookup("LINE_BOT_CHANNEL_SECRET") {
            self.line.channel_secret = secret;
        }
        if let Some(port) = number("PORT").and_then(|p| u16::try_from(p).ok()) {
            let host = self
                .daemon
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.daemon.bind = format!("{host}:{port}");
        }
    }

    /// Check everything the monitor needs before it starts.
    ///
    /// LINE credentials are only required when notifications are really
    /// delivered.
    pub fn validate(&self, require_line: bool) -> Result<()> {
        let path = check_bin(&self.arp_scan.bin)?;
        debug!(path = %path.display(), "Found arp-scan binary");

        self.validate_values(require_line)
    }

    /// Checks that do not touch the system
    fn validate_values(&self, require_line: bool) -> Result<()> {
        validate_iface(&self.arp_scan.iface)?;

        check_range("interval", self.arp_scan.interval_secs, MAX_INTERVAL_SECS)?;
        check_range(
            "broadcast timeout",
            self.arp_scan.broadcast_timeout_secs,
            MAX_SCAN_TIMEOUT_SECS,
        )?;
        check_range(
            "targeted timeout",
            self.arp_scan.targeted_timeout_secs,
            MAX_SCAN_TIMEOUT_SECS,
        )?;

        if require_line {
            if self.line.channel_access_token.is_empty() {
                bail!("LINE channel access token is not set");
            }
            if self.line.channel_secret.is_empty() {
                bail!("LINE channel secret is not set");
            }
        }

        Ok(())
    }

    /// Convert to MonitorConfig
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.arp_scan.interval_secs),
            broadcast_timeout: Duration::from_secs(self.arp_scan.broadcast_timeout_secs),
            targeted_timeout: Duration::from_secs(self.arp_scan.targeted_timeout_secs),
            absence_reset_min: self.monitor.absence_reset_min,
        }
    }
}

fn check_range(name: &str, secs: u64, max: u64) -> Result<()> {
    if secs == 0 || secs > max {
        bail!("invalid {name} {secs}s (must be between 1 and {max})");
    }
    Ok(())
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> Config {
        let mut config = Config::default();
        config.arp_scan.iface = "eno1".to_string();
        config.line.channel_access_token = "token".to_string();
        config.line.channel_secret = "secret".to_string();
        config
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[daemon]
bind = "127.0.0.1:8080"

[arp_scan]
iface = "eth0"
interval_secs = 30
targeted_timeout_secs = 3

[monitor]
absence_reset_min = 90
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.daemon.bind, "127.0.0.1:8080");
        assert_eq!(config.arp_scan.bin, "arp-scan");
        assert_eq!(config.arp_scan.iface, "eth0");
        assert_eq!(config.arp_scan.interval_secs, 30);
        assert_eq!(config.arp_scan.broadcast_timeout_secs, 15);
        assert_eq!(config.arp_scan.targeted_timeout_secs, 3);
        assert_eq!(config.monitor.absence_reset_min, 90);
        assert_eq!(config.monitor.targets_path, "monitor_config.json");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ARP_SCAN_IFACE", "wlan0"),
            ("ARP_SCAN_INTERVAL_SECS", "120"),
            ("ARP_SCAN_BROADCAST_TIMEOUT_SECS", "not-a-number"),
            ("ARP_SCAN_INDIVIDUAL_TIMEOUT_SECS", "5"),
            ("MONITOR_ABSENCE_RESET_MIN", "30"),
            ("LINE_BOT_CHANNEL_SECRET", "s3cret"),
            ("PORT", "8000"),
        ]);

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.arp_scan.iface, "wlan0");
        assert_eq!(config.arp_scan.interval_secs, 120);
        assert_eq!(config.arp_scan.broadcast_timeout_secs, 15);
        assert_eq!(config.arp_scan.targeted_timeout_secs, 5);
        assert_eq!(config.monitor.absence_reset_min, 30);
        assert_eq!(config.line.channel_secret, "s3cret");
        assert_eq!(config.daemon.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_validate_values() {
        assert!(valid().validate_values(true).is_ok());

        let mut config = valid();
        config.arp_scan.iface = String::new();
        assert!(config.validate_values(true).is_err());

        let mut config = valid();
        config.arp_scan.interval_secs = 0;
        assert!(config.validate_values(true).is_err());

        let mut config = valid();
        config.arp_scan.broadcast_timeout_secs = 0;
        assert!(config.validate_values(true).is_err());

        let mut config = valid();
        config.arp_scan.targeted_timeout_secs = 0;
        assert!(config.validate_values(true).is_err());
    }

    #[test]
    fn test_validate_upper_bounds() {
        let mut config = valid();
        config.arp_scan.interval_secs = MAX_INTERVAL_SECS;
        assert!(config.validate_values(true).is_ok());
        config.arp_scan.interval_secs = u64::MAX;
        assert!(config.validate_values(true).is_err());

        let mut config = valid();
        config.arp_scan.broadcast_timeout_secs = MAX_SCAN_TIMEOUT_SECS + 1;
        assert!(config.validate_values(true).is_err());

        let mut config = valid();
        config.arp_scan.targeted_timeout_secs = u64::MAX;
        assert!(config.validate_values(true).is_err());
    }

    #[test]
    fn test_line_credentials_only_when_required() {
        let mut config = valid();
        config.line = LineConfig::default();
        assert!(config.validate_values(true).is_err());
        assert!(config.validate_values(false).is_ok());
    }

    #[test]
    fn test_missing_binary_is_fatal() {
        let mut config = valid();
        config.arp_scan.bin = "arp-notify-no-such-binary".to_string();
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("\"token\""));
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_to_monitor_config() {
        let monitor = valid().to_monitor_config();
        assert_eq!(monitor.interval, Duration::from_secs(60));
        assert_eq!(monitor.broadcast_timeout, Duration::from_secs(15));
        assert_eq!(monitor.targeted_timeout, Duration::from_secs(2));
        assert_eq!(monitor.absence_reset_min, 60);
    }

    #[test]
    fn test_load_missing_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:5000");
    }
}
