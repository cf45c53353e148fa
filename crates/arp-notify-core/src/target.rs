//! Monitored targets and the on-disk target list
//!
//! The target list is a JSON document of the form
//! `{"targets": [{"mac": ..., "ip": ..., "message": ..., "receivers": [...]}]}`.
//! Unknown fields are rejected so typos in the file surface at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Failed to read target file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse target file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Created empty target file {0}; populate it and restart")]
    Created(String),
    #[error("Target #{0} is invalid: {1}")]
    Invalid(usize, String),
}

/// A device to watch for, keyed by hardware address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Hardware address exactly as arp-scan prints it
    pub mac: String,
    /// Known IP address, enables targeted scans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Message delivered when the device arrives
    pub message: String,
    /// Recipient IDs, notified in order
    #[serde(default)]
    pub receivers: Vec<String>,
}

impl Target {
    /// The known IP, treating an empty string as unset
    pub fn known_ip(&self) -> Option<&str> {
        self.ip.as_deref().filter(|ip| !ip.is_empty())
    }

    pub fn has_known_ip(&self) -> bool {
        self.known_ip().is_some()
    }
}

/// Contents of the target file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetList {
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl TargetList {
    /// Parse a target list from a JSON string
    pub fn from_json(content: &str) -> Result<Self, TargetError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load the target list from disk.
    ///
    /// A missing file is replaced by a template with one blank entry and is
    /// reported as [`TargetError::Created`], so the operator fills it in
    /// before the monitor ever runs.
    pub fn load(path: &Path) -> Result<Self, TargetError> {
        if !path.exists() {
            Self::write_template(path)?;
            return Err(TargetError::Created(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let list = Self::from_json(&content)?;
        info!(path = %path.display(), targets = list.targets.len(), "Loaded target list");
        Ok(list)
    }

    /// Reject entries that could never be matched meaningfully.
    ///
    /// An empty MAC is a substring of every scan report and would fire on
    /// every cycle after the absence window.
    pub fn validate(&self) -> Result<(), TargetError> {
        for (idx, target) in self.targets.iter().enumerate() {
            if target.mac.trim().is_empty() {
                return Err(TargetError::Invalid(idx, "mac is empty".to_string()));
            }
        }
        Ok(())
    }

    fn write_template(path: &Path) -> Result<(), TargetError> {
        let template = TargetList {
            targets: vec![Target {
                mac: String::new(),
                ip: Some(String::new()),
                message: String::new(),
                receivers: Vec::new(),
            }],
        };
        let content = serde_json::to_string_pretty(&template)?;
        std::fs::write(path, content)?;
        info!(path = %path.display(), "Wrote target list template");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_list() {
        let json = r#"{
            "targets": [
                {"mac": "aa:bb:cc:00:00:01", "ip": "192.168.1.10", "message": "Alice is home", "receivers": ["U1", "U2"]},
                {"mac": "aa:bb:cc:00:00:02", "message": "Bob is home", "receivers": ["U1"]}
            ]
        }"#;

        let list = TargetList::from_json(json).unwrap();
        assert_eq!(list.targets.len(), 2);
        assert_eq!(list.targets[0].known_ip(), Some("192.168.1.10"));
        assert_eq!(list.targets[0].receivers, vec!["U1", "U2"]);
        assert!(!list.targets[1].has_known_ip());
    }

    #[test]
    fn test_empty_ip_is_unknown() {
        let json = r#"{"targets": [{"mac": "aa", "ip": "", "message": "m", "receivers": []}]}"#;
        let list = TargetList::from_json(json).unwrap();
        assert_eq!(list.targets[0].known_ip(), None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{"targets": [{"mac": "aa", "message": "m", "receivers": [], "nickname": "x"}]}"#;
        assert!(matches!(
            TargetList::from_json(json),
            Err(TargetError::ParseError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_mac() {
        let json = r#"{"targets": [
            {"mac": "aa:bb", "message": "m", "receivers": []},
            {"mac": " ", "message": "m", "receivers": []}
        ]}"#;
        let list = TargetList::from_json(json).unwrap();
        assert!(matches!(list.validate(), Err(TargetError::Invalid(1, _))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor_config.json");
        std::fs::write(
            &path,
            r#"{"targets": [{"mac": "aa:bb", "message": "hi", "receivers": ["U1"]}]}"#,
        )
        .unwrap();

        let list = TargetList::load(&path).unwrap();
        assert_eq!(list.targets[0].mac, "aa:bb");
    }

    #[test]
    fn test_missing_file_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor_config.json");

        let err = TargetList::load(&path).unwrap_err();
        assert!(matches!(err, TargetError::Created(_)));
        assert!(path.exists());

        // The template parses back as a single blank entry
        let list = TargetList::load(&path).unwrap();
        assert_eq!(list.targets.len(), 1);
        assert!(list.targets[0].mac.is_empty());
        assert!(list.validate().is_err());
    }
}
