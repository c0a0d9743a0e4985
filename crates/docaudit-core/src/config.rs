//! Configuration types for the audit system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocauditConfig {
    /// Hook dispatcher settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Startup scanner settings
    #[serde(default)]
    pub scan: ScanConfig,
}

impl DocauditConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.audit.validate()?;
        self.scan.validate()?;
        Ok(())
    }
}

/// Hook dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Collection holding one baseline record per tracked document
    #[serde(default = "default_meta_collection")]
    pub meta_collection: String,

    /// Append-only collection of change entries
    #[serde(default = "default_log_collection")]
    pub log_collection: String,

    /// Tags attached to every audit entry
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,

    /// Recorded when a context value is missing or not a string
    #[serde(default = "default_fallback_value")]
    pub fallback_value: String,

    /// How long hook dispatch waits for the registry to be sealed
    ///
    /// When it gives up, the write is treated as not eligible. 0 waits forever.
    /// While the registry stays unsealed every audited `post_save` pays the
    /// full wait (5000 ms by default), so seal the registry at startup.
    #[serde(default = "default_registry_wait_timeout_ms")]
    pub registry_wait_timeout_ms: u64,

    /// Capacity of the audit event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Skip writing an entry when an update changed nothing
    #[serde(default)]
    pub skip_empty_changes: bool,
}

impl AuditConfig {
    /// Validate the audit configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.meta_collection.is_empty() {
            return Err(crate::Error::config("Meta collection name cannot be empty"));
        }
        if self.log_collection.is_empty() {
            return Err(crate::Error::config("Log collection name cannot be empty"));
        }
        if self.meta_collection == self.log_collection {
            return Err(crate::Error::config(format!(
                "Meta and log collections must differ (both are '{}')",
                self.meta_collection
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Registry wait bound, `None` for no bound
    pub fn registry_wait_timeout(&self) -> Option<Duration> {
        match self.registry_wait_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            meta_collection: default_meta_collection(),
            log_collection: default_log_collection(),
            tags: default_tags(),
            fallback_value: default_fallback_value(),
            registry_wait_timeout_ms: default_registry_wait_timeout_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            skip_empty_changes: false,
        }
    }
}

/// Startup scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Project root; defaults to the nearest `Cargo.toml` upward from the
    /// working directory
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directory prefixes, relative to the root, that are never scanned
    #[serde(default = "default_exclude_prefixes")]
    pub exclude_prefixes: Vec<String>,

    /// Local name of the marker type
    #[serde(default = "default_marker_type")]
    pub marker_type: String,

    /// Paths the marker may be qualified with (`docaudit::AuditMarker`)
    #[serde(default = "default_marker_namespaces")]
    pub marker_namespaces: Vec<String>,
}

impl ScanConfig {
    /// Scan config rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Validate the scanner configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let marker = self.marker_type.trim();
        if marker.is_empty() {
            return Err(crate::Error::config("Marker type cannot be empty"));
        }
        if marker.contains("::") || !marker.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(crate::Error::config(format!(
                "Marker type must be a bare identifier, got '{}'",
                self.marker_type
            )));
        }
        if self.exclude_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(crate::Error::config("Exclude prefixes cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: None,
            exclude_prefixes: default_exclude_prefixes(),
            marker_type: default_marker_type(),
            marker_namespaces: default_marker_namespaces(),
        }
    }
}

fn default_meta_collection() -> String {
    "audit_logs_meta".to_string()
}

fn default_log_collection() -> String {
    "audit_logs".to_string()
}

fn default_tags() -> Vec<String> {
    vec!["audit".to_string(), "log".to_string()]
}

fn default_fallback_value() -> String {
    crate::context::DEFAULT_FALLBACK.to_string()
}

fn default_registry_wait_timeout_ms() -> u64 {
    5000
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_exclude_prefixes() -> Vec<String> {
    ["src/bin", "target", "vendor", ".git"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_marker_type() -> String {
    "AuditMarker".to_string()
}

fn default_marker_namespaces() -> Vec<String> {
    ["docaudit_core", "docaudit_core::model", "docaudit"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = DocauditConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.audit.meta_collection, "audit_logs_meta");
        assert_eq!(config.audit.log_collection, "audit_logs");
        assert_eq!(config.audit.tags, vec!["audit", "log"]);
        assert_eq!(config.audit.fallback_value, "default");
        assert_eq!(
            config.audit.registry_wait_timeout(),
            Some(Duration::from_secs(5))
        );
        assert_eq!(config.scan.marker_type, "AuditMarker");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DocauditConfig =
            serde_json::from_str(r#"{"audit": {"log_collection": "changes"}}"#).unwrap();
        assert_eq!(config.audit.log_collection, "changes");
        assert_eq!(config.audit.meta_collection, "audit_logs_meta");
        assert_eq!(config.audit.event_channel_capacity, 1000);
        assert_eq!(config.scan.exclude_prefixes.len(), 4);
    }

    #[test]
    fn test_invalid_audit_config() {
        let same = AuditConfig {
            log_collection: "audit_logs_meta".into(),
            ..AuditConfig::default()
        };
        assert!(same.validate().is_err());

        let empty = AuditConfig {
            meta_collection: String::new(),
            ..AuditConfig::default()
        };
        assert!(empty.validate().is_err());

        let no_capacity = AuditConfig {
            event_channel_capacity: 0,
            ..AuditConfig::default()
        };
        assert!(no_capacity.validate().is_err());
    }

    #[test]
    fn test_invalid_scan_config() {
        let qualified = ScanConfig {
            marker_type: "docaudit::AuditMarker".into(),
            ..ScanConfig::default()
        };
        assert!(qualified.validate().is_err());

        let blank_prefix = ScanConfig {
            exclude_prefixes: vec![" ".into()],
            ..ScanConfig::default()
        };
        assert!(blank_prefix.validate().is_err());
    }

    #[test]
    fn test_zero_wait_is_unbounded() {
        let config = AuditConfig {
            registry_wait_timeout_ms: 0,
            ..AuditConfig::default()
        };
        assert_eq!(config.registry_wait_timeout(), None);
    }
}
