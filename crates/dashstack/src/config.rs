//! Bridge configuration.
//!
//! Values come from built-in defaults, optionally overlaid by a TOML file and
//! then by `DASHSTACK_*` environment variables. Environment values that fail
//! to parse, or that are zero, are ignored with a warning.
//!
//! ```toml
//! max_stack_depth = 5
//! refresh_debounce_ms = 250
//!
//! [limits]
//! max_list_items = 12
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Environment variable overriding [`BridgeConfig::max_stack_depth`].
pub const ENV_MAX_STACK_DEPTH: &str = "DASHSTACK_MAX_STACK_DEPTH";
/// Environment variable overriding [`BridgeConfig::refresh_debounce_ms`].
pub const ENV_REFRESH_DEBOUNCE_MS: &str = "DASHSTACK_REFRESH_DEBOUNCE_MS";
/// Environment variable overriding [`BridgeConfig::outbound_queue_capacity`].
pub const ENV_OUTBOUND_QUEUE_CAP: &str = "DASHSTACK_OUTBOUND_QUEUE_CAP";

/// Host content limits. Content beyond these is truncated on construction and
/// on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_list_items: usize,
    pub max_sections: usize,
    pub max_grid_buttons: usize,
    pub max_map_buttons: usize,
    pub max_bar_buttons: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_list_items: 12,
            max_sections: 6,
            max_grid_buttons: 8,
            max_map_buttons: 4,
            max_bar_buttons: 2,
        }
    }
}

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum navigation depth, root included.
    pub max_stack_depth: usize,
    /// Default coalescing interval for full refreshes.
    pub refresh_debounce_ms: u64,
    /// Capacity of the bounded outbound event queue used by
    /// [`ChannelSink`](crate::protocol::ChannelSink).
    pub outbound_queue_capacity: usize,
    /// Worker threads for image resolution.
    pub image_workers: usize,
    pub limits: Limits,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 5,
            refresh_debounce_ms: 250,
            outbound_queue_capacity: 256,
            image_workers: 2,
            limits: Limits::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Apply `DASHSTACK_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup function.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(depth) = positive_override(&lookup, ENV_MAX_STACK_DEPTH) {
            self.max_stack_depth = depth as usize;
        }
        if let Some(ms) = positive_override(&lookup, ENV_REFRESH_DEBOUNCE_MS) {
            self.refresh_debounce_ms = ms;
        }
        if let Some(cap) = positive_override(&lookup, ENV_OUTBOUND_QUEUE_CAP) {
            self.outbound_queue_capacity = cap as usize;
        }
        self
    }

    /// Reject configurations the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_stack_depth == 0 {
            return Err(BridgeError::Config("max_stack_depth must be at least 1".into()));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(BridgeError::Config(
                "outbound_queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }
}

fn positive_override<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            tracing::warn!(target: "dashstack::config", key, value = %raw, "ignoring invalid override");
            None
        }
        Ok(value) => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.max_stack_depth, 5);
        assert_eq!(config.refresh_debounce(), Duration::from_millis(250));
        assert_eq!(config.limits.max_list_items, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BridgeConfig::from_toml_str(
            r#"
            max_stack_depth = 3

            [limits]
            max_sections = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.max_stack_depth, 3);
        assert_eq!(config.limits.max_sections, 2);
        assert_eq!(config.limits.max_list_items, 12);
        assert_eq!(config.refresh_debounce_ms, 250);
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let err = BridgeConfig::from_toml_str("max_stack_depth = 0").unwrap_err();
        assert_eq!(err.code(), "config_error");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "refresh_debounce_ms = 40").unwrap();

        let config = BridgeConfig::load_toml(file.path()).unwrap();
        assert_eq!(config.refresh_debounce(), Duration::from_millis(40));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load_toml(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_overrides_skip_garbage_and_zero() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_STACK_DEPTH, "0"),
            (ENV_REFRESH_DEBOUNCE_MS, "100"),
            (ENV_OUTBOUND_QUEUE_CAP, "lots"),
        ]
        .into_iter()
        .collect();

        let config = BridgeConfig::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.max_stack_depth, 5);
        assert_eq!(config.refresh_debounce_ms, 100);
        assert_eq!(config.outbound_queue_capacity, 256);
    }
}
