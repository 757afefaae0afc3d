//! Bridge configuration
//!
//! Options are process-wide: carriers and the foreign-error call gateway are
//! process-wide too. Install them once at startup, before the first boundary
//! crossing; without an explicit install the defaults apply.

use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on an exported payload (16 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Errors that can occur while loading or installing options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File that was read
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config contents are invalid
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Options were already installed (or already read)
    #[error("Bridge options already installed")]
    AlreadyInstalled,
}

/// Bridge options
///
/// ```toml
/// max_payload_bytes = 1048576
/// preload_stack_overflow_type = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Largest payload an exported carrier may hold; also caps the buffer
    /// pre-sizing hint. Larger payloads collapse to the sentinel carrier.
    pub max_payload_bytes: usize,

    /// Build the foreign-error call gateway (and resolve the stack-overflow
    /// marker type) when the first method scope is opened
    pub preload_stack_overflow_type: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            preload_stack_overflow_type: true,
        }
    }
}

impl BridgeOptions {
    /// Parse options from TOML; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load options from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

static OPTIONS: OnceCell<BridgeOptions> = OnceCell::new();

/// Install process-wide options
///
/// Fails once options are installed or have already been read through
/// [`current`].
pub fn install(options: BridgeOptions) -> Result<(), ConfigError> {
    OPTIONS
        .set(options)
        .map_err(|_| ConfigError::AlreadyInstalled)
}

/// The process-wide options
pub fn current() -> &'static BridgeOptions {
    OPTIONS.get_or_init(BridgeOptions::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert_eq!(options.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
        assert!(options.preload_stack_overflow_type);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let options = BridgeOptions::from_toml_str("max_payload_bytes = 4096").unwrap();
        assert_eq!(options.max_payload_bytes, 4096);
        assert!(options.preload_stack_overflow_type);

        let empty = BridgeOptions::from_toml_str("").unwrap();
        assert_eq!(empty, BridgeOptions::default());
    }

    #[test]
    fn test_invalid_toml() {
        let result = BridgeOptions::from_toml_str("max_payload_bytes = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = BridgeOptions::from_file("/nonexistent/isobridge.toml");
        match result {
            Err(ConfigError::Io { path, .. }) => assert!(path.ends_with("isobridge.toml")),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
