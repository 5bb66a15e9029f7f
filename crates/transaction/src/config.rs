//! Transaction configuration via `txlog.toml`
//!
//! The AOT driver reads this once and hands a copy to every transaction it
//! creates. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use txlog_core::{Error, Result};

/// Config file name looked up next to the compiler's output
pub const CONFIG_FILE_NAME: &str = "txlog.toml";

/// Per-transaction settings
///
/// # Example
///
/// ```toml
/// log_stats = false
/// enforce_no_new_records = true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Emit an `info` event with log sizes when a transaction is dropped
    #[serde(default)]
    pub log_stats: bool,
    /// Install `ScopedAssertNoNewRecords` guards
    #[serde(default = "default_enforce_no_new_records")]
    pub enforce_no_new_records: bool,
}

fn default_enforce_no_new_records() -> bool {
    true
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            log_stats: false,
            enforce_no_new_records: default_enforce_no_new_records(),
        }
    }
}

impl TransactionConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# txlog transaction configuration
#
# Log per-transaction record counts when a transaction is dropped (default: false)
log_stats = false

# Check that guarded regions create no new transaction records (default: true)
# The check itself only fires in debug builds.
enforce_no_new_records = true
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid config TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Read config from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
