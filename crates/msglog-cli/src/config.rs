//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use msglog_core::{DEFAULT_MAX_RECORD_BYTES, DEFAULT_RECORD_TIMEOUT, ReaderOptions};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds to wait for any single binary record before giving up on the file.
    pub record_timeout_secs: u64,
    /// Largest binary record accepted, in bytes.
    pub max_record_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            record_timeout_secs: DEFAULT_RECORD_TIMEOUT.as_secs(),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // MSGLOG_RECORD_TIMEOUT_SECS, MSGLOG_MAX_RECORD_BYTES
        figment = figment.merge(Env::prefixed("MSGLOG_"));

        figment.extract()
    }

    pub const fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            record_timeout: Duration::from_secs(self.record_timeout_secs),
            max_record_bytes: self.max_record_bytes,
        }
    }
}

/// Returns the platform-specific config directory for msglog.
///
/// On Linux: `~/.config/msglog`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("msglog"))
}
