//! Process configuration for the pages service.
//!
//! # Responsibility
//! - Load the JSON configuration file written by the host.
//! - Normalize debug channel lists into a lookup set.
//!
//! # Invariants
//! - Every field is optional; missing fields take defaults.
//! - Debug channel names are trimmed and lowercased, blanks dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_FILE_NAME: &str = "pages.sqlite3";
const DEFAULT_SWEEP_DELAY_SECS: u64 = 10 * 60;

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Enabled debug trace channels.
///
/// `request` and `response` trace every request; any other entry is matched
/// against the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DebugChannels(BTreeSet<String>);

impl DebugChannels {
    /// Parses a comma separated channel list.
    pub fn parse(value: &str) -> Self {
        Self(
            value
                .split(',')
                .map(|item| item.trim().to_ascii_lowercase())
                .filter(|item| !item.is_empty())
                .collect(),
        )
    }

    pub fn is_enabled(&self, channel: &str) -> bool {
        self.0.contains(channel.to_ascii_lowercase().as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for DebugChannels {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<DebugChannels> for String {
    fn from(value: DebugChannels) -> Self {
        value.0.into_iter().collect::<Vec<_>>().join(",")
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// SQLite database file.
    #[serde(rename = "dblocation")]
    pub db_location: PathBuf,
    pub debug: DebugChannels,
    /// `trace|debug|info|warn|error`; build default when absent.
    pub log_level: Option<String>,
    /// Absolute log directory; file logging stays off when absent.
    pub log_dir: Option<PathBuf>,
    pub sweep_initial_delay_secs: u64,
    /// `null` or `0` runs the reconciliation sweep once.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            db_location: PathBuf::from(DEFAULT_DB_FILE_NAME),
            debug: DebugChannels::default(),
            log_level: None,
            log_dir: None,
            sweep_initial_delay_secs: DEFAULT_SWEEP_DELAY_SECS,
            sweep_interval_secs: Some(DEFAULT_SWEEP_DELAY_SECS),
        }
    }
}

impl PagesConfig {
    /// Loads configuration from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn sweep_initial_delay(&self) -> Duration {
        Duration::from_secs(self.sweep_initial_delay_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
