use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use share_queue::client::ShareClientSettings;
use share_queue::executor::ExecutorSettings;
use share_queue::resolver::ResolverSettings;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

// -----------------------------------------------------------------------------
// Config (root)
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub ledger: LedgerConfig,
    pub resolver: ResolverSettings,
    pub share: ShareConfig,
    /// `User-Agent` strings picked at random per share.
    pub client_identities: Vec<String>,
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path.as_ref()) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

// -----------------------------------------------------------------------------
// ServerConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Bearer token for state-changing routes. Unset means loopback only.
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 30,
            api_token: None,
        }
    }
}

// -----------------------------------------------------------------------------
// LimitsConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_limit: u32,
    pub default_history: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_limit: 1_000,
            default_history: 50,
        }
    }
}

// -----------------------------------------------------------------------------
// LedgerConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub capacity: usize,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: share_queue::ledger::DEFAULT_CAPACITY,
            snapshot_path: None,
            snapshot_interval_secs: 60,
        }
    }
}

// -----------------------------------------------------------------------------
// ShareConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    #[serde(flatten)]
    pub client: ShareClientSettings,
    #[serde(flatten)]
    pub executor: ExecutorSettings,
}
