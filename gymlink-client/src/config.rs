//! Client-side configuration loading
//!
//! Loads defaults and remote aliases from the gymlink config file.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use gymlink_utils::{paths, GymError, Result};

/// Address used when neither the caller nor the config names one
pub const DEFAULT_ADDR: &str = "tcp://127.0.0.1:5001";

/// Client configuration (`$XDG_CONFIG_HOME/gymlink/config.toml`)
///
/// ```toml
/// address = "lab"
/// env = "CartPole-v0"
/// read_timeout_secs = 30
///
/// [remotes]
/// lab = "tcp://10.0.0.7:5001"
/// ```
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default server address or remote alias
    pub address: Option<String>,
    /// Default environment name
    pub env: Option<String>,
    /// Bound on each blocking read, in seconds
    pub read_timeout_secs: Option<u64>,
    /// Named server addresses
    pub remotes: HashMap<String, String>,
}

impl ClientConfig {
    /// Load from the default config file
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| GymError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| GymError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Pick the address to dial, expanding remote aliases
    ///
    /// An explicit request wins over the configured default, which wins over
    /// [`DEFAULT_ADDR`].
    pub fn resolve_address(&self, requested: Option<&str>) -> String {
        let addr = requested
            .or(self.address.as_deref())
            .unwrap_or(DEFAULT_ADDR);
        match self.remotes.get(addr) {
            Some(remote) => {
                tracing::debug!("Resolved remote alias '{}' to {}", addr, remote);
                remote.clone()
            }
            None => addr.to_string(),
        }
    }

    /// Pick the environment name, failing if none is known
    pub fn resolve_env(&self, requested: Option<&str>) -> Result<String> {
        requested
            .or(self.env.as_deref())
            .map(str::to_string)
            .ok_or_else(|| GymError::config("no environment name given"))
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}
