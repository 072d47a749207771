//! Primary-store connection settings
//!
//! Presence of an endpoint + key enables remote mode for the whole
//! process; absence means local-only mode. Settings come from the
//! environment first, then an optional TOML config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable naming the store endpoint
pub const ENV_STORE_URL: &str = "MARQUEE_STORE_URL";
/// Environment variable naming the store API key
pub const ENV_STORE_KEY: &str = "MARQUEE_STORE_KEY";

/// Connection settings for the primary store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base endpoint, e.g. `https://abc.example.co`
    pub endpoint: String,
    /// API key sent with every request
    pub api_key: String,
}

/// Process configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote mode is enabled iff this is present
    #[serde(default)]
    pub store: Option<StoreConfig>,
    /// Override for the on-device data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> crate::Result<Config> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Resolve configuration: environment wins, then the config file if
    /// present. A malformed file is logged and treated as absent.
    pub fn load(config_file: Option<&Path>) -> Config {
        let mut config = match config_file {
            Some(path) if path.exists() => match Config::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed config file");
                    Config::default()
                }
            },
            _ => Config::default(),
        };

        if let (Ok(endpoint), Ok(api_key)) =
            (std::env::var(ENV_STORE_URL), std::env::var(ENV_STORE_KEY))
        {
            config.store = Some(StoreConfig { endpoint, api_key });
        }

        config
    }

    /// True when a primary store is configured
    pub fn remote_mode(&self) -> bool {
        self.store.is_some()
    }
}
