//! Configuration module
//!
//! Handles loading and saving burstnet configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::{DEFAULT_PORT, PEER_NAME_MAX};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Peer identity announced to listeners (host name if not set)
    pub peer_name: Option<String>,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface to bind to (default: all)
    pub bind_address: Option<String>,
    /// Listeners to send bursts to
    #[serde(default)]
    pub targets: Vec<String>,
    /// Longest single receive wait in ms
    #[serde(default = "default_recv_wait")]
    pub recv_wait_ms: u64,
    /// Silence before a peer is dropped, in ms
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout_ms: u64,
    /// Time between liveness sweeps in ms
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
    /// Heartbeat interval in ms
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_recv_wait() -> u64 {
    500
}

fn default_peer_timeout() -> u64 {
    3000
}

fn default_sweep_interval() -> u64 {
    1000
}

fn default_heartbeat_interval() -> u64 {
    250
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: None,
            targets: Vec::new(),
            recv_wait_ms: default_recv_wait(),
            peer_timeout_ms: default_peer_timeout(),
            sweep_interval_ms: default_sweep_interval(),
            heartbeat_interval_ms: default_heartbeat_interval(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("burstnet/config.toml")),
            Some(PathBuf::from("./burstnet.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the peer name, falling back to the host name and then to a
    /// random one. The result always fits in a packet header.
    pub fn peer_name(&self) -> String {
        let name = self
            .general
            .peer_name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| {
                hostname::get()
                    .ok()
                    .map(|h| h.to_string_lossy().to_string())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or_else(|| format!("peer-{}", uuid::Uuid::new_v4().simple()));

        truncate_name(&name)
    }
}

/// Cut a name to `PEER_NAME_MAX` bytes on a char boundary
fn truncate_name(name: &str) -> String {
    let mut end = name.len().min(PEER_NAME_MAX);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            peer_name: Some("player-one".to_string()),
            verbose: false,
        },
        network: NetworkConfig {
            targets: vec!["192.168.1.20".to_string(), "192.168.1.21:11011".to_string()],
            ..Default::default()
        },
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.port, DEFAULT_PORT);
        assert_eq!(config.network.peer_timeout_ms, 3000);
        assert_eq!(config.network.sweep_interval_ms, 1000);
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.network.targets.push("10.0.0.2".to_string());
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.network.port, config.network.port);
        assert_eq!(loaded.network.targets, config.network.targets);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[network]\nport = 9000\n").unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.network.recv_wait_ms, 500);
        assert!(config.general.peer_name.is_none());
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.general.peer_name.as_deref(), Some("player-one"));
        assert_eq!(parsed.network.targets.len(), 2);
    }

    #[test]
    fn test_peer_name_fits_header() {
        let mut config = Config::default();
        config.general.peer_name = Some("é".repeat(PEER_NAME_MAX));
        let name = config.peer_name();
        assert!(name.len() <= PEER_NAME_MAX);
        assert!(!name.is_empty());

        config.general.peer_name = None;
        let name = config.peer_name();
        assert!(!name.is_empty() && name.len() <= PEER_NAME_MAX);
    }
}
