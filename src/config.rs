//! Configuration management for TallyChain

use crate::error::ChainError;
use crate::miner::Difficulty;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Largest peer chain response body accepted, in bytes.
    #[serde(default = "default_max_chain_bytes")]
    pub max_chain_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bootstrap_peers: Vec::new(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_chain_bytes: default_max_chain_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    /// Reward recipient. A random identifier is generated when empty.
    #[serde(default)]
    pub node_id: String,
    #[serde(default = "default_reward")]
    pub reward: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            node_id: String::new(),
            reward: default_reward(),
        }
    }
}

fn default_api_port() -> u16 {
    5000
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_max_chain_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_difficulty() -> u8 {
    4
}

fn default_reward() -> u64 {
    1
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        if !(1..=16).contains(&self.miner.difficulty) {
            return Err(ChainError::ConfigError(format!(
                "miner.difficulty must be between 1 and 16, got {}",
                self.miner.difficulty
            )));
        }
        if self.network.fetch_timeout_secs == 0 {
            return Err(ChainError::ConfigError(
                "network.fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.network.max_chain_bytes == 0 {
            return Err(ChainError::ConfigError(
                "network.max_chain_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn difficulty(&self) -> Result<Difficulty, ChainError> {
        Difficulty::new(self.miner.difficulty)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.network.fetch_timeout_secs)
    }
}

/// Load `config.toml` from the working directory.
pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Load configuration from `path`. A missing file yields the defaults.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let config_str = match fs::read_to_string(path.as_ref()) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let config: Config = toml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.network.api_port, 5000);
        assert_eq!(config.network.fetch_timeout_secs, 5);
        assert_eq!(config.network.max_chain_bytes, 16 * 1024 * 1024);
        assert!(config.network.bootstrap_peers.is_empty());
        assert_eq!(config.miner.difficulty, 4);
        assert_eq!(config.miner.reward, 1);
        assert!(config.miner.node_id.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[network]\napi_port = 5001\nbootstrap_peers = [\"127.0.0.1:5000\"]\n\n[miner]\ndifficulty = 3"
        )
        .unwrap();

        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.network.api_port, 5001);
        assert_eq!(config.network.bootstrap_peers, vec!["127.0.0.1:5000".to_string()]);
        assert_eq!(config.network.fetch_timeout_secs, 5);
        assert_eq!(config.difficulty().unwrap().leading_zeros(), 3);
        assert_eq!(config.miner.reward, 1);
    }

    #[test]
    fn test_out_of_range_difficulty_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[miner]\ndifficulty = 0").unwrap();
        assert!(matches!(
            load_config_from(file.path()),
            Err(ChainError::ConfigError(_))
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.network.fetch_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_body_limit_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[network]\nmax_chain_bytes = 0").unwrap();
        assert!(matches!(
            load_config_from(file.path()),
            Err(ChainError::ConfigError(_))
        ));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[network\napi_port = ").unwrap();
        assert!(matches!(
            load_config_from(file.path()),
            Err(ChainError::ConfigError(_))
        ));
    }
}
