//! Configuration management for GroupCore.
//!
//! This module handles loading and saving application configuration to/from
//! a JSON file. The config directory can be customized.
//!
//! Includes remote provider configuration:
//! - api_key: credential sent on every remote request (env override supported)
//! - base_url: remote provider API root
//! - timeout_secs: per-request timeout for remote calls

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GroupError, GroupResult};

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV_VAR: &str = "GROUPCORE_API_KEY";

/// Remote provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API credential sent as a header on every remote request
    #[serde(default)]
    pub api_key: String,
    /// Remote provider API root, no trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds for remote calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.provider.example.com/v2".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigData {
    /// Path to the database file
    #[serde(default)]
    pub database_file: String,
    /// Remote provider configuration
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Port for the HTTP surface (server feature)
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_server_port() -> u16 {
    8390
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            database_file: String::new(),
            remote: RemoteConfig::default(),
            server_port: default_server_port(),
        }
    }
}

/// Configuration manager
pub struct Config {
    config_dir: PathBuf,
    config_file: PathBuf,
    data: ConfigData,
}

impl Config {
    /// Create a new configuration manager rooted at `config_dir`.
    ///
    /// Loads `config.json` from the directory if present, otherwise writes a
    /// default one. A malformed file falls back to defaults rather than
    /// failing startup.
    pub fn new(config_dir: PathBuf) -> GroupResult<Self> {
        fs::create_dir_all(&config_dir)?;
        let config_file = config_dir.join("config.json");

        let data = if config_file.exists() {
            match fs::read_to_string(&config_file) {
                Ok(content) => serde_json::from_str(&content)
                    .unwrap_or_else(|_| Self::default_data(&config_dir)),
                Err(_) => Self::default_data(&config_dir),
            }
        } else {
            Self::default_data(&config_dir)
        };

        let config = Self {
            config_dir,
            config_file,
            data,
        };

        if !config.config_file.exists() {
            config.save()?;
        }

        Ok(config)
    }

    fn default_data(config_dir: &Path) -> ConfigData {
        let mut data = ConfigData::default();
        data.database_file = config_dir.join("groups.db").to_string_lossy().to_string();
        data
    }

    /// Save configuration to file
    pub fn save(&self) -> GroupResult<()> {
        let content = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    /// Get the configuration directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the database file path
    pub fn database_file(&self) -> &str {
        &self.data.database_file
    }

    /// Get the remote provider configuration
    pub fn remote(&self) -> &RemoteConfig {
        &self.data.remote
    }

    /// Get the server port
    pub fn server_port(&self) -> u16 {
        self.data.server_port
    }

    /// Resolve the remote API key, preferring the environment override.
    ///
    /// This is resolved once at startup and handed to the remote client as a
    /// constructor dependency; nothing else in the crate reads the key.
    pub fn resolve_api_key(&self) -> GroupResult<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }
        if self.data.remote.api_key.trim().is_empty() {
            return Err(GroupError::Config(format!(
                "remote API key not configured (set remote.api_key or {})",
                API_KEY_ENV_VAR
            )));
        }
        Ok(self.data.remote.api_key.clone())
    }

    /// Set the remote API key and persist it
    pub fn set_api_key(&mut self, api_key: &str) -> GroupResult<()> {
        self.data.remote.api_key = api_key.to_string();
        self.save()
    }

    /// Set the remote base URL and persist it
    pub fn set_base_url(&mut self, base_url: &str) -> GroupResult<()> {
        self.data.remote.base_url = base_url.trim_end_matches('/').to_string();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_default_config_file() {
        let temp = TempDir::new().unwrap();
        let config = Config::new(temp.path().to_path_buf()).unwrap();

        assert!(temp.path().join("config.json").exists());
        assert!(config.database_file().ends_with("groups.db"));
        assert_eq!(config.remote().timeout_secs, 30);
    }

    #[test]
    fn test_round_trips_saved_values() {
        let temp = TempDir::new().unwrap();
        {
            let mut config = Config::new(temp.path().to_path_buf()).unwrap();
            config.set_api_key("test-key-123").unwrap();
            config.set_base_url("https://api.example.test/v2/").unwrap();
        }

        let reloaded = Config::new(temp.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.remote().api_key, "test-key-123");
        // Trailing slash is normalized away
        assert_eq!(reloaded.remote().base_url, "https://api.example.test/v2");
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("config.json"), "{ not valid json").unwrap();

        let config = Config::new(temp.path().to_path_buf()).unwrap();
        assert_eq!(config.remote().timeout_secs, 30);
    }

    #[test]
    fn test_resolve_api_key_requires_configuration() {
        let temp = TempDir::new().unwrap();
        let config = Config::new(temp.path().to_path_buf()).unwrap();

        // No key configured and (presumably) no env override in tests
        if std::env::var(API_KEY_ENV_VAR).is_err() {
            assert!(config.resolve_api_key().is_err());
        }
    }
}
