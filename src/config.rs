//! Configuration loading and management.

use crate::error::{Error, Result};
use crate::models::ForestConfig;
use crate::trainer::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "PORT";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ensemble hyperparameters, shared by both targets.
    pub forest: ForestConfig,
    /// Train/test split.
    pub training: TrainingConfig,
    /// Where bundles are saved and loaded.
    pub store: StoreConfig,
    /// HTTP adapter binding.
    pub server: ServerConfig,
}

/// Model store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bundle directory.
    pub model_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
        }
    }
}

/// Server binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding a listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl EngineConfig {
    /// Create a new configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config file: {}", e)))?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;

        std::fs::write(&path, content).map_err(|e| {
            Error::Config(format!(
                "failed to write config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        Ok(())
    }

    /// Check every section for values training would reject.
    pub fn validate(&self) -> Result<()> {
        self.forest.validate()?;
        let ratio = self.training.test_ratio;
        if !(0.0..1.0).contains(&ratio) {
            return Err(Error::Config(format!(
                "training.test_ratio must be in [0, 1), got {}",
                ratio
            )));
        }
        Ok(())
    }

    /// Apply `PORT` from the environment, if set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(port) = std::env::var(PORT_ENV) {
            self.server.port = parse_port(&port)?;
        }
        Ok(self)
    }
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a port number, got {:?}", PORT_ENV, value)))
}

/// Load configuration from file or create default.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    if path.as_ref().exists() {
        EngineConfig::from_file(path)
    } else {
        Ok(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.forest.n_trees, 200);
        assert_eq!(config.forest.max_depth, 15);
        assert_eq!(config.training.test_ratio, 0.2);
        assert_eq!(config.store.model_dir, PathBuf::from("models"));
        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[forest]
n_trees = 50
seed = 7

[store]
model_dir = "/var/lib/transit/models"

[server]
port = 8080
        "#
        )
        .unwrap();

        let config = EngineConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.forest.n_trees, 50);
        assert_eq!(config.forest.seed, 7);
        // unspecified keys keep their defaults
        assert_eq!(config.forest.max_depth, 15);
        assert_eq!(config.training.split_seed, 42);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[training]\ntest_ratio = 1.5").unwrap();

        let err = EngineConfig::from_file(temp_file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = EngineConfig::default();
        config.forest.n_trees = 25;
        config.save_to_file(temp_file.path()).unwrap();

        assert_eq!(EngineConfig::from_file(temp_file.path()).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config("/nonexistent/transit.toml").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("8081").unwrap(), 8081);
        assert!(parse_port("http").is_err());
    }
}
