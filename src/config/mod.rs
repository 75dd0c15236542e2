/// Configuration management for relevo

use crate::routing::{FailoverBehavior, FailoverPolicy};
use crate::topology::{TopologySettings, REPLICATION_DESTINATIONS_KEY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main relevo configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Failover policy
    pub failover: FailoverConfig,
    /// Health tracking configuration
    pub health: HealthConfig,
    /// Topology refresh configuration
    pub topology: TopologyConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Failover policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Which operations may fail over to secondaries
    pub behavior: FailoverBehavior,
    /// Stripe reads round-robin across primary and secondaries
    pub read_from_all_servers: bool,
}

/// Health tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Longest time a failing endpoint goes without a probe, in seconds
    pub max_failover_check_period_sec: u64,
}

/// Topology refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Minimum time between two refresh attempts, in seconds
    pub refresh_interval_sec: u64,
    /// Document key holding the replication destinations on the primary
    pub document_key: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failover: FailoverConfig {
                behavior: FailoverBehavior::AllowReadsFromSecondaries,
                read_from_all_servers: false,
            },
            health: HealthConfig {
                max_failover_check_period_sec: 300,
            },
            topology: TopologyConfig {
                refresh_interval_sec: 300,
                document_key: REPLICATION_DESTINATIONS_KEY.to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.health.max_failover_check_period_sec == 0 {
            return Err(ConfigError::ValidationError(
                "max_failover_check_period_sec must be greater than 0".to_string(),
            ));
        }

        if self.topology.refresh_interval_sec == 0 {
            return Err(ConfigError::ValidationError(
                "refresh_interval_sec must be greater than 0".to_string(),
            ));
        }

        if self.topology.document_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "document_key cannot be empty".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log level: {}", self.logging.level)
            )),
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log format: {}", self.logging.format)
            )),
        }

        Ok(())
    }

    pub fn failover_policy(&self) -> FailoverPolicy {
        FailoverPolicy::new(self.failover.behavior, self.failover.read_from_all_servers)
    }

    pub fn max_failover_check_period(&self) -> Duration {
        Duration::from_secs(self.health.max_failover_check_period_sec)
    }

    pub fn topology_settings(&self) -> TopologySettings {
        TopologySettings {
            refresh_interval: Duration::from_secs(self.topology.refresh_interval_sec),
            document_key: self.topology.document_key.clone(),
        }
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P, profile: &str) -> Result<(), ConfigError> {
        let config = match profile {
            "primary-only" => Config {
                failover: FailoverConfig {
                    behavior: FailoverBehavior::FailImmediately,
                    read_from_all_servers: false,
                },
                ..Default::default()
            },
            "read-failover" => Config::default(),
            "read-striping" => Config {
                failover: FailoverConfig {
                    behavior: FailoverBehavior::AllowReadsFromSecondaries,
                    read_from_all_servers: true,
                },
                ..Default::default()
            },
            "full-failover" => Config {
                failover: FailoverConfig {
                    behavior: FailoverBehavior::AllowReadsFromSecondariesAndWritesToSecondaries,
                    read_from_all_servers: false,
                },
                ..Default::default()
            },
            _ => return Err(ConfigError::ValidationError(
                "Profile must be 'primary-only', 'read-failover', 'read-striping' or 'full-failover'".to_string(),
            )),
        };

        config.save_to_file(path)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.failover_policy(), FailoverPolicy::default());
        assert_eq!(config.max_failover_check_period(), Duration::from_secs(300));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.topology.refresh_interval_sec = 0;
        assert!(config.validate().is_err());

        config.topology.refresh_interval_sec = 60;
        assert!(config.validate().is_ok());

        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_behavior_names_in_toml() {
        let toml_str = r#"
            [failover]
            behavior = "allow_reads_from_secondaries_and_writes_to_secondaries"
            read_from_all_servers = true

            [health]
            max_failover_check_period_sec = 60

            [topology]
            refresh_interval_sec = 120
            document_key = "Raven/Replication/Destinations"

            [logging]
            level = "debug"
            format = "json"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        let policy = config.failover_policy();
        assert_eq!(
            policy.behavior(),
            FailoverBehavior::AllowReadsFromSecondariesAndWritesToSecondaries
        );
        assert!(policy.read_from_all_servers());
        assert_eq!(config.topology_settings().refresh_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_config_file_operations() {
        let temp_file = NamedTempFile::new().unwrap();

        Config::create_example_config(temp_file.path(), "read-striping").unwrap();
        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert!(loaded_config.failover.read_from_all_servers);

        assert!(Config::create_example_config(temp_file.path(), "bogus").is_err());
    }
}
