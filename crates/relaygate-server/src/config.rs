//! Configuration management for relaygate.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use relaygate_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("relaygate.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "RELAYGATE";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Policy engine settings
    #[serde(default)]
    pub policy: PolicySettings,

    /// Relay workflow limits
    #[serde(default)]
    pub relays: RelaySettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Policy engine settings.
///
/// Environment variable: `RELAYGATE_POLICY__MAX_EXPAND_DEPTH`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PolicySettings {
    /// Longest relation path an expand request may name.
    #[serde(default = "default_max_expand_depth")]
    pub max_expand_depth: u32,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_expand_depth: default_max_expand_depth(),
        }
    }
}

fn default_max_expand_depth() -> u32 {
    6
}

/// Limits applied by the relay write workflows.
///
/// # Example YAML Configuration
///
/// ```yaml
/// relays:
///   default_user_limit: 10
///   max_owned_relays: 25
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RelaySettings {
    /// Membership capacity stored on newly created relays.
    #[serde(default = "default_user_limit")]
    pub default_user_limit: u32,

    /// Relays one user may hold owner rank on.
    #[serde(default = "default_max_owned_relays")]
    pub max_owned_relays: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            default_user_limit: default_user_limit(),
            max_owned_relays: default_max_owned_relays(),
        }
    }
}

fn default_user_limit() -> u32 {
    10
}

fn default_max_owned_relays() -> u32 {
    25
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type. Only "memory" is available.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Optimistic commit attempts before a write reports a conflict.
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            max_write_attempts: default_max_write_attempts(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_max_write_attempts() -> u32 {
    3
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `RELAYGATE_` and use `__` as
    /// separator. For example:
    /// - `RELAYGATE_RELAYS__MAX_OWNED_RELAYS=5` overrides `relays.max_owned_relays`
    /// - `RELAYGATE_LOGGING__JSON=true` overrides `logging.json`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            // RELAYGATE_POLICY__MAX_EXPAND_DEPTH -> policy.max_expand_depth
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.policy.max_expand_depth == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "policy.max_expand_depth must be greater than 0".to_string(),
            });
        }

        if self.relays.default_user_limit == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "relays.default_user_limit must be greater than 0".to_string(),
            });
        }

        if self.relays.max_owned_relays == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "relays.max_owned_relays must be greater than 0".to_string(),
            });
        }

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "storage.backend must be one of: {:?}, got: {}",
                    valid_backends, self.storage.backend
                ),
            });
        }

        if self.storage.max_write_attempts == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "storage.max_write_attempts must be greater than 0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_can_load_config_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
policy:
  max_expand_depth: 4

relays:
  default_user_limit: 50
  max_owned_relays: 3

storage:
  backend: memory
  max_write_attempts: 5

logging:
  level: debug
  json: true
"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();

        assert_eq!(config.policy.max_expand_depth, 4);
        assert_eq!(config.relays.default_user_limit, 50);
        assert_eq!(config.relays.max_owned_relays, 3);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.max_write_attempts, 5);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    #[serial]
    fn test_can_override_config_with_env_vars() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
relays:
  default_user_limit: 20
  max_owned_relays: 25
"#
        )
        .unwrap();

        std::env::set_var("RELAYGATE_RELAYS__MAX_OWNED_RELAYS", "2");
        std::env::set_var("RELAYGATE_LOGGING__LEVEL", "warn");

        let config = ServerConfig::load(file.path()).unwrap();

        std::env::remove_var("RELAYGATE_RELAYS__MAX_OWNED_RELAYS");
        std::env::remove_var("RELAYGATE_LOGGING__LEVEL");

        assert_eq!(config.relays.max_owned_relays, 2); // Overridden by env
        assert_eq!(config.relays.default_user_limit, 20); // From file
        assert_eq!(config.logging.level, "warn"); // Overridden by env
    }

    #[test]
    fn test_config_validation_catches_errors() {
        let mut config = ServerConfig::default();
        config.storage.backend = "postgres".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.backend"));

        let mut config = ServerConfig::default();
        config.policy.max_expand_depth = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_expand_depth"));

        let mut config = ServerConfig::default();
        config.relays.max_owned_relays = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_owned_relays"));

        let mut config = ServerConfig::default();
        config.storage.max_write_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_write_attempts"));

        let mut config = ServerConfig::default();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_invalid_config_returns_clear_error() {
        let result = ServerConfig::load("/nonexistent/path/relaygate.yaml");
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));
        assert!(err.to_string().contains("not found"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: syntax: [").unwrap();

        let err = ServerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Load(_)));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.policy.max_expand_depth, 6);
        assert_eq!(config.relays.default_user_limit, 10);
        assert_eq!(config.relays.max_owned_relays, 25);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.max_write_attempts, 3);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    #[serial]
    fn test_from_env_loads_defaults_with_env_overrides() {
        std::env::set_var("RELAYGATE_POLICY__MAX_EXPAND_DEPTH", "3");

        let config = ServerConfig::from_env().unwrap();

        std::env::remove_var("RELAYGATE_POLICY__MAX_EXPAND_DEPTH");

        assert_eq!(config.policy.max_expand_depth, 3);
        assert_eq!(config.relays.max_owned_relays, 25); // default
    }
}
