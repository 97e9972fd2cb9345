//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `synhub.toml` in the working directory (or the file named by
//! `SYNHUB_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use synhub_app::config::{EngineConfig, SchedulerConfig};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool and locking.
    pub engine: EngineSection,
    /// Event scheduler.
    pub scheduler: SchedulerSection,
    /// Document persistence.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Number of action worker threads.
    pub workers: usize,
    /// Longest wait for an instance or device lock, in milliseconds.
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Seconds between heartbeats.
    pub heartbeat_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding the persisted document.
    pub document_path: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Discover the virtual/demo devices at startup.
    pub virtual_enabled: bool,
}

impl Config {
    /// Load configuration from `synhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SYNHUB_CONFIG").unwrap_or_else(|_| "synhub.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SYNHUB_WORKERS")
            && let Ok(workers) = val.parse()
        {
            self.engine.workers = workers;
        }
        if let Ok(val) = std::env::var("SYNHUB_HEARTBEAT_SECS")
            && let Ok(secs) = val.parse()
        {
            self.scheduler.heartbeat_secs = secs;
        }
        if let Ok(val) = std::env::var("SYNHUB_DOCUMENT") {
            self.storage.document_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SYNHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.workers == 0 {
            return Err(ConfigError::Validation("workers must be non-zero".to_string()));
        }
        if self.engine.lock_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "lock_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.scheduler.heartbeat_secs == 0 {
            return Err(ConfigError::Validation(
                "heartbeat_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.lock_timeout_ms)
    }

    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            workers: self.engine.workers,
            lock_timeout: self.lock_timeout(),
        }
    }

    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            heartbeat: Duration::from_secs(self.scheduler.heartbeat_secs),
            lock_timeout: self.lock_timeout(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            workers: 5,
            lock_timeout_ms: 1_000,
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self { heartbeat_secs: 60 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("synhub.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "synhubd=info,synhub_app=info,synhub_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.workers, 5);
        assert_eq!(config.engine.lock_timeout_ms, 1_000);
        assert_eq!(config.scheduler.heartbeat_secs, 60);
        assert_eq!(config.storage.document_path, PathBuf::from("synhub.json"));
        assert!(config.integrations.virtual_enabled);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.workers, 5);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [engine]
            workers = 2
            lock_timeout_ms = 250

            [scheduler]
            heartbeat_secs = 15

            [storage]
            document_path = '/var/lib/synhub/document.json'

            [logging]
            filter = 'debug'

            [integrations]
            virtual_enabled = false
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.workers, 2);
        assert_eq!(config.engine.lock_timeout_ms, 250);
        assert_eq!(config.scheduler.heartbeat_secs, 15);
        assert_eq!(
            config.storage.document_path,
            PathBuf::from("/var/lib/synhub/document.json")
        );
        assert_eq!(config.logging.filter, "debug");
        assert!(!config.integrations.virtual_enabled);
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [engine]
            workers = 8
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.workers, 8);
        assert_eq!(config.engine.lock_timeout_ms, 1_000);
        assert_eq!(config.scheduler.heartbeat_secs, 60);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.engine.workers, 5);
    }

    #[test]
    fn should_reject_zero_workers() {
        let mut config = Config::default();
        config.engine.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_heartbeat() {
        let mut config = Config::default();
        config.scheduler.heartbeat_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_share_lock_timeout_between_engine_and_scheduler() {
        let mut config = Config::default();
        config.engine.lock_timeout_ms = 300;
        config.scheduler.heartbeat_secs = 5;
        assert_eq!(config.engine_config().lock_timeout, Duration::from_millis(300));
        assert_eq!(config.scheduler_config().lock_timeout, Duration::from_millis(300));
        assert_eq!(config.scheduler_config().heartbeat, Duration::from_secs(5));
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
