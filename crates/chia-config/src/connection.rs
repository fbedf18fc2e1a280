//! Daemon connection options
//!
//! Every field is optional in the TOML file; missing fields take the values
//! of a stock mainnet install:
//!
//! ```toml
//! host = "localhost"
//! port = 55400
//! key_path = "~/.chia/mainnet/config/ssl/daemon/private_daemon.key"
//! cert_path = "~/.chia/mainnet/config/ssl/daemon/private_daemon.crt"
//! timeout_seconds = 30
//! service_name = "chia_repl"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::paths::expand_home;

/// Errors from loading or validating connection options
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed to read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`ConnectionConfig`]
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Options parsed but are unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Options for one daemon connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Daemon host name or address
    pub host: String,
    /// Daemon WebSocket port
    pub port: u16,
    /// PEM private key for the client certificate, `~` allowed
    pub key_path: PathBuf,
    /// PEM client certificate chain, `~` allowed
    pub cert_path: PathBuf,
    /// How long a command waits for its reply
    pub timeout_seconds: f64,
    /// Name this client registers under and stamps as `origin`
    pub service_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 55400,
            key_path: PathBuf::from("~/.chia/mainnet/config/ssl/daemon/private_daemon.key"),
            cert_path: PathBuf::from("~/.chia/mainnet/config/ssl/daemon/private_daemon.crt"),
            timeout_seconds: 30.0,
            service_name: chia_protocol::DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Load and validate options from a TOML file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        debug!("Loaded connection config from {}", path.display());
        Ok(config)
    }

    /// Like [`ConnectionConfig::load`], but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(
                "No config file at {}, using default connection options",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Reject options that cannot produce a working connection
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".into()));
        }
        if !self.timeout_seconds.is_finite() || self.timeout_seconds <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "timeout_seconds must be a positive number, got {}",
                self.timeout_seconds
            )));
        }
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid("service_name must not be empty".into()));
        }
        Ok(())
    }

    /// Daemon endpoint, always TLS
    pub fn url(&self) -> String {
        format!("wss://{}:{}", self.host, self.port)
    }

    /// Reply timeout as a [`Duration`]
    ///
    /// Callers should [`validate`](Self::validate) first; invalid values
    /// saturate instead of panicking.
    pub fn response_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or(Duration::MAX)
    }

    /// Private key path with `~` expanded
    pub fn key_file(&self) -> PathBuf {
        expand_home(&self.key_path)
    }

    /// Certificate path with `~` expanded
    pub fn cert_file(&self) -> PathBuf {
        expand_home(&self.cert_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_point_at_local_mainnet_daemon() {
        let config = ConnectionConfig::default();
        assert_eq!(config.url(), "wss://localhost:55400");
        assert_eq!(config.response_timeout(), Duration::from_secs(30));
        assert_eq!(config.service_name, "chia_repl");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let file = write_config("host = \"10.0.0.7\"\ntimeout_seconds = 1.5\n");
        let config = ConnectionConfig::load(file.path()).unwrap();

        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 55400);
        assert_eq!(config.response_timeout(), Duration::from_millis(1500));
        assert_eq!(config.url(), "wss://10.0.0.7:55400");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConnectionConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ConnectionConfig::default());
    }

    #[test]
    fn missing_file_is_an_error_for_strict_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConnectionConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let file = write_config("port = \"not a number\"\n");
        let err = ConnectionConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let file = write_config("timeout_seconds = 0\n");
        let err = ConnectionConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let mut config = ConnectionConfig {
            port: 0,
            ..ConnectionConfig::default()
        };
        assert!(config.validate().is_err());

        config.port = 55400;
        config.host = "  ".into();
        assert!(config.validate().is_err());

        config.host = "localhost".into();
        config.timeout_seconds = f64::NAN;
        assert!(config.validate().is_err());

        config.timeout_seconds = 5.0;
        config.service_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn identity_paths_expand_home() {
        let home = dirs::home_dir().expect("home directory");
        let config = ConnectionConfig::default();
        assert_eq!(
            config.key_file(),
            home.join(".chia/mainnet/config/ssl/daemon/private_daemon.key")
        );
        assert_eq!(
            config.cert_file(),
            home.join(".chia/mainnet/config/ssl/daemon/private_daemon.crt")
        );
    }
}
