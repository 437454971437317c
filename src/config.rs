//! Runtime configuration loaded from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;
/// Default window for in-flight requests during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

pub const ENV_CERT_FILE: &str = "TLS_CERT_FILE";
pub const ENV_KEY_FILE: &str = "TLS_PRIVATE_KEY_FILE";
pub const ENV_PORT: &str = "WEBHOOK_PORT";
pub const ENV_SHUTDOWN_TIMEOUT: &str = "SHUTDOWN_TIMEOUT_SECS";

/// Invalid configuration value
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("WEBHOOK_PORT must be a port number (got {0:?})")]
    InvalidPort(String),

    #[error("SHUTDOWN_TIMEOUT_SECS must be a number of seconds (got {0:?})")]
    InvalidShutdownTimeout(String),
}

/// Webhook server configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub port: u16,
    pub shutdown_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            port: WEBHOOK_PORT,
            shutdown_timeout: Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        }
    }
}

impl WebhookConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables. Unset or empty variables
    /// fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };

        let shutdown_timeout = match get(ENV_SHUTDOWN_TIMEOUT) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidShutdownTimeout(raw))?,
            None => defaults.shutdown_timeout,
        };

        Ok(Self {
            cert_path: get(ENV_CERT_FILE).map_or(defaults.cert_path, PathBuf::from),
            key_path: get(ENV_KEY_FILE).map_or(defaults.key_path, PathBuf::from),
            port,
            shutdown_timeout,
        })
    }

    /// Address to bind on all interfaces
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
