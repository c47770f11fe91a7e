//! kgsm-events configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transport::{DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_READ_BUFFER_SIZE, ListenerOptions};

const APP_DIR: &str = "kgsm-events";

/// Event listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Unix socket KGSM writes events to
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,

    /// Bytes requested per socket read
    #[serde(rename = "read-buffer-size")]
    pub read_buffer_size: usize,

    /// Longest accepted message; longer lines are dropped
    #[serde(rename = "max-message-bytes")]
    pub max_message_bytes: usize,

    /// Connect and write timeout for `ke emit`, in milliseconds
    #[serde(rename = "publish-timeout-ms")]
    pub publish_timeout_ms: u64,

    /// Default log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            publish_timeout_ms: 5000,
            log_level: None,
        }
    }
}

/// `<runtime dir>/kgsm/kgsm.sock`, falling back to the local data dir, then /tmp
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("kgsm")
        .join("kgsm.sock")
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(eyre::eyre!("read-buffer-size must be greater than zero"));
        }
        if self.max_message_bytes == 0 {
            return Err(eyre::eyre!("max-message-bytes must be greater than zero"));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(eyre::eyre!("socket-path must not be empty"));
        }
        Ok(())
    }

    /// Listener tuning derived from this config
    pub fn listener_options(&self) -> ListenerOptions {
        ListenerOptions {
            read_buffer_size: self.read_buffer_size,
            max_message_bytes: self.max_message_bytes,
        }
    }

    pub fn publish_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.publish_timeout_ms)
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {:#}", candidate.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are ignored here; `load` reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::candidates(),
        };
        paths
            .iter()
            .filter(|path| path.exists())
            .find_map(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    /// Implicit config locations, highest priority first
    fn candidates() -> Vec<PathBuf> {
        // Project-local: .kgsm-events.yml
        let mut candidates = vec![PathBuf::from(".kgsm-events.yml")];
        // User: ~/.config/kgsm-events/kgsm-events.yml
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(APP_DIR).join("kgsm-events.yml"));
        }
        candidates
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
