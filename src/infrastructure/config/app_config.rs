//! Application configuration.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::args::CliArgs;

const APP_NAME: &str = "paywire";
const APP_QUALIFIER: &str = "app";
const APP_ORGANIZATION: &str = "paywire";

const DEFAULT_API_URL: &str = "https://api.paywire.app/v1";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Credential storage strategy, selected once at process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Encrypted system keyring.
    #[default]
    Keyring,
    /// In-memory only; credentials do not survive the process.
    Memory,
}

/// Application configuration merged from file and CLI.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Backend API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Push broker websocket URL.
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    /// Credential storage backend.
    #[serde(default)]
    pub storage: StorageBackend,

    /// Push channel tuning.
    #[serde(default)]
    pub channel: ChannelTuning,
}

/// Push channel tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelTuning {
    /// Heartbeat interval in seconds.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Base reconnect delay in seconds; attempt k waits `base * k`.
    #[serde(default = "default_reconnect_base_secs")]
    pub reconnect_base_secs: u64,

    /// Reconnect attempt cap.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for ChannelTuning {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_base_secs: default_reconnect_base_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_broker_url() -> String {
    crate::infrastructure::broker::DEFAULT_BROKER_URL.to_string()
}

fn default_heartbeat_secs() -> u64 {
    10
}

fn default_reconnect_base_secs() -> u64 {
    2
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

impl AppConfig {
    /// Loads the configuration file, falling back to defaults when the file
    /// does not exist or does not parse.
    #[must_use]
    pub fn load(path: Option<&PathBuf>) -> Self {
        let effective = path
            .cloned()
            .or_else(Self::default_config_path);

        let Some(effective) = effective else {
            return Self::default();
        };

        match std::fs::read_to_string(&effective) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    debug!(error = %e, path = %effective.display(), "Config file did not parse, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: CliArgs) {
        if let Some(config_path) = args.config {
            self.config = Some(config_path);
        }
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(api_url) = args.api_url {
            self.api_url = api_url;
        }
        if let Some(broker_url) = args.broker_url {
            self.broker_url = broker_url;
        }
        if let Some(storage) = args.storage {
            self.storage = storage;
        }
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("paywire.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            api_url: default_api_url(),
            broker_url: default_broker_url(),
            storage: StorageBackend::Keyring,
            channel: ChannelTuning::default(),
        }
    }
}
