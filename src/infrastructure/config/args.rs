//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use super::app_config::{LogLevel, StorageBackend};

/// Command-line arguments for the session monitor.
#[derive(Debug, Parser)]
#[command(name = "paywire", version, about = "Custodial payments session monitor")]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "FILE")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Backend API base URL.
    #[arg(long, env = "PAYWIRE_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Push broker websocket URL.
    #[arg(long, env = "PAYWIRE_BROKER_URL", value_name = "URL")]
    pub broker_url: Option<String>,

    /// Credential storage backend.
    #[arg(long, value_enum)]
    pub storage: Option<StorageBackend>,
}
