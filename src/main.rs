use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use paywire::application::SessionController;
use paywire::domain::ports::CredentialStoragePort;
use paywire::domain::services::EventBus;
use paywire::infrastructure::api::{ApiClient, ReqwestTransport};
use paywire::infrastructure::broker::{ChannelConfig, NotificationChannel};
use paywire::infrastructure::config::{AppConfig, CliArgs, StorageBackend};
use paywire::infrastructure::storage::{InMemoryCredentialStorage, KeyringCredentialStorage};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    Ok(())
}

fn load_config() -> AppConfig {
    let args = CliArgs::parse();
    let mut config = AppConfig::load(args.config.as_ref());
    config.merge_with_args(args);
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let config = load_config();
    init_logging(&config)?;

    info!(version = paywire::VERSION, "Starting paywire session monitor");

    let storage: Arc<dyn CredentialStoragePort> = match config.storage {
        StorageBackend::Keyring => Arc::new(KeyringCredentialStorage::new()),
        StorageBackend::Memory => Arc::new(InMemoryCredentialStorage::new()),
    };

    let transport = Arc::new(ReqwestTransport::new()?);
    let (api, signal_rx) = ApiClient::new(transport, storage.clone(), config.api_url.clone());

    let bus = Arc::new(EventBus::new());
    let channel_config = ChannelConfig::new()
        .with_broker_url(config.broker_url.clone())
        .with_heartbeat_interval(Duration::from_secs(config.channel.heartbeat_secs))
        .with_reconnect_delay_base(Duration::from_secs(config.channel.reconnect_base_secs))
        .with_max_reconnect_attempts(config.channel.max_reconnect_attempts);
    let (channel, mut status_rx) =
        NotificationChannel::new(channel_config, storage.clone(), bus.clone());

    let controller = Arc::new(SessionController::new(
        storage,
        Arc::new(api),
        Arc::new(channel),
    ));
    let _signal_listener = controller.clone().spawn_signal_listener(signal_rx);

    let _events = bus.subscribe(|event| {
        info!(
            correlation = ?event.correlation_id(),
            kind = ?event.kind(),
            "Push notification"
        );
    });

    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            info!(?status, "Channel status");
        }
    });

    controller.boot().await;
    info!(status = %controller.status(), "Session ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    controller.logout().await;

    Ok(())
}
