use std::time::Duration;

pub const DEFAULT_BROKER_URL: &str = "wss://push.paywire.app/ws";

/// The single per-user destination the backend routes all push events to.
/// The user identity is implicit in the connection credential.
pub const NOTIFICATION_DESTINATION: &str = "/user/queue/notifications";

pub const STOMP_VERSION: &str = "1.2";

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const HEARTBEAT_TIMEOUT_MULTIPLIER: f64 = 1.5;

pub const RECONNECT_DELAY_BASE: Duration = Duration::from_secs(2);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const CONNECT_ACK_TIMEOUT: Duration = Duration::from_secs(10);
