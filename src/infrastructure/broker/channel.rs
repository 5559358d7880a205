//! Push-notification channel lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::codec::EventParser;
use super::connection::{BrokerConnection, WebSocketBrokerConnection};
use super::constants::{
    CONNECT_ACK_TIMEOUT, DEFAULT_BROKER_URL, HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT_MULTIPLIER,
    MAX_RECONNECT_ATTEMPTS, NOTIFICATION_DESTINATION, RECONNECT_DELAY_BASE,
};
use super::error::{BrokerError, BrokerResult};
use super::frame::{Command, Frame};
use super::heartbeat::HeartbeatManager;
use super::state::ChannelState;
use crate::domain::ports::{ChannelPort, CredentialStoragePort};
use crate::domain::services::EventBus;

/// Channel tuning knobs.
#[derive(Clone)]
pub struct ChannelConfig {
    pub broker_url: String,
    pub destination: String,
    pub heartbeat_interval: Duration,
    pub reconnect_delay_base: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            destination: NOTIFICATION_DESTINATION.to_string(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            reconnect_delay_base: RECONNECT_DELAY_BASE,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ChannelConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_broker_url(mut self, url: impl Into<String>) -> Self {
        self.broker_url = url.into();
        self
    }

    #[must_use]
    pub const fn with_reconnect_delay_base(mut self, delay: Duration) -> Self {
        self.reconnect_delay_base = delay;
        self
    }

    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// Channel lifecycle notices for interested observers (UI status line,
/// session controller logging).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatusEvent {
    /// Connected and subscribed to the notification destination.
    Connected,
    /// A reconnect attempt has been scheduled.
    Reconnecting { attempt: u32 },
    /// The transport dropped.
    Disconnected { reason: String },
    /// Every reconnect attempt failed; the channel stays down until
    /// `connect()` is called again.
    Exhausted { attempts: u32 },
}

type Connector = Arc<dyn Fn() -> Box<dyn BrokerConnection> + Send + Sync>;

struct LoopHandle {
    alive: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Owns the single persistent connection to the push broker.
///
/// Decoded events fan out through the [`EventBus`]; lifecycle notices go to
/// the status receiver returned at construction. On transport loss the
/// channel reconnects with linear backoff (`base * attempt`) up to the
/// configured attempt cap, then stays disconnected until `connect()` is
/// called again.
pub struct NotificationChannel {
    config: ChannelConfig,
    storage: Arc<dyn CredentialStoragePort>,
    bus: Arc<EventBus>,
    connector: Connector,
    state: Arc<Mutex<ChannelState>>,
    status_tx: mpsc::UnboundedSender<ChannelStatusEvent>,
    control: tokio::sync::Mutex<Option<LoopHandle>>,
}

impl NotificationChannel {
    /// Creates a channel backed by a websocket broker connection.
    #[must_use]
    pub fn new(
        config: ChannelConfig,
        storage: Arc<dyn CredentialStoragePort>,
        bus: Arc<EventBus>,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelStatusEvent>) {
        Self::with_connector(
            config,
            storage,
            bus,
            Arc::new(|| Box::new(WebSocketBrokerConnection::new()) as Box<dyn BrokerConnection>),
        )
    }

    /// Creates a channel with a custom transport factory.
    #[must_use]
    pub fn with_connector(
        config: ChannelConfig,
        storage: Arc<dyn CredentialStoragePort>,
        bus: Arc<EventBus>,
        connector: Connector,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelStatusEvent>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();

        (
            Self {
                config,
                storage,
                bus,
                connector,
                state: Arc::new(Mutex::new(ChannelState::Disconnected)),
                status_tx,
                control: tokio::sync::Mutex::new(None),
            },
            status_rx,
        )
    }

    /// Returns the current channel state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }
}

#[async_trait]
impl ChannelPort for NotificationChannel {
    async fn connect(&self) {
        let mut control = self.control.lock().await;

        if control.as_ref().is_some_and(|h| h.alive.load(Ordering::SeqCst)) {
            debug!("Channel already running");
            return;
        }

        // Reap a finished loop so two loops never overlap.
        if let Some(handle) = control.take() {
            handle.shutdown.notify_waiters();
            let _ = handle.task.await;
        }

        if !matches!(self.storage.get().await, Ok(Some(_))) {
            debug!("No access token stored, not connecting");
            return;
        }

        let alive = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Notify::new());

        *self.state.lock() = ChannelState::Connecting;

        let worker = ChannelWorker {
            config: self.config.clone(),
            storage: self.storage.clone(),
            bus: self.bus.clone(),
            connector: self.connector.clone(),
            state: self.state.clone(),
            status_tx: self.status_tx.clone(),
            alive: alive.clone(),
            shutdown: shutdown.clone(),
        };

        let task = tokio::spawn(async move {
            let alive = worker.alive.clone();
            let state = worker.state.clone();

            if std::panic::AssertUnwindSafe(worker.run())
                .catch_unwind()
                .await
                .is_err()
            {
                error!("Channel task panicked");
            }

            alive.store(false, Ordering::SeqCst);
            *state.lock() = ChannelState::Disconnected;
        });

        *control = Some(LoopHandle {
            alive,
            shutdown,
            task,
        });
    }

    async fn disconnect(&self) {
        let mut control = self.control.lock().await;

        if let Some(handle) = control.take() {
            handle.alive.store(false, Ordering::SeqCst);
            handle.shutdown.notify_waiters();
            let _ = handle.task.await;
            info!("Channel disconnected");
        }

        self.bus.clear();
        *self.state.lock() = ChannelState::Disconnected;
    }

    async fn reconnect(&self) {
        self.disconnect().await;
        self.connect().await;
    }

    fn is_running(&self) -> bool {
        self.state.lock().is_active()
    }
}

const fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    // Linear backoff; attempt starts at 1.
    Duration::from_millis(base.as_millis() as u64 * attempt as u64)
}

enum ReadOutcome {
    Shutdown,
    ConnectionLost(BrokerError),
}

struct ChannelWorker {
    config: ChannelConfig,
    storage: Arc<dyn CredentialStoragePort>,
    bus: Arc<EventBus>,
    connector: Connector,
    state: Arc<Mutex<ChannelState>>,
    status_tx: mpsc::UnboundedSender<ChannelStatusEvent>,
    alive: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl ChannelWorker {
    async fn run(&self) {
        let mut attempt: u32 = 0;

        while self.alive.load(Ordering::SeqCst) {
            self.set_state(ChannelState::Connecting);

            // Re-read each attempt so a refreshed credential is picked up.
            let Some(token) = self.access_token().await else {
                debug!("No access token available, stopping channel");
                break;
            };

            let mut conn = (self.connector)();

            // Interruptible so a disconnect during the handshake does not
            // wait out the ack timeout.
            let established = tokio::select! {
                result = self.establish(conn.as_mut(), &token) => result,
                () = self.shutdown.notified() => break,
            };

            match established {
                Ok(subscription_id) => {
                    attempt = 0;
                    self.set_state(ChannelState::Connected);
                    let _ = self.status_tx.send(ChannelStatusEvent::Connected);
                    info!(destination = %self.config.destination, "Notification channel connected");

                    match self.read_frames(conn.as_mut()).await {
                        ReadOutcome::Shutdown => {
                            self.teardown(conn.as_mut(), &subscription_id).await;
                            break;
                        }
                        ReadOutcome::ConnectionLost(e) => {
                            warn!(error = %e, "Connection lost");
                            let _ = self.status_tx.send(ChannelStatusEvent::Disconnected {
                                reason: e.to_string(),
                            });
                            conn.close().await;

                            if !e.should_reconnect() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to establish broker connection");
                    conn.close().await;

                    if !e.should_reconnect() {
                        let _ = self.status_tx.send(ChannelStatusEvent::Disconnected {
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }

            if !self.alive.load(Ordering::SeqCst) {
                break;
            }

            attempt += 1;
            if attempt > self.config.max_reconnect_attempts {
                error!(
                    attempts = attempt - 1,
                    "Reconnection attempts exhausted"
                );
                let _ = self.status_tx.send(ChannelStatusEvent::Exhausted {
                    attempts: attempt - 1,
                });
                break;
            }

            let delay = reconnect_delay(self.config.reconnect_delay_base, attempt);
            self.set_state(ChannelState::Reconnecting { attempt });
            let _ = self
                .status_tx
                .send(ChannelStatusEvent::Reconnecting { attempt });
            info!(attempt, delay_ms = delay.as_millis(), "Reconnecting to broker");

            tokio::select! {
                () = sleep(delay) => {}
                () = self.shutdown.notified() => break,
            }
        }

        self.alive.store(false, Ordering::SeqCst);
        self.set_state(ChannelState::Disconnected);
        debug!("Channel loop terminated");
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn establish(
        &self,
        conn: &mut dyn BrokerConnection,
        token: &str,
    ) -> BrokerResult<String> {
        conn.connect(&self.config.broker_url).await?;

        let heartbeat_ms = self.config.heartbeat_interval.as_millis() as u64;
        conn.send(&Frame::connect(token, heartbeat_ms)).await?;

        let ack = timeout(CONNECT_ACK_TIMEOUT, Self::next_frame(conn))
            .await
            .map_err(|_| BrokerError::timeout("CONNECTED"))??;

        match ack.command() {
            Command::Connected => {}
            Command::Error => {
                return Err(BrokerError::protocol(format!(
                    "broker rejected connection: {}",
                    ack.header("message").unwrap_or("unknown")
                )));
            }
            other => {
                return Err(BrokerError::protocol(format!(
                    "expected CONNECTED, got {other:?}"
                )));
            }
        }

        // No session id in the frame; the broker routes on the credential.
        let subscription_id = Uuid::new_v4().to_string();
        conn.send(&Frame::subscribe(&subscription_id, &self.config.destination))
            .await?;

        Ok(subscription_id)
    }

    async fn next_frame(conn: &mut dyn BrokerConnection) -> BrokerResult<Frame> {
        loop {
            if let Some(frame) = conn.receive().await? {
                return Ok(frame);
            }
        }
    }

    async fn read_frames(&self, conn: &mut dyn BrokerConnection) -> ReadOutcome {
        let (tick_tx, mut tick_rx) = mpsc::channel(1);
        let heartbeat = HeartbeatManager::new(self.config.heartbeat_interval);
        let _heartbeat_task = heartbeat.start(tick_tx);

        let idle_window = self
            .config
            .heartbeat_interval
            .mul_f64(HEARTBEAT_TIMEOUT_MULTIPLIER);
        let mut last_inbound = Instant::now();

        let outcome = loop {
            if !self.alive.load(Ordering::SeqCst) {
                break ReadOutcome::Shutdown;
            }

            tokio::select! {
                received = timeout_at(last_inbound + idle_window, conn.receive()) => {
                    match received {
                        Err(_) => break ReadOutcome::ConnectionLost(BrokerError::HeartbeatTimeout),
                        Ok(Err(e)) => break ReadOutcome::ConnectionLost(e),
                        Ok(Ok(None)) => {
                            last_inbound = Instant::now();
                        }
                        Ok(Ok(Some(frame))) => {
                            last_inbound = Instant::now();
                            self.handle_frame(frame);
                        }
                    }
                }
                Some(()) = tick_rx.recv() => {
                    if let Err(e) = conn.send_heartbeat().await {
                        break ReadOutcome::ConnectionLost(e);
                    }
                }
                () = self.shutdown.notified() => break ReadOutcome::Shutdown,
            }
        };

        heartbeat.stop();
        outcome
    }

    fn handle_frame(&self, frame: Frame) {
        match frame.command() {
            Command::Message => match EventParser::parse_event(frame.body()) {
                Ok(event) => {
                    debug!(correlation = ?event.correlation_id(), "Notification event received");
                    self.bus.publish(&event);
                }
                Err(e) => warn!(error = %e, "Dropping malformed notification frame"),
            },
            Command::Error => {
                warn!(
                    message = frame.header("message").unwrap_or("unknown"),
                    "Broker reported an error"
                );
            }
            other => debug!(command = ?other, "Unhandled frame"),
        }
    }

    async fn teardown(&self, conn: &mut dyn BrokerConnection, subscription_id: &str) {
        let _ = conn.send(&Frame::unsubscribe(subscription_id)).await;
        let _ = conn.send(&Frame::disconnect()).await;
        conn.close().await;
        debug!("Channel teardown complete");
    }

    async fn access_token(&self) -> Option<String> {
        match self.storage.get().await {
            Ok(pair) => pair.map(|p| p.access_token().to_string()),
            Err(e) => {
                warn!(error = %e, "Credential storage unavailable");
                None
            }
        }
    }

    fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    use mockall::Sequence;
    use serde_json::json;
    use test_case::test_case;

    use crate::domain::entities::CredentialPair;
    use crate::domain::ports::mocks::MockCredentialStorage;
    use crate::infrastructure::broker::connection::MockBrokerConnection;

    type Inject = mpsc::UnboundedSender<BrokerResult<Option<Frame>>>;

    struct ScriptedConnection {
        rx: mpsc::UnboundedReceiver<BrokerResult<Option<Frame>>>,
        loopback: Inject,
        sent: Arc<Mutex<Vec<Frame>>>,
        fail_connect: bool,
        connected: bool,
    }

    #[async_trait]
    impl BrokerConnection for ScriptedConnection {
        async fn connect(&mut self, _url: &str) -> BrokerResult<()> {
            if self.fail_connect {
                return Err(BrokerError::connection_failed("scripted failure"));
            }
            self.connected = true;
            Ok(())
        }

        async fn send(&mut self, frame: &Frame) -> BrokerResult<()> {
            self.sent.lock().push(frame.clone());

            // The scripted broker always accepts the handshake.
            if frame.command() == Command::Connect {
                let ack = Frame::new(Command::Connected).with_header("version", "1.2");
                let _ = self.loopback.send(Ok(Some(ack)));
            }
            Ok(())
        }

        async fn send_heartbeat(&mut self) -> BrokerResult<()> {
            Ok(())
        }

        async fn receive(&mut self) -> BrokerResult<Option<Frame>> {
            self.rx
                .recv()
                .await
                .unwrap_or_else(|| Err(BrokerError::closed("script ended")))
        }

        async fn close(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    /// Factory handing one scripted connection per connect attempt, with
    /// per-connection injection handles and sent-frame logs.
    #[derive(Default)]
    struct ScriptedBroker {
        injectors: Arc<Mutex<Vec<Inject>>>,
        sent: Arc<Mutex<Vec<Arc<Mutex<Vec<Frame>>>>>>,
        fail_connects: Arc<AtomicBool>,
    }

    impl ScriptedBroker {
        fn connector(&self) -> Connector {
            let injectors = self.injectors.clone();
            let sent_logs = self.sent.clone();
            let fail_connects = self.fail_connects.clone();

            Arc::new(move || {
                let (inject, rx) = mpsc::unbounded_channel();
                let sent = Arc::new(Mutex::new(Vec::new()));

                injectors.lock().push(inject.clone());
                sent_logs.lock().push(sent.clone());

                Box::new(ScriptedConnection {
                    rx,
                    loopback: inject,
                    sent,
                    fail_connect: fail_connects.load(Ordering::SeqCst),
                    connected: false,
                }) as Box<dyn BrokerConnection>
            })
        }

        fn connection_count(&self) -> usize {
            self.injectors.lock().len()
        }

        fn inject(&self, index: usize, item: BrokerResult<Option<Frame>>) {
            let _ = self.injectors.lock()[index].send(item);
        }

        fn sent_commands(&self, index: usize) -> Vec<Command> {
            self.sent.lock()[index]
                .lock()
                .iter()
                .map(Frame::command)
                .collect()
        }
    }

    fn test_config() -> ChannelConfig {
        ChannelConfig::new()
            .with_broker_url("wss://broker.test/ws")
            .with_reconnect_delay_base(Duration::from_millis(5))
            .with_max_reconnect_attempts(2)
            .with_heartbeat_interval(Duration::from_secs(10))
    }

    fn seeded_storage() -> Arc<MockCredentialStorage> {
        Arc::new(MockCredentialStorage::with_pair(
            CredentialPair::new_unchecked("access-0", "refresh-0"),
        ))
    }

    fn message_frame() -> Frame {
        let body = json!({
            "type": "payment-received",
            "payload": {
                "paymentId": "p1",
                "amount": "10.00",
                "currency": "USDC",
                "counterpartyId": "u7"
            }
        })
        .to_string();

        Frame::new(Command::Message)
            .with_header("destination", NOTIFICATION_DESTINATION)
            .with_body(body)
    }

    async fn next_status(
        rx: &mut mpsc::UnboundedReceiver<ChannelStatusEvent>,
    ) -> ChannelStatusEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for a status event")
            .expect("status channel closed")
    }

    #[test_case(1, 2)]
    #[test_case(2, 3)]
    #[test_case(3, 4)]
    fn test_backoff_is_linear_and_monotonic(earlier: u32, later: u32) {
        let base = Duration::from_secs(2);
        assert_eq!(reconnect_delay(base, earlier), base * earlier);
        assert!(reconnect_delay(base, earlier) < reconnect_delay(base, later));
    }

    #[tokio::test]
    async fn test_connect_subscribes_and_delivers_events() {
        let broker = ScriptedBroker::default();
        let bus = Arc::new(EventBus::new());
        let (channel, mut status_rx) = NotificationChannel::with_connector(
            test_config(),
            seeded_storage(),
            bus.clone(),
            broker.connector(),
        );

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let _subscription = bus.subscribe(move |event| {
            let _ = event_tx.send(event.clone());
        });

        channel.connect().await;
        assert_eq!(next_status(&mut status_rx).await, ChannelStatusEvent::Connected);
        assert!(channel.state().is_connected());
        assert_eq!(
            broker.sent_commands(0),
            vec![Command::Connect, Command::Subscribe]
        );

        broker.inject(0, Ok(Some(message_frame())));

        let event = timeout(Duration::from_secs(2), event_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.correlation_id(), Some("u7"));

        // Exactly once.
        assert!(event_rx.try_recv().is_err());

        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_while_running_is_noop() {
        let broker = ScriptedBroker::default();
        let (channel, mut status_rx) = NotificationChannel::with_connector(
            test_config(),
            seeded_storage(),
            Arc::new(EventBus::new()),
            broker.connector(),
        );

        channel.connect().await;
        assert_eq!(next_status(&mut status_rx).await, ChannelStatusEvent::Connected);

        channel.connect().await;

        assert_eq!(broker.connection_count(), 1);
        assert!(channel.is_running());

        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_without_credentials_is_noop() {
        let broker = ScriptedBroker::default();
        let (channel, _status_rx) = NotificationChannel::with_connector(
            test_config(),
            Arc::new(MockCredentialStorage::new()),
            Arc::new(EventBus::new()),
            broker.connector(),
        );

        channel.connect().await;

        assert_eq!(broker.connection_count(), 0);
        assert!(!channel.is_running());
    }

    #[tokio::test]
    async fn test_transport_close_resubscribes_without_duplicates() {
        let broker = ScriptedBroker::default();
        let bus = Arc::new(EventBus::new());
        let (channel, mut status_rx) = NotificationChannel::with_connector(
            test_config(),
            seeded_storage(),
            bus.clone(),
            broker.connector(),
        );

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let _subscription = bus.subscribe(move |event| {
            let _ = event_tx.send(event.clone());
        });

        channel.connect().await;
        assert_eq!(next_status(&mut status_rx).await, ChannelStatusEvent::Connected);

        broker.inject(0, Err(BrokerError::closed("flap")));

        assert!(matches!(
            next_status(&mut status_rx).await,
            ChannelStatusEvent::Disconnected { .. }
        ));
        assert_eq!(
            next_status(&mut status_rx).await,
            ChannelStatusEvent::Reconnecting { attempt: 1 }
        );
        assert_eq!(next_status(&mut status_rx).await, ChannelStatusEvent::Connected);

        assert_eq!(broker.connection_count(), 2);
        assert_eq!(
            broker.sent_commands(1),
            vec![Command::Connect, Command::Subscribe]
        );

        broker.inject(1, Ok(Some(message_frame())));

        let event = timeout(Duration::from_secs(2), event_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.correlation_id(), Some("u7"));
        assert!(event_rx.try_recv().is_err());

        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_is_graceful_and_idempotent() {
        let broker = ScriptedBroker::default();
        let bus = Arc::new(EventBus::new());
        let (channel, mut status_rx) = NotificationChannel::with_connector(
            test_config(),
            seeded_storage(),
            bus.clone(),
            broker.connector(),
        );

        let _subscription = bus.subscribe(|_| {});

        channel.connect().await;
        assert_eq!(next_status(&mut status_rx).await, ChannelStatusEvent::Connected);

        channel.disconnect().await;

        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert_eq!(
            broker.sent_commands(0),
            vec![
                Command::Connect,
                Command::Subscribe,
                Command::Unsubscribe,
                Command::Disconnect
            ]
        );
        assert!(bus.is_empty());

        // Second disconnect is a no-op.
        channel.disconnect().await;
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert_eq!(broker.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_attempts_exhaust_with_a_notice() {
        let broker = ScriptedBroker::default();
        broker.fail_connects.store(true, Ordering::SeqCst);
        let (channel, mut status_rx) = NotificationChannel::with_connector(
            test_config(),
            seeded_storage(),
            Arc::new(EventBus::new()),
            broker.connector(),
        );

        channel.connect().await;

        assert_eq!(
            next_status(&mut status_rx).await,
            ChannelStatusEvent::Reconnecting { attempt: 1 }
        );
        assert_eq!(
            next_status(&mut status_rx).await,
            ChannelStatusEvent::Reconnecting { attempt: 2 }
        );
        assert_eq!(
            next_status(&mut status_rx).await,
            ChannelStatusEvent::Exhausted { attempts: 2 }
        );

        // Initial attempt plus the two retries, then nothing.
        assert_eq!(broker.connection_count(), 3);

        // Give the loop a moment to settle into its terminal state.
        timeout(Duration::from_secs(2), async {
            while channel.is_running() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_explicit_reconnect_bypasses_backoff() {
        let broker = ScriptedBroker::default();
        let (channel, mut status_rx) = NotificationChannel::with_connector(
            test_config(),
            seeded_storage(),
            Arc::new(EventBus::new()),
            broker.connector(),
        );

        channel.connect().await;
        assert_eq!(next_status(&mut status_rx).await, ChannelStatusEvent::Connected);

        channel.reconnect().await;
        assert_eq!(next_status(&mut status_rx).await, ChannelStatusEvent::Connected);

        assert_eq!(broker.connection_count(), 2);

        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_malformed_frames_are_dropped_not_fatal() {
        let broker = ScriptedBroker::default();
        let bus = Arc::new(EventBus::new());
        let (channel, mut status_rx) = NotificationChannel::with_connector(
            test_config(),
            seeded_storage(),
            bus.clone(),
            broker.connector(),
        );

        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let _subscription = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        channel.connect().await;
        assert_eq!(next_status(&mut status_rx).await, ChannelStatusEvent::Connected);

        let garbage = Frame::new(Command::Message).with_body("not json at all");
        broker.inject(0, Ok(Some(garbage)));
        broker.inject(0, Ok(Some(message_frame())));

        timeout(Duration::from_secs(2), async {
            while seen.load(Ordering::SeqCst) == 0 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // Still connected, and only the valid frame was delivered.
        assert!(channel.state().is_connected());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_establish_handshake_order() {
        let worker = ChannelWorker {
            config: test_config(),
            storage: seeded_storage(),
            bus: Arc::new(EventBus::new()),
            connector: ScriptedBroker::default().connector(),
            state: Arc::new(Mutex::new(ChannelState::Disconnected)),
            status_tx: mpsc::unbounded_channel().0,
            alive: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
        };

        let mut conn = MockBrokerConnection::new();
        let mut seq = Sequence::new();

        conn.expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        conn.expect_send()
            .withf(|frame| {
                frame.command() == Command::Connect
                    && frame.header("Authorization") == Some("Bearer access-0")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        conn.expect_receive()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Some(Frame::new(Command::Connected))));
        conn.expect_send()
            .withf(|frame| {
                frame.command() == Command::Subscribe
                    && frame.header("destination") == Some(NOTIFICATION_DESTINATION)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let subscription_id = worker.establish(&mut conn, "access-0").await.unwrap();
        assert!(!subscription_id.is_empty());
    }

    #[tokio::test]
    async fn test_establish_rejection_is_not_retried() {
        let worker = ChannelWorker {
            config: test_config(),
            storage: seeded_storage(),
            bus: Arc::new(EventBus::new()),
            connector: ScriptedBroker::default().connector(),
            state: Arc::new(Mutex::new(ChannelState::Disconnected)),
            status_tx: mpsc::unbounded_channel().0,
            alive: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
        };

        let mut conn = MockBrokerConnection::new();
        conn.expect_connect().returning(|_| Ok(()));
        conn.expect_send().returning(|_| Ok(()));
        conn.expect_receive().returning(|| {
            Ok(Some(
                Frame::new(Command::Error).with_header("message", "bad credentials"),
            ))
        });

        let err = worker.establish(&mut conn, "access-0").await.unwrap_err();
        assert!(!err.should_reconnect());
    }
}
