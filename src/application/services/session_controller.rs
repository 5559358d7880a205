//! Session state machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::entities::{CredentialPair, Profile, SessionSignal, SessionStatus};
use crate::domain::errors::ApiError;
use crate::domain::ports::{AccountPort, ChannelPort, CredentialStoragePort};

/// Owns the session lifecycle: boots from stored credentials, reacts to
/// login/logout and to expiry signals from the API client, and opens or
/// closes the push channel on every transition.
pub struct SessionController {
    storage: Arc<dyn CredentialStoragePort>,
    account: Arc<dyn AccountPort>,
    channel: Arc<dyn ChannelPort>,
    status_tx: watch::Sender<SessionStatus>,
    profile: Mutex<Option<Profile>>,
    logout_in_progress: AtomicBool,
}

impl SessionController {
    /// Creates a controller in the `Loading` state.
    pub fn new(
        storage: Arc<dyn CredentialStoragePort>,
        account: Arc<dyn AccountPort>,
        channel: Arc<dyn ChannelPort>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Loading);

        Self {
            storage,
            account,
            channel,
            status_tx,
            profile: Mutex::new(None),
            logout_in_progress: AtomicBool::new(false),
        }
    }

    /// Returns the current session status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    /// Returns a watch handle over status transitions.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Returns the cached profile of the authenticated user.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.profile.lock().clone()
    }

    /// Restores the session from stored credentials.
    ///
    /// `Loading` until the stored pair is validated against the backend;
    /// then `Authenticated` (and the channel opens) or `Unauthenticated`.
    pub async fn boot(&self) {
        self.set_status(SessionStatus::Loading);

        let pair = match self.storage.get().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Credential storage unavailable at boot");
                None
            }
        };

        if pair.is_none() {
            debug!("No stored credentials");
            self.set_status(SessionStatus::Unauthenticated);
            return;
        }

        match self.account.fetch_profile().await {
            Ok(profile) => {
                info!(user_id = %profile.id(), "Session restored");
                *self.profile.lock() = Some(profile);
                self.set_status(SessionStatus::Authenticated);
                self.channel.connect().await;
            }
            Err(ApiError::SessionExpired) => {
                info!("Stored credentials are no longer valid");
                self.set_status(SessionStatus::Unauthenticated);
            }
            Err(e) => {
                // Transient backend failure: the stored pair stays for the
                // next boot, but this run starts signed out.
                warn!(error = %e, "Could not validate stored credentials");
                self.set_status(SessionStatus::Unauthenticated);
            }
        }
    }

    /// Completes a login or registration: persists the pair issued by the
    /// backend, fetches the profile and enters `Authenticated`.
    ///
    /// # Errors
    /// Returns the profile-fetch failure; the session stays
    /// `Unauthenticated` in that case.
    pub async fn login(&self, pair: CredentialPair) -> Result<Profile, ApiError> {
        if let Err(e) = self.storage.set(&pair).await {
            warn!(error = %e, "Failed to persist credentials");
        }

        match self.account.fetch_profile().await {
            Ok(profile) => {
                info!(user_id = %profile.id(), "Signed in");
                *self.profile.lock() = Some(profile.clone());
                self.set_status(SessionStatus::Authenticated);
                self.channel.connect().await;
                Ok(profile)
            }
            Err(e) => {
                self.set_status(SessionStatus::Unauthenticated);
                Err(e)
            }
        }
    }

    /// Ends the session: closes the channel, destroys stored credentials
    /// and enters `Unauthenticated`.
    ///
    /// Idempotent; a logout already in progress is not started twice.
    pub async fn logout(&self) {
        if self.logout_in_progress.swap(true, Ordering::SeqCst) {
            debug!("Logout already in progress");
            return;
        }

        info!("Logging out");

        self.channel.disconnect().await;

        if let Err(e) = self.storage.clear().await {
            warn!(error = %e, "Failed to clear credentials during logout");
        }

        *self.profile.lock() = None;
        self.set_status(SessionStatus::Unauthenticated);
        self.logout_in_progress.store(false, Ordering::SeqCst);
    }

    /// Reopens the push channel after the app returns to the foreground.
    ///
    /// No-op unless authenticated; the channel itself ignores the call when
    /// it is already running.
    pub async fn on_foreground(&self) {
        if self.status().is_authenticated() {
            self.channel.connect().await;
        }
    }

    /// Spawns the listener that turns `SessionSignal::Expired` from the API
    /// client into a forced logout.
    pub fn spawn_signal_listener(
        self: Arc<Self>,
        mut signal_rx: mpsc::UnboundedReceiver<SessionSignal>,
    ) -> JoinHandle<()> {
        let controller = self;

        tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                match signal {
                    SessionSignal::Expired => {
                        info!("Session expired, forcing logout");
                        controller.logout().await;
                    }
                }
            }
            debug!("Session signal channel closed");
        })
    }

    fn set_status(&self, status: SessionStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous != status {
            debug!(from = %previous, to = %status, "Session status changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;

    use crate::domain::ports::mocks::{MockAccountPort, MockChannel, MockCredentialStorage};

    fn stored_pair() -> CredentialPair {
        CredentialPair::new_unchecked("access-0", "refresh-0")
    }

    fn controller(
        storage: Arc<MockCredentialStorage>,
        account: Arc<MockAccountPort>,
        channel: Arc<MockChannel>,
    ) -> SessionController {
        SessionController::new(storage, account, channel)
    }

    #[tokio::test]
    async fn test_boot_without_credentials_is_unauthenticated() {
        let channel = Arc::new(MockChannel::new());
        let controller = controller(
            Arc::new(MockCredentialStorage::new()),
            Arc::new(MockAccountPort::new(true)),
            channel.clone(),
        );

        controller.boot().await;

        assert_eq!(controller.status(), SessionStatus::Unauthenticated);
        assert_eq!(channel.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_boot_with_valid_credentials_opens_channel() {
        let channel = Arc::new(MockChannel::new());
        let controller = controller(
            Arc::new(MockCredentialStorage::with_pair(stored_pair())),
            Arc::new(MockAccountPort::new(true)),
            channel.clone(),
        );

        controller.boot().await;

        assert_eq!(controller.status(), SessionStatus::Authenticated);
        assert_eq!(channel.connect_calls(), 1);
        assert_eq!(controller.profile().unwrap().username(), "testuser");
    }

    #[tokio::test]
    async fn test_boot_with_expired_credentials_is_unauthenticated() {
        let account = Arc::new(MockAccountPort::new(true));
        account.expire_session();
        let channel = Arc::new(MockChannel::new());
        let controller = controller(
            Arc::new(MockCredentialStorage::with_pair(stored_pair())),
            account,
            channel.clone(),
        );

        controller.boot().await;

        assert_eq!(controller.status(), SessionStatus::Unauthenticated);
        assert_eq!(channel.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_boot_keeps_pair_on_transient_failure() {
        let storage = Arc::new(MockCredentialStorage::with_pair(stored_pair()));
        let controller = controller(
            storage.clone(),
            Arc::new(MockAccountPort::new(false)),
            Arc::new(MockChannel::new()),
        );

        controller.boot().await;

        assert_eq!(controller.status(), SessionStatus::Unauthenticated);
        assert!(storage.get().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_transitions_to_authenticated() {
        let storage = Arc::new(MockCredentialStorage::new());
        let channel = Arc::new(MockChannel::new());
        let controller = controller(
            storage.clone(),
            Arc::new(MockAccountPort::new(true)),
            channel.clone(),
        );

        let profile = controller.login(stored_pair()).await.unwrap();

        assert_eq!(profile.id(), "u1");
        assert_eq!(controller.status(), SessionStatus::Authenticated);
        assert!(storage.get().await.unwrap().is_some());
        assert_eq!(channel.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_logout_tears_everything_down() {
        let storage = Arc::new(MockCredentialStorage::with_pair(stored_pair()));
        let channel = Arc::new(MockChannel::new());
        let controller = controller(
            storage.clone(),
            Arc::new(MockAccountPort::new(true)),
            channel.clone(),
        );

        controller.boot().await;
        controller.logout().await;

        assert_eq!(controller.status(), SessionStatus::Unauthenticated);
        assert!(storage.get().await.unwrap().is_none());
        assert!(controller.profile().is_none());
        assert_eq!(channel.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_logouts_run_once() {
        let channel = Arc::new(MockChannel::new());
        let controller = controller(
            Arc::new(MockCredentialStorage::with_pair(stored_pair())),
            Arc::new(MockAccountPort::new(true)),
            channel.clone(),
        );

        controller.boot().await;

        // Interleaved on one task; the second call must observe the guard.
        join_all((0..3).map(|_| controller.logout())).await;

        assert_eq!(channel.disconnect_calls(), 1);
        assert_eq!(controller.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_expired_signal_forces_logout() {
        let storage = Arc::new(MockCredentialStorage::with_pair(stored_pair()));
        let channel = Arc::new(MockChannel::new());
        let controller = Arc::new(SessionController::new(
            storage.clone(),
            Arc::new(MockAccountPort::new(true)),
            channel.clone(),
        ));

        controller.boot().await;
        assert_eq!(controller.status(), SessionStatus::Authenticated);

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let _listener = controller.clone().spawn_signal_listener(signal_rx);

        let mut status = controller.watch_status();
        signal_tx.send(SessionSignal::Expired).unwrap();

        status.changed().await.unwrap();
        assert_eq!(controller.status(), SessionStatus::Unauthenticated);
        assert!(storage.get().await.unwrap().is_none());
        assert_eq!(channel.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn test_on_foreground_reconnects_only_when_authenticated() {
        let channel = Arc::new(MockChannel::new());
        let controller = controller(
            Arc::new(MockCredentialStorage::new()),
            Arc::new(MockAccountPort::new(true)),
            channel.clone(),
        );

        controller.boot().await;
        controller.on_foreground().await;
        assert_eq!(channel.connect_calls(), 0);
    }

    mod end_to_end {
        use super::*;

        use crate::infrastructure::api::mock::MockBackend;
        use crate::infrastructure::api::ApiClient;

        const BASE_URL: &str = "https://api.test/v1";

        #[tokio::test]
        async fn test_valid_pair_boots_without_refresh() {
            let backend = Arc::new(MockBackend::new("access-0"));
            let storage = Arc::new(MockCredentialStorage::with_pair(
                CredentialPair::new_unchecked(backend.current_access_token(), "refresh-0"),
            ));
            let (api, _signals) = ApiClient::new(backend.clone(), storage.clone(), BASE_URL);
            let channel = Arc::new(MockChannel::new());
            let controller =
                SessionController::new(storage, Arc::new(api), channel.clone());

            controller.boot().await;

            assert_eq!(controller.status(), SessionStatus::Authenticated);
            assert_eq!(backend.refresh_calls(), 0);
            assert_eq!(channel.connect_calls(), 1);
        }

        #[tokio::test]
        async fn test_stale_access_refreshes_once_and_boots() {
            let backend = Arc::new(MockBackend::new("access-0"));
            let storage = Arc::new(MockCredentialStorage::with_pair(
                CredentialPair::new_unchecked("stale-access", "refresh-0"),
            ));
            let (api, _signals) = ApiClient::new(backend.clone(), storage.clone(), BASE_URL);
            let controller = SessionController::new(
                storage.clone(),
                Arc::new(api),
                Arc::new(MockChannel::new()),
            );

            controller.boot().await;

            assert_eq!(controller.status(), SessionStatus::Authenticated);
            assert_eq!(backend.refresh_calls(), 1);

            let rotated = storage.get().await.unwrap().unwrap();
            assert_eq!(rotated.access_token(), backend.current_access_token());
        }

        #[tokio::test]
        async fn test_invalid_pair_clears_store_and_signs_out() {
            let backend = Arc::new(MockBackend::new("access-0"));
            backend.fail_refresh();
            let storage = Arc::new(MockCredentialStorage::with_pair(
                CredentialPair::new_unchecked("stale-access", "stale-refresh"),
            ));
            let (api, _signals) = ApiClient::new(backend.clone(), storage.clone(), BASE_URL);
            let channel = Arc::new(MockChannel::new());
            let controller =
                SessionController::new(storage.clone(), Arc::new(api), channel.clone());

            controller.boot().await;

            assert_eq!(controller.status(), SessionStatus::Unauthenticated);
            assert!(storage.get().await.unwrap().is_none());
            assert_eq!(channel.connect_calls(), 0);
        }
    }
}
