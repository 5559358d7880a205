//! Credential refresh protocol with single-flight coordination.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::dto::{RefreshRequest, TokenPairResponse};
use super::transport::{HttpRequest, HttpTransport};
use crate::domain::entities::CredentialPair;
use crate::domain::ports::CredentialStoragePort;

/// Exchanges the refresh token for a new credential pair.
///
/// Concurrent callers share one in-flight exchange: whoever holds the lock
/// performs the request, everyone else adopts its outcome. Any failure
/// clears the store entirely — a broken refresh token invalidates the whole
/// session rather than leaving stale credentials behind.
pub struct RefreshCoordinator {
    transport: Arc<dyn HttpTransport>,
    storage: Arc<dyn CredentialStoragePort>,
    refresh_url: String,
    lock: Mutex<()>,
    generation: AtomicU64,
}

impl RefreshCoordinator {
    /// Creates a coordinator for the given refresh endpoint.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        storage: Arc<dyn CredentialStoragePort>,
        refresh_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            storage,
            refresh_url: refresh_url.into(),
            lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Runs (or joins) a refresh and reports whether usable credentials are
    /// now stored.
    pub async fn refresh(&self) -> bool {
        let observed = self.generation.load(Ordering::Acquire);
        let _guard = self.lock.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            // A refresh completed while we waited for the lock; its outcome
            // is whatever it left in the store.
            let adopted = matches!(self.storage.get().await, Ok(Some(_)));
            debug!(adopted, "Joined an already-completed refresh");
            return adopted;
        }

        let outcome = self.execute().await;
        self.generation.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn execute(&self) -> bool {
        let Ok(Some(pair)) = self.storage.get().await else {
            debug!("No refresh token available");
            return false;
        };

        debug!("Exchanging refresh token for a new credential pair");

        let body = serde_json::to_value(RefreshRequest {
            refresh_token: pair.refresh_token(),
        })
        .unwrap_or(Value::Null);
        let request = HttpRequest::new(Method::POST, self.refresh_url.clone()).with_body(body);

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Refresh request failed");
                self.invalidate().await;
                return false;
            }
        };

        if !response.is_success() {
            warn!(status = response.status, "Refresh rejected by the backend");
            self.invalidate().await;
            return false;
        }

        let parsed: TokenPairResponse = match serde_json::from_str(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Refresh response is malformed");
                self.invalidate().await;
                return false;
            }
        };

        let Some(new_pair) = CredentialPair::new(parsed.access_token, parsed.refresh_token) else {
            warn!("Refresh response carried an empty token");
            self.invalidate().await;
            return false;
        };

        if let Err(e) = self.storage.set(&new_pair).await {
            warn!(error = %e, "Failed to persist refreshed credentials");
            self.invalidate().await;
            return false;
        }

        info!("Credentials refreshed");
        true
    }

    async fn invalidate(&self) {
        if let Err(e) = self.storage.clear().await {
            warn!(error = %e, "Failed to clear credentials");
        }
    }
}
