//! Authenticated API client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::dto::{ErrorResponse, ProfileResponse};
use super::refresh::RefreshCoordinator;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::domain::entities::{Profile, SessionSignal};
use crate::domain::errors::ApiError;
use crate::domain::ports::{AccountPort, CredentialStoragePort};

const REFRESH_PATH: &str = "/auth/refresh";
const PROFILE_PATH: &str = "/users/profile";

/// Parsed response body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The response carried no body; success with no payload.
    Empty,
    /// The body parsed as JSON.
    Json(Value),
    /// The body was non-empty but not JSON.
    Text(String),
}

/// A successful API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    body: ResponseBody,
}

impl ApiResponse {
    fn from_http(response: HttpResponse) -> Self {
        let trimmed = response.body.trim();

        let body = if trimmed.is_empty() {
            ResponseBody::Empty
        } else if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            ResponseBody::Json(value)
        } else {
            ResponseBody::Text(response.body)
        };

        Self {
            status: response.status,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the parsed body.
    #[must_use]
    pub const fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Deserializes the JSON body into `T`.
    ///
    /// # Errors
    /// Returns `ApiError::InvalidResponse` when the body is empty, not
    /// JSON, or does not match `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self.body {
            ResponseBody::Json(value) => serde_json::from_value(value)
                .map_err(|e| ApiError::invalid_response(e.to_string())),
            ResponseBody::Empty => Err(ApiError::invalid_response("empty response body")),
            ResponseBody::Text(_) => Err(ApiError::invalid_response("expected a JSON body")),
        }
    }
}

/// Issues authenticated HTTP calls against the backend.
///
/// On a 401 the client refreshes the credential pair (single-flight across
/// concurrent callers) and retries the original request exactly once. A
/// failed refresh, or a second 401 after a successful one, emits
/// `SessionSignal::Expired` on the signal channel handed out at
/// construction and fails the call.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    storage: Arc<dyn CredentialStoragePort>,
    refresh: RefreshCoordinator,
    base_url: String,
    signal_tx: mpsc::UnboundedSender<SessionSignal>,
}

impl ApiClient {
    /// Creates a client for `base_url` and returns the session-signal
    /// receiver alongside it.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        storage: Arc<dyn CredentialStoragePort>,
        base_url: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionSignal>) {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let refresh = RefreshCoordinator::new(
            transport.clone(),
            storage.clone(),
            format!("{base_url}{REFRESH_PATH}"),
        );

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        (
            Self {
                transport,
                storage,
                refresh,
                base_url,
                signal_tx,
            },
            signal_rx,
        )
    }

    /// Issues one call, driving the refresh-then-retry protocol on 401.
    ///
    /// # Errors
    /// Fails with `Network`, `Http` or `SessionExpired`.
    pub async fn call(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
        requires_auth: bool,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{path}", self.base_url);

        // A missing token is not an error here; the request goes out bare
        // and fails server-side if auth was actually required.
        let bearer = if requires_auth {
            self.access_token().await
        } else {
            None
        };

        let request = Self::build(method.clone(), &url, bearer, body.clone());
        let response = self.transport.execute(request).await?;

        if response.status != 401 || !requires_auth {
            return Self::into_result(response);
        }

        debug!(path, "Authorization failed, refreshing credentials");

        if !self.refresh.refresh().await {
            self.signal_expired();
            return Err(ApiError::SessionExpired);
        }

        let bearer = self.access_token().await;
        let retry = Self::build(method, &url, bearer, body);
        let response = self.transport.execute(retry).await?;

        if response.status == 401 {
            warn!(path, "Request still unauthorized after refresh");
            self.signal_expired();
            return Err(ApiError::SessionExpired);
        }

        Self::into_result(response)
    }

    /// Issues an authenticated GET and deserializes the JSON response.
    ///
    /// # Errors
    /// Fails with `Network`, `Http`, `SessionExpired` or `InvalidResponse`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(path, Method::GET, None, true).await?.json()
    }

    /// Issues an authenticated POST and deserializes the JSON response.
    ///
    /// # Errors
    /// Fails with `Network`, `Http`, `SessionExpired` or `InvalidResponse`.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        self.call(path, Method::POST, Some(body), true).await?.json()
    }

    async fn access_token(&self) -> Option<String> {
        // Storage failure degrades to "no token", never to a failed call.
        match self.storage.get().await {
            Ok(pair) => pair.map(|p| p.access_token().to_string()),
            Err(e) => {
                warn!(error = %e, "Credential storage unavailable, sending without token");
                None
            }
        }
    }

    fn build(method: Method, url: &str, bearer: Option<String>, body: Option<Value>) -> HttpRequest {
        let mut request = HttpRequest::new(method, url);
        if let Some(token) = bearer {
            request = request.with_bearer(token);
        }
        if let Some(body) = body {
            request = request.with_body(body);
        }
        request
    }

    fn into_result(response: HttpResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            return Ok(ApiResponse::from_http(response));
        }

        let message = Self::extract_message(&response);
        let body = Some(response.body).filter(|b| !b.trim().is_empty());
        Err(ApiError::http(response.status, message, body))
    }

    // Extraction order: structured error field, then raw body, then a
    // generic status string.
    fn extract_message(response: &HttpResponse) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(&response.body) {
            return parsed.message;
        }

        let raw = response.body.trim();
        if !raw.is_empty() {
            return raw.to_string();
        }

        format!("HTTP {}", response.status)
    }

    fn signal_expired(&self) {
        let _ = self.signal_tx.send(SessionSignal::Expired);
    }
}

#[async_trait]
impl AccountPort for ApiClient {
    async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        let response: ProfileResponse = self.get(PROFILE_PATH).await?;
        Ok(response.into())
    }
}
