//! API error types.

use thiserror::Error;

/// Errors surfaced by authenticated API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure before any response was received.
    #[error("network error: {message}")]
    Network {
        /// Human-readable failure description.
        message: String,
    },

    /// Non-2xx response from the backend.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Best-effort extracted error message.
        message: String,
        /// Raw response body, when one was received.
        body: Option<String>,
    },

    /// Credential refresh failed; the session must be torn down.
    #[error("session expired")]
    SessionExpired,

    /// A 2xx response body did not match the expected shape.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Decoding failure description.
        message: String,
    },
}

impl ApiError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an HTTP error.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>, body: Option<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body,
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns whether this error ends the session.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns whether this error is transport-level.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Returns the HTTP status code, when present.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        if let Self::Http { status, .. } = self {
            Some(*status)
        } else {
            None
        }
    }
}
