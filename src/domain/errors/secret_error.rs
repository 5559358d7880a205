//! Secure storage error types.

use thiserror::Error;

/// Credential storage error variants.
///
/// Callers treat any of these as "no credentials available"; storage
/// failures never fail a request outright.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to access secure storage: {0}")]
    AccessFailed(String),

    #[error("failed to retrieve credentials: {0}")]
    RetrievalFailed(String),

    #[error("failed to store credentials: {0}")]
    StorageFailed(String),

    #[error("failed to delete credentials: {0}")]
    DeletionFailed(String),

    #[error("secure storage not available: {0}")]
    NotAvailable(String),
}
