//! Credential storage port definition.

use async_trait::async_trait;

use crate::domain::entities::CredentialPair;
use crate::domain::errors::SecretError;

/// Port for durable credential persistence.
///
/// All operations are idempotent. The backing medium differs per platform;
/// implementations are selected once at construction.
#[async_trait]
pub trait CredentialStoragePort: Send + Sync {
    /// Retrieves the stored pair.
    async fn get(&self) -> Result<Option<CredentialPair>, SecretError>;

    /// Stores the pair, atomically replacing any previous one.
    async fn set(&self, pair: &CredentialPair) -> Result<(), SecretError>;

    /// Deletes the stored pair.
    async fn clear(&self) -> Result<(), SecretError>;

    /// Checks whether a pair exists.
    async fn has_credentials(&self) -> Result<bool, SecretError> {
        Ok(self.get().await?.is_some())
    }
}
