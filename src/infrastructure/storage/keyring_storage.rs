//! Keyring-based credential storage.

use async_trait::async_trait;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::entities::CredentialPair;
use crate::domain::errors::SecretError;
use crate::domain::ports::CredentialStoragePort;

const KEYRING_SERVICE: &str = "paywire";
const KEYRING_USER: &str = "credentials";

// Both tokens live in one entry so a pair is always replaced in a single
// keyring write; a partial pair is never observable.
#[derive(Serialize, Deserialize)]
struct StoredPair {
    access_token: String,
    refresh_token: String,
}

/// System keyring credential storage adapter.
pub struct KeyringCredentialStorage {
    service: String,
    user: String,
}

impl KeyringCredentialStorage {
    /// Creates new storage with default names.
    #[must_use]
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            user: KEYRING_USER.to_string(),
        }
    }

    /// Creates storage with custom names.
    #[must_use]
    pub fn with_names(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    fn entry(&self) -> Result<Entry, SecretError> {
        Entry::new(&self.service, &self.user)
            .map_err(|e| SecretError::AccessFailed(format!("failed to access keyring: {e}")))
    }
}

impl Default for KeyringCredentialStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStoragePort for KeyringCredentialStorage {
    async fn get(&self) -> Result<Option<CredentialPair>, SecretError> {
        debug!(service = %self.service, "Retrieving credentials from keyring");

        let entry = self.entry()?;

        match entry.get_password() {
            Ok(serialized) => {
                let stored: StoredPair = serde_json::from_str(&serialized).map_err(|e| {
                    warn!(error = %e, "Stored credentials are malformed");
                    SecretError::RetrievalFailed(e.to_string())
                })?;

                debug!("Credentials found in keyring");
                Ok(CredentialPair::new(
                    stored.access_token,
                    stored.refresh_token,
                ))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No credentials stored in keyring");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Failed to retrieve credentials from keyring");
                Err(SecretError::RetrievalFailed(e.to_string()))
            }
        }
    }

    async fn set(&self, pair: &CredentialPair) -> Result<(), SecretError> {
        debug!(service = %self.service, "Storing credentials in keyring");

        let entry = self.entry()?;

        let stored = StoredPair {
            access_token: pair.access_token().to_string(),
            refresh_token: pair.refresh_token().to_string(),
        };
        let serialized = serde_json::to_string(&stored)
            .map_err(|e| SecretError::StorageFailed(e.to_string()))?;

        entry.set_password(&serialized).map_err(|e| {
            warn!(error = %e, "Failed to store credentials in keyring");
            SecretError::StorageFailed(e.to_string())
        })?;

        debug!("Credentials stored successfully");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SecretError> {
        debug!(service = %self.service, "Deleting credentials from keyring");

        let entry = self.entry()?;

        match entry.delete_credential() {
            Ok(()) => {
                debug!("Credentials deleted from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No credentials to delete");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to delete credentials from keyring");
                Err(SecretError::DeletionFailed(e.to_string()))
            }
        }
    }
}
