//! In-memory credential storage.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::entities::CredentialPair;
use crate::domain::errors::SecretError;
use crate::domain::ports::CredentialStoragePort;

/// Ephemeral credential storage for platforms without a keyring and for
/// tests. Credentials do not survive the process.
#[derive(Default)]
pub struct InMemoryCredentialStorage {
    pair: RwLock<Option<CredentialPair>>,
}

impl InMemoryCredentialStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage pre-seeded with a pair.
    #[must_use]
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

#[async_trait]
impl CredentialStoragePort for InMemoryCredentialStorage {
    async fn get(&self) -> Result<Option<CredentialPair>, SecretError> {
        Ok(self.pair.read().await.clone())
    }

    async fn set(&self, pair: &CredentialPair) -> Result<(), SecretError> {
        *self.pair.write().await = Some(pair.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SecretError> {
        *self.pair.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        tokio_test::block_on(async {
            let storage = InMemoryCredentialStorage::new();
            assert!(storage.get().await.unwrap().is_none());

            let pair = CredentialPair::new_unchecked("access-token-value", "refresh-token-value");
            storage.set(&pair).await.unwrap();
            assert_eq!(storage.get().await.unwrap(), Some(pair));

            storage.clear().await.unwrap();
            assert!(storage.get().await.unwrap().is_none());
        });
    }

    #[test]
    fn test_clear_is_idempotent() {
        tokio_test::block_on(async {
            let storage = InMemoryCredentialStorage::new();
            storage.clear().await.unwrap();
            storage.clear().await.unwrap();
            assert!(!storage.has_credentials().await.unwrap());
        });
    }
}
