//! Account API port definition.

use async_trait::async_trait;

use crate::domain::entities::Profile;
use crate::domain::errors::ApiError;

/// Port for the account endpoints the session layer consumes.
#[async_trait]
pub trait AccountPort: Send + Sync {
    /// Fetches the authenticated user's profile, validating the stored
    /// credentials in the process.
    async fn fetch_profile(&self) -> Result<Profile, ApiError>;
}
