//! Push-channel port definition.

use async_trait::async_trait;

/// Port for the session controller's control over the push channel.
///
/// Implementations own the persistent broker connection; the controller
/// only opens and closes it on session transitions.
#[async_trait]
pub trait ChannelPort: Send + Sync {
    /// Opens the channel. No-op when already connected or connecting, and
    /// when no access token is stored.
    async fn connect(&self);

    /// Closes the channel, cancels any pending reconnect and clears all
    /// listener registrations. Idempotent.
    async fn disconnect(&self);

    /// Closes and immediately reopens the channel, bypassing backoff.
    async fn reconnect(&self);

    /// Returns whether the channel loop is running.
    fn is_running(&self) -> bool;
}
