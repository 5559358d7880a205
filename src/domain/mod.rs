//! Domain layer with core business entities, services and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Domain services.
pub mod services;

pub use entities::{CredentialPair, NotificationEvent, Profile, SessionStatus};
pub use errors::{ApiError, SecretError};
pub use ports::CredentialStoragePort;
pub use services::{EventBus, Subscription};
