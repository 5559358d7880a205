//! Application layer with session orchestration services.

/// Service implementations.
pub mod services;

pub use services::SessionController;
