//! Paywire — session and real-time notification core for a custodial
//! payments client.
//!
//! The crate owns the two contracts the rest of the app builds on: every
//! outbound request carries the stored credential and survives exactly one
//! transparent refresh-and-retry, and one persistent push channel fans
//! typed events out to any number of subscribers across network flaps and
//! broker errors.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing session orchestration.
pub mod application;
/// Domain layer containing entities, errors, services and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "paywire";
