//! Backend API client: transport, refresh protocol and typed DTOs.

mod client;
mod dto;
mod refresh;
mod transport;

pub use client::{ApiClient, ApiResponse, ResponseBody};
pub use dto::{ErrorResponse, ProfileResponse, RefreshRequest, TokenPairResponse};
pub use refresh::RefreshCoordinator;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

#[cfg(test)]
pub use transport::mock;
