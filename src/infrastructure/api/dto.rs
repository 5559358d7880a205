//! API wire DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{Profile, VerificationState};

/// Backend error response structure.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Error message; the backend uses `message`, older endpoints `error`.
    #[serde(alias = "error")]
    pub message: String,
}

/// Refresh endpoint request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    /// The long-lived refresh token.
    pub refresh_token: &'a str,
}

/// Refresh endpoint response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    /// New short-lived access token.
    pub access_token: String,
    /// New long-lived refresh token.
    pub refresh_token: String,
}

/// Profile endpoint response structure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    /// User id.
    pub id: String,
    /// Username.
    pub username: String,
    /// Optional display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// KYC state as a wire string.
    #[serde(default)]
    pub verification_state: Option<String>,
}

impl From<ProfileResponse> for Profile {
    fn from(response: ProfileResponse) -> Self {
        let verification = response
            .verification_state
            .as_deref()
            .map_or(VerificationState::Unverified, VerificationState::parse);

        Self::new(
            response.id,
            response.username,
            response.display_name,
            verification,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_alias() {
        let from_message: ErrorResponse =
            serde_json::from_str(r#"{"message": "no such user"}"#).unwrap();
        assert_eq!(from_message.message, "no such user");

        let from_error: ErrorResponse =
            serde_json::from_str(r#"{"error": "no such user"}"#).unwrap();
        assert_eq!(from_error.message, "no such user");
    }

    #[test]
    fn test_token_pair_wire_names() {
        let parsed: TokenPairResponse =
            serde_json::from_str(r#"{"accessToken": "a1", "refreshToken": "r1"}"#).unwrap();
        assert_eq!(parsed.access_token, "a1");
        assert_eq!(parsed.refresh_token, "r1");

        let body = serde_json::to_value(RefreshRequest { refresh_token: "r1" }).unwrap();
        assert_eq!(body["refreshToken"], "r1");
    }

    #[test]
    fn test_profile_conversion() {
        let response: ProfileResponse = serde_json::from_str(
            r#"{"id": "u1", "username": "ada", "verificationState": "pending"}"#,
        )
        .unwrap();

        let profile = Profile::from(response);
        assert_eq!(profile.id(), "u1");
        assert_eq!(profile.display_name(), "ada");
        assert_eq!(profile.verification(), VerificationState::Pending);
    }
}
