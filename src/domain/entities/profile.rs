//! Authenticated user profile entity.

/// Identity-verification (KYC) state reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationState {
    /// Verification has not been started.
    #[default]
    Unverified,
    /// Documents submitted, decision pending.
    Pending,
    /// Identity verified.
    Verified,
    /// Verification rejected.
    Rejected,
}

impl VerificationState {
    /// Parses the backend's wire representation; unknown values map to
    /// `Unverified`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "verified" => Self::Verified,
            "rejected" => Self::Rejected,
            _ => Self::Unverified,
        }
    }

    /// Returns whether the user may transact.
    #[must_use]
    pub const fn can_transact(self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Profile of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    id: String,
    username: String,
    display_name: Option<String>,
    verification: VerificationState,
}

impl Profile {
    /// Creates a new profile.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        display_name: Option<String>,
        verification: VerificationState,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name,
            verification,
        }
    }

    /// Returns the user id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the display name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Returns the verification state.
    #[must_use]
    pub const fn verification(&self) -> VerificationState {
        self.verification
    }
}
