//! Session status and control signals.

/// Externally observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Boot in progress; stored credentials not yet validated.
    #[default]
    Loading,
    /// No usable credentials; login required.
    Unauthenticated,
    /// Credentials validated; the push channel may run.
    Authenticated,
}

impl SessionStatus {
    /// Returns whether the session holds validated credentials.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Out-of-band signal emitted by the API client and consumed by the
/// session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// Credential refresh failed; the session is no longer viable.
    Expired,
}
