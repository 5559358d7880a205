//! Access/refresh credential pair value object.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Access/refresh token pair with masking and zeroize-on-drop.
///
/// Both tokens are present or the pair does not exist; partial pairs are
/// unrepresentable.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPair {
    access: String,
    refresh: String,
}

impl CredentialPair {
    /// Creates a new pair, rejecting empty or whitespace-only tokens.
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Option<Self> {
        let access = access.into().trim().to_string();
        let refresh = refresh.into().trim().to_string();

        if access.is_empty() || refresh.is_empty() {
            return None;
        }

        Some(Self { access, refresh })
    }

    /// Creates a pair without validation.
    #[must_use]
    pub fn new_unchecked(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh
    }

    /// Returns the masked access token for display.
    #[must_use]
    pub fn masked(&self) -> String {
        mask(&self.access)
    }
}

fn mask(value: &str) -> String {
    if value.len() <= 10 {
        return "*".repeat(value.len());
    }

    let visible_prefix = &value[..4];
    let visible_suffix = &value[value.len() - 4..];
    format!("{visible_prefix}...{visible_suffix}")
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &mask(&self.access))
            .field("refresh", &mask(&self.refresh))
            .finish()
    }
}

impl fmt::Display for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}
