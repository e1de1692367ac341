//! Shopper identity.
//!
//! An [`Identity`] is either anonymous or carries the opaque user reference
//! issued by the authentication provider.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`IdentityId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityIdError {
    /// The input string is empty or whitespace.
    #[error("identity cannot be empty")]
    Empty,
}

/// Opaque user reference issued by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Parse an identity from a provider-issued string.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityIdError::Empty`] if nothing remains after trimming.
    pub fn parse(s: &str) -> Result<Self, IdentityIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdentityIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The shopper behind the current session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Identity {
    /// No user is signed in.
    #[default]
    Anonymous,
    /// A signed-in user.
    Authenticated(IdentityId),
}

impl Identity {
    /// Returns the signed-in user's reference, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<&IdentityId> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(id) => Some(id),
        }
    }

    /// Returns `true` if no user is signed in.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl From<IdentityId> for Identity {
    fn from(id: IdentityId) -> Self {
        Self::Authenticated(id)
    }
}

impl From<Option<IdentityId>> for Identity {
    fn from(id: Option<IdentityId>) -> Self {
        id.map_or(Self::Anonymous, Self::Authenticated)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Authenticated(id) => write!(f, "{id}"),
        }
    }
}
