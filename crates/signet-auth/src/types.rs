//! Core value types shared across the identity core.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered strength-of-login value attached to a session.
///
/// Permission thresholds in the attribute schema are expressed as levels;
/// a session may perform an operation when its own level is greater than
/// or equal to the attribute's threshold for that operation.
///
/// Level `0` is a single-factor login; level `1` and above require
/// multi-factor authentication.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AuthLevel(pub u8);

impl AuthLevel {
    /// Single-factor login.
    pub const SINGLE_FACTOR: AuthLevel = AuthLevel(0);

    /// The lowest multi-factor tier.
    pub const MFA: AuthLevel = AuthLevel(1);

    /// Maps a bare MFA flag onto a level.
    ///
    /// Used when upgrading session payloads that predate explicit levels
    /// and only carried a multi-factor flag.
    #[must_use]
    pub fn from_mfa(mfa: bool) -> Self {
        if mfa { Self::MFA } else { Self::SINGLE_FACTOR }
    }

    /// Returns `true` if this level can only be reached with MFA.
    #[must_use]
    pub fn requires_mfa(self) -> bool {
        self >= Self::MFA
    }
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which identity provider issued a session.
///
/// At most one identity source is active per deployment; sessions carrying
/// the other source are rejected at construction as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// The first-party account system.
    Account,
    /// The external digital-identity provider.
    DigitalIdentity,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::DigitalIdentity => write!(f, "digital_identity"),
        }
    }
}

/// The token triple held by a session.
///
/// The refresh and identity tokens are optional - some providers issue
/// neither, and the access token alone is enough for bearer calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// OAuth access token.
    pub access_token: String,

    /// OAuth refresh token, when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OIDC identity token, when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenSet {
    /// Creates a token set holding only an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            id_token: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the identity token.
    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }
}

/// A claim value that can be a single string or an array of strings.
///
/// The `aud` claim takes either form; verification accepts a token whose
/// audience equals, or contains, the expected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    /// Single string value.
    String(String),
    /// Array of string values.
    List(Vec<String>),
}

impl StringOrList {
    /// Checks if the claim equals or contains the specified value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::String(s) => s == value,
            Self::List(list) => list.iter().any(|s| s == value),
        }
    }

    /// Returns the first value.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            Self::List(list) => list.first().map(String::as_str),
        }
    }
}
