//! The logical payload carried by a session token.

use serde::{Deserialize, Serialize};

use crate::types::{AuthLevel, IdentitySource, TokenSet};

/// The session schema version written by [`SessionPayload::current`].
///
/// A decoded payload carrying any other explicit version is rejected at
/// session construction. A payload carrying *no* version is a legacy shape
/// and is upgraded instead (see [`SessionPayload::effective_level`]).
pub const CURRENT_SESSION_VERSION: u32 = 1;

/// Decrypted contents of a session token.
///
/// Old deployments sealed payloads without a `version`, without an explicit
/// `auth_level` (only the `mfa` flag), and sometimes without a `user_id`.
/// Every field that arrived later is therefore optional on the decode path,
/// with `effective_*` accessors supplying the legacy defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// OAuth access token.
    pub access_token: String,

    /// OAuth refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OIDC identity token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// User identifier. Absent on legacy payloads; discovered lazily via a
    /// userinfo call when first needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Multi-factor flag. The only authentication-strength signal legacy
    /// payloads carried.
    #[serde(default)]
    pub mfa: bool,

    /// Explicit authentication level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_level: Option<AuthLevel>,

    /// Which identity provider issued this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<IdentitySource>,

    /// Session schema version. Absent on legacy payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl SessionPayload {
    /// Builds a current-version payload for the given session state.
    #[must_use]
    pub fn current(
        tokens: &TokenSet,
        user_id: Option<String>,
        level: AuthLevel,
        mfa: bool,
        source: IdentitySource,
    ) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            id_token: tokens.id_token.clone(),
            user_id,
            mfa,
            auth_level: Some(level),
            source: Some(source),
            version: Some(CURRENT_SESSION_VERSION),
        }
    }

    /// Builds the payload decoded from a legacy two-segment token.
    ///
    /// Such tokens carry raw access and refresh tokens only - no user id,
    /// no authentication level, no version.
    #[must_use]
    pub fn legacy(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token: Some(refresh_token),
            id_token: None,
            user_id: None,
            mfa: false,
            auth_level: None,
            source: None,
            version: None,
        }
    }

    /// The authentication level, defaulting legacy payloads from the MFA
    /// flag.
    #[must_use]
    pub fn effective_level(&self) -> AuthLevel {
        self.auth_level.unwrap_or_else(|| AuthLevel::from_mfa(self.mfa))
    }

    /// The identity source, defaulting legacy payloads to the first-party
    /// account system.
    #[must_use]
    pub fn effective_source(&self) -> IdentitySource {
        self.source.unwrap_or(IdentitySource::Account)
    }

    /// The token triple carried by this payload.
    #[must_use]
    pub fn tokens(&self) -> TokenSet {
        TokenSet {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            id_token: self.id_token.clone(),
        }
    }
}
