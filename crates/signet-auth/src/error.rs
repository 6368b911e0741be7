//! Session error types.
//!
//! Codec-level and session-deserialization failures are deliberately *not*
//! errors: a malformed or expired session header is an expected, frequent
//! condition, so the decode path returns "no session" (`None`) instead.
//! The types here cover the remaining conditions a caller must branch on.

use crate::attributes::AttributeError;
use crate::oauth::OAuthError;
use crate::token::CodecError;
use crate::types::IdentitySource;
use signet_store::StoreError;

/// Errors that can occur while operating on an account session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An outbound identity-provider call was attempted after the session
    /// was sealed by `serialise()`. This is a programming-contract
    /// violation, not a user-facing condition.
    #[error("Session is sealed; no further identity provider calls are allowed")]
    FrozenSession,

    /// A remote or cached attribute write was attempted against a provider
    /// with no remote-write capability.
    #[error("The active identity provider cannot write remote attributes: {}", names.join(", "))]
    CannotSetRemoteAttribute {
        /// The remote/cached attribute names that were rejected.
        names: Vec<String>,
    },

    /// Talking to the identity provider failed. Callers treat the session
    /// as invalid, typically by forcing logout.
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// A permission-model check failed for the requested attribute names.
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    /// The user record or shared store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session payload could not be sealed into a token.
    #[error("Failed to seal session token: {0}")]
    Codec(#[from] CodecError),
}

impl SessionError {
    /// Creates a `CannotSetRemoteAttribute` error.
    #[must_use]
    pub fn cannot_set_remote(names: Vec<String>) -> Self {
        Self::CannotSetRemoteAttribute { names }
    }

    /// Returns `true` if the error means the session should be treated as
    /// invalid and the caller forced to re-authenticate.
    #[must_use]
    pub fn invalidates_session(&self) -> bool {
        matches!(self, Self::OAuth(_))
    }
}

/// Reasons a decoded session payload is rejected at construction.
///
/// These never reach the HTTP boundary as errors - the decode path maps
/// them to "no session" - but the specific kind is logged.
//
// Display/Error are implemented by hand rather than derived via
// `thiserror`: the `StaleIdentitySource` variant carries a data field
// named `source`, which `thiserror` would treat as the error's
// `Error::source()` and require `IdentitySource: std::error::Error`. The
// field is log data, not a nested error, so the impls below reproduce the
// same messages without that requirement.
#[derive(Debug)]
pub enum SessionRejection {
    /// The payload's schema version does not equal the current version.
    UnsupportedVersion {
        /// The version carried by the payload.
        found: u32,
    },

    /// The payload claims an identity source that is not the deployment's
    /// active one; the session predates a provider migration.
    StaleIdentitySource {
        /// The identity source the payload claims.
        source: IdentitySource,
    },
}

impl std::fmt::Display for SessionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedVersion { found } => {
                write!(f, "Unsupported session schema version: {found}")
            }
            Self::StaleIdentitySource { source } => {
                write!(f, "Session was issued by a retired identity source: {source}")
            }
        }
    }
}

impl std::error::Error for SessionRejection {}
