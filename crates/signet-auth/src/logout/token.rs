//! Backchannel logout token verification.
//!
//! A verification is a single pass, terminal in either "valid" or one
//! specific failure kind. Decoding (signature and structure) is a hard
//! error distinct from claim validation; each claim violation surfaces
//! its own error kind so the boundary can log it, even though all of
//! them map to one client-error response.
//!
//! # Security Considerations
//!
//! - A token carrying a claim on a prohibited name is rejected before
//!   any other check
//! - Single use is enforced by recording the token identifier (jti) in
//!   the shared store with a short TTL; the check-and-record is atomic
//!   across all server instances sharing the store

use std::time::Duration;

use jsonwebtoken::Validation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::config::VerificationKey;
use crate::types::StringOrList;
use signet_store::{DynSharedStore, StoreError};

/// The event key a logout token's `events` claim must carry.
pub const BACKCHANNEL_LOGOUT_EVENT: &str = "http://schemas.openid.net/event/backchannel-logout";

/// Claim names a logout token must never carry.
const PROHIBITED_CLAIMS: &[&str] = &["nonce"];

/// Shared-store key prefix for used token identifiers.
const JTI_KEY_PREFIX: &str = "logout:jti:";

/// Errors that can occur verifying a backchannel logout token.
#[derive(Debug, thiserror::Error)]
pub enum LogoutTokenError {
    /// The token failed the signature or structure check.
    #[error("Failed to decode logout token: {message}")]
    InvalidToken {
        /// Description of the decode failure.
        message: String,
    },

    /// The token carries a claim on a prohibited name.
    #[error("Logout token carries prohibited claim: {claim}")]
    ProhibitedClaim {
        /// The prohibited claim name.
        claim: String,
    },

    /// The issuer does not equal the expected issuer.
    #[error("Invalid issuer: expected {expected}, got {actual}")]
    InvalidIssuer {
        /// The expected issuer.
        expected: String,
        /// The issuer the token carries.
        actual: String,
    },

    /// The audience neither equals nor contains the expected audience.
    #[error("Audience does not include this client")]
    InvalidAudience,

    /// The issued-at time is not strictly in the past.
    #[error("Issued-at time is not in the past")]
    InvalidIssuedAt,

    /// Neither a subject nor a session identifier is present.
    #[error("Neither subject nor session identifier is present")]
    InvalidIdentifiers,

    /// The events claim does not declare exactly the backchannel logout
    /// event mapped to an empty object.
    #[error("Events claim does not declare the backchannel logout event")]
    InvalidEvent,

    /// The token identifier has been seen recently (replay).
    #[error("Token identifier was recently used")]
    TokenRecentlyUsed,

    /// The shared store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Verified claims of a backchannel logout token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutClaims {
    /// Issuer.
    pub iss: String,

    /// Audience - a single client id or a list.
    pub aud: StringOrList,

    /// Issued-at time as a Unix timestamp.
    pub iat: i64,

    /// Single-use token identifier.
    pub jti: String,

    /// Subject the logout applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Session identifier the logout applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Event map; must contain exactly the backchannel logout event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Map<String, Value>>,

    /// Any further claims, retained for prohibited-claim hardening.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogoutClaims {
    /// The identity this logout applies to: the subject when present,
    /// otherwise the session identifier.
    #[must_use]
    pub fn identity_key(&self) -> Option<&str> {
        self.sub.as_deref().or(self.sid.as_deref())
    }
}

/// Verifies backchannel logout tokens.
///
/// # Example
///
/// ```ignore
/// use signet_auth::logout::LogoutTokenVerifier;
///
/// let verifier = LogoutTokenVerifier::new(
///     store,
///     "https://identity.example.com",
///     "signet",
///     verification_key,
/// );
///
/// let claims = verifier.decode(&raw_token)?;
/// verifier.verify(&claims).await?;
/// ```
pub struct LogoutTokenVerifier {
    store: DynSharedStore,
    expected_issuer: String,
    expected_audience: String,
    key: VerificationKey,
    replay_ttl: Duration,
}

impl LogoutTokenVerifier {
    /// Creates a verifier with the default replay TTL of two minutes.
    #[must_use]
    pub fn new(
        store: DynSharedStore,
        expected_issuer: impl Into<String>,
        expected_audience: impl Into<String>,
        key: VerificationKey,
    ) -> Self {
        Self {
            store,
            expected_issuer: expected_issuer.into(),
            expected_audience: expected_audience.into(),
            key,
            replay_ttl: Duration::from_secs(120),
        }
    }

    /// Sets how long used token identifiers stay recorded.
    #[must_use]
    pub fn with_replay_ttl(mut self, ttl: Duration) -> Self {
        self.replay_ttl = ttl;
        self
    }

    /// Decodes a raw logout token, checking signature and structure.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` - a decode failure, distinct from every
    /// claim-validation error - when the signature does not verify or a
    /// required claim is missing.
    pub fn decode(&self, raw: &str) -> Result<LogoutClaims, LogoutTokenError> {
        let (decoding_key, algorithm) =
            self.key
                .decoding_key()
                .map_err(|e| LogoutTokenError::InvalidToken {
                    message: e.to_string(),
                })?;

        // Logout tokens carry no exp and the aud/iat checks below produce
        // distinct error kinds, so the library checks are disabled here.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = std::collections::HashSet::new();

        jsonwebtoken::decode::<LogoutClaims>(raw, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Logout token decode failed: {e}");
                LogoutTokenError::InvalidToken {
                    message: e.to_string(),
                }
            })
    }

    /// Verifies decoded claims and enforces single use.
    ///
    /// The checks run in a fixed order: prohibited claims, issuer,
    /// audience, issued-at, identifiers, events shape, then the
    /// single-use identifier - each failing with its own error kind.
    ///
    /// # Errors
    ///
    /// Returns the specific claim violation, `TokenRecentlyUsed` on
    /// replay, or a store error.
    pub async fn verify(&self, claims: &LogoutClaims) -> Result<(), LogoutTokenError> {
        for claim in PROHIBITED_CLAIMS {
            if claims.extra.contains_key(*claim) {
                tracing::warn!("Rejected logout token carrying prohibited claim {claim}");
                return Err(LogoutTokenError::ProhibitedClaim {
                    claim: (*claim).to_string(),
                });
            }
        }

        if claims.iss != self.expected_issuer {
            return Err(LogoutTokenError::InvalidIssuer {
                expected: self.expected_issuer.clone(),
                actual: claims.iss.clone(),
            });
        }

        if !claims.aud.contains(&self.expected_audience) {
            return Err(LogoutTokenError::InvalidAudience);
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        if claims.iat >= now {
            return Err(LogoutTokenError::InvalidIssuedAt);
        }

        if claims.sub.is_none() && claims.sid.is_none() {
            return Err(LogoutTokenError::InvalidIdentifiers);
        }

        let events = claims.events.as_ref().ok_or(LogoutTokenError::InvalidEvent)?;
        if events.len() != 1 {
            return Err(LogoutTokenError::InvalidEvent);
        }
        match events.get(BACKCHANNEL_LOGOUT_EVENT) {
            Some(Value::Object(body)) if body.is_empty() => {}
            _ => return Err(LogoutTokenError::InvalidEvent),
        }

        let key = format!("{JTI_KEY_PREFIX}{}", claims.jti);
        let first_use = self
            .store
            .set_if_absent(&key, "used", Some(self.replay_ttl))
            .await?;
        if !first_use {
            tracing::warn!("Rejected replayed logout token");
            return Err(LogoutTokenError::TokenRecentlyUsed);
        }

        Ok(())
    }

    /// Decodes and verifies in one call.
    ///
    /// # Errors
    ///
    /// Returns the first decode or verification failure.
    pub async fn decode_and_verify(&self, raw: &str) -> Result<LogoutClaims, LogoutTokenError> {
        let claims = self.decode(raw)?;
        self.verify(&claims).await?;
        Ok(claims)
    }
}
