//! Errors raised while talking to the identity provider.
//!
//! Every variant here means the same thing to callers: the provider
//! interaction failed and the session should be treated as invalid. The
//! distinct kinds exist for logging and tests, not for control flow at
//! the boundary.

/// Errors that can occur during identity-provider operations.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// A network-level error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider returned an unexpected HTTP status.
    #[error("Provider returned HTTP {status}: {body}")]
    Protocol {
        /// The HTTP status code.
        status: u16,
        /// The response body, for logging.
        body: String,
    },

    /// The provider rejected the request and no refresh token was
    /// available to retry with.
    #[error("Unauthorized and no refresh token available")]
    NoRefreshToken,

    /// The provider rejected the request even after a token refresh.
    #[error("Unauthorized after token refresh")]
    RefreshExhausted,

    /// The token endpoint returned an OAuth error response.
    #[error("Token endpoint error: {error} - {description}")]
    TokenEndpoint {
        /// The OAuth error code.
        error: String,
        /// Optional error description.
        description: String,
    },

    /// The identity token failed signature, audience, or nonce
    /// verification.
    #[error("Identity token validation failed: {message}")]
    IdentityToken {
        /// Description of the validation failure.
        message: String,
    },

    /// The provider's response body could not be interpreted where a body
    /// is required.
    #[error("Malformed provider response: {message}")]
    MalformedResponse {
        /// Description of what was malformed.
        message: String,
    },

    /// The provider metadata document contradicts the configured issuer.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The configured issuer.
        expected: String,
        /// The issuer asserted by the metadata document.
        actual: String,
    },

    /// The provider metadata document is missing a required endpoint.
    #[error("Provider metadata is missing field: {field}")]
    Discovery {
        /// The missing field.
        field: String,
    },

    /// The active provider does not offer the requested capability.
    #[error("Provider does not support {capability}")]
    CapabilityUnavailable {
        /// The missing capability.
        capability: String,
    },

    /// An endpoint URL could not be parsed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl OAuthError {
    /// Creates a `Protocol` error from a status and body.
    #[must_use]
    pub fn protocol(status: u16, body: impl Into<String>) -> Self {
        Self::Protocol {
            status,
            body: body.into(),
        }
    }

    /// Creates a `TokenEndpoint` error from an OAuth error response.
    #[must_use]
    pub fn token_endpoint(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::TokenEndpoint {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Creates an `IdentityToken` error.
    #[must_use]
    pub fn identity_token(message: impl Into<String>) -> Self {
        Self::IdentityToken {
            message: message.into(),
        }
    }

    /// Creates a `MalformedResponse` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Returns `true` if this failure happened after exhausting the
    /// single refresh-and-retry.
    #[must_use]
    pub fn is_refresh_exhausted(&self) -> bool {
        matches!(self, Self::RefreshExhausted)
    }
}
