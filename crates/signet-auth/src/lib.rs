//! # signet-auth
//!
//! The Signet identity core: issues, carries, and validates an
//! authenticated user's identity across a stateless API, brokers OAuth/
//! OIDC token exchange and refresh with an external identity provider,
//! and enforces a tiered permission model gating attribute access by
//! authentication strength. It also verifies inbound backchannel logout
//! notifications and propagates forced-logout state.
//!
//! This crate is an OAuth *client* plus a session-token codec - not an
//! OAuth server, and not a JOSE library (it consumes one). At most one
//! identity-provider profile is active per deployment.
//!
//! ## Components
//!
//! - [`token`] - authenticated encryption of the session payload into an
//!   opaque header-safe string, and back
//! - [`oauth`] - the relying-party client: authorization redirect, code
//!   exchange, and the refresh-and-retry-once request primitive
//! - [`attributes`] - the declarative attribute permission model
//! - [`session`] - the request-scoped account session composing the
//!   three above
//! - [`logout`] - backchannel logout token verification and the
//!   forced-logout notice
//! - [`config`] - deployment configuration, loaded and validated once
//!
//! ## Request flow
//!
//! ```ignore
//! use signet_auth::prelude::*;
//!
//! // At process start
//! let config = IdentityConfig::load_from_path("identity.toml")?;
//! let client = OAuthClient::discover(
//!     config.provider.clone(),
//!     config.verification.clone(),
//!     config.request_timeout,
//! ).await?;
//! let context = SessionContext::new(
//!     Arc::new(client),
//!     user_records,
//!     Arc::new(config.attribute_schema()?),
//!     config.session_secret.clone(),
//! );
//!
//! // Per request
//! let Some(mut session) = AccountSession::from_token(context.clone(), header) else {
//!     return force_login();
//! };
//! let values = session.get_attributes(&names).await?;
//! let rotated_token = session.serialise()?;
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod logout;
pub mod oauth;
pub mod session;
pub mod token;
pub mod types;

pub use attributes::{
    AttributeDefinition, AttributeError, AttributeOperation, AttributeSchema, AttributeStorage,
    SchemaError,
};
pub use config::{ConfigError, IdentityConfig, VerificationKey};
pub use error::{SessionError, SessionRejection};
pub use logout::{LogoutClaims, LogoutNotice, LogoutTokenError, LogoutTokenVerifier};
pub use oauth::{OAuthClient, OAuthError, PendingAuthorization, ProviderProfile};
pub use session::{AccountSession, SessionContext, SessionState};
pub use token::{CURRENT_SESSION_VERSION, SessionPayload};
pub use types::{AuthLevel, IdentitySource, StringOrList, TokenSet};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use signet_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attributes::{AttributeOperation, AttributeSchema, AttributeStorage};
    pub use crate::config::IdentityConfig;
    pub use crate::logout::{LogoutNotice, LogoutTokenVerifier};
    pub use crate::oauth::{OAuthClient, PendingAuthorization, ProviderProfile};
    pub use crate::session::{AccountSession, SessionContext};
    pub use crate::types::{AuthLevel, IdentitySource, TokenSet};
}
