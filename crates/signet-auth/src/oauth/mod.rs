//! OAuth/OIDC relying-party client.
//!
//! This module performs the client side of the OAuth 2.0 authorization
//! code flow against a single identity provider: building the
//! authorization redirect, exchanging the code for tokens, and making
//! authenticated calls with transparent refresh-and-retry.
//!
//! # Overview
//!
//! 1. **Authorization** - [`OAuthClient::auth_uri`] builds the redirect
//!    embedding a CSRF state and an OIDC nonce.
//! 2. **Exchange** - [`OAuthClient::exchange_code`] trades the callback
//!    code for an access/refresh/identity token triple, verifying the
//!    identity token when present.
//! 3. **Authenticated calls** - [`OAuthClient::authenticated_request`] is
//!    the single retry primitive: one refresh, one retry, then failure.
//!    Thin wrappers over it fetch userinfo and attributes, push bulk
//!    attribute writes, and submit signed JWTs.
//!
//! The provider is described by an injected [`ProviderProfile`] value
//! object rather than a type per backend, so a deterministic in-memory
//! profile substitutes for integration testing without network access.

mod client;
mod discovery;
mod error;
mod profile;

pub use client::{OAuthClient, PendingAuthorization};
pub use discovery::{EndpointSet, ProviderMetadata};
pub use error::OAuthError;
pub use profile::{ProviderCapabilities, ProviderPaths, ProviderProfile};
