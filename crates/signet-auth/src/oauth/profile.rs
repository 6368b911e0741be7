//! Provider profile value object.
//!
//! The two deployable identity-provider backends differ only in scopes,
//! endpoint paths, and capabilities, so the client is parameterized by a
//! profile value rather than subclassed per backend. The presets below
//! capture the two shipped profiles; everything in them can also be set
//! from configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::OAuthError;
use crate::types::IdentitySource;

/// What the active provider is able to do beyond the standard endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCapabilities {
    /// Whether remote attribute writes are accepted.
    pub attribute_write: bool,

    /// Whether signed JWT submission is accepted.
    pub jwt_submission: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            attribute_write: true,
            jwt_submission: true,
        }
    }
}

/// Path templates for the provider-specific endpoints that are not part
/// of the discovered metadata. Resolved against the issuer base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderPaths {
    /// Per-name attribute read path; `{name}` is replaced.
    pub attribute: String,

    /// Attribute bulk-write path.
    pub attribute_bulk: String,

    /// Signed JWT submission path.
    pub jwt: String,
}

impl Default for ProviderPaths {
    fn default() -> Self {
        Self {
            attribute: "/v1/attributes/{name}".to_string(),
            attribute_bulk: "/v1/attributes".to_string(),
            jwt: "/v1/jwt".to_string(),
        }
    }
}

/// Everything the client needs to know about the active provider.
///
/// # Example (TOML)
///
/// ```toml
/// [provider]
/// source = "digital_identity"
/// issuer = "https://identity.example.com"
/// client_id = "signet"
/// redirect_url = "https://www.example.com/sign-in/callback"
/// scopes = ["openid", "email"]
///
/// [provider.capabilities]
/// attribute_write = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Which identity source this profile represents.
    pub source: IdentitySource,

    /// Issuer base URL; discovery and path templates resolve against it.
    pub issuer: String,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret, for confidential clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Redirect URL registered with the provider.
    pub redirect_url: String,

    /// Scopes requested on authorization.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Provider capabilities.
    #[serde(default)]
    pub capabilities: ProviderCapabilities,

    /// Provider-specific endpoint paths.
    #[serde(default)]
    pub paths: ProviderPaths,

    /// Extra query parameters appended to every authorization redirect.
    #[serde(default)]
    pub extra_auth_params: HashMap<String, String>,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string()]
}

impl Default for ProviderProfile {
    fn default() -> Self {
        Self::account("http://localhost:8080", "signet", "http://localhost:3000/callback")
    }
}

impl ProviderProfile {
    /// Preset for the first-party account system: full read/write
    /// attribute access and JWT submission.
    #[must_use]
    pub fn account(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            source: IdentitySource::Account,
            issuer: issuer.into(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_url: redirect_url.into(),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            capabilities: ProviderCapabilities::default(),
            paths: ProviderPaths::default(),
            extra_auth_params: HashMap::new(),
        }
    }

    /// Preset for the external digital-identity provider: attributes are
    /// read-only and JWT submission is unavailable.
    #[must_use]
    pub fn digital_identity(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            source: IdentitySource::DigitalIdentity,
            issuer: issuer.into(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_url: redirect_url.into(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            capabilities: ProviderCapabilities {
                attribute_write: false,
                jwt_submission: false,
            },
            paths: ProviderPaths::default(),
            extra_auth_params: HashMap::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// The attribute read URL for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved URL does not parse.
    pub fn attribute_url(&self, name: &str) -> Result<Url, OAuthError> {
        let path = self.paths.attribute.replace("{name}", name);
        self.resolve(&path)
    }

    /// The attribute bulk-write URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved URL does not parse.
    pub fn attribute_bulk_url(&self) -> Result<Url, OAuthError> {
        self.resolve(&self.paths.attribute_bulk)
    }

    /// The signed JWT submission URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved URL does not parse.
    pub fn jwt_url(&self) -> Result<Url, OAuthError> {
        self.resolve(&self.paths.jwt)
    }

    fn resolve(&self, path: &str) -> Result<Url, OAuthError> {
        let base = self.issuer.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_url_substitutes_name() {
        let profile = ProviderProfile::account("https://account.example.com/", "id", "cb");
        let url = profile.attribute_url("email").unwrap();
        assert_eq!(
            url.as_str(),
            "https://account.example.com/v1/attributes/email"
        );
    }

    #[test]
    fn test_presets_differ_in_capabilities() {
        let account = ProviderProfile::account("https://a", "id", "cb");
        let digital = ProviderProfile::digital_identity("https://d", "id", "cb");
        assert!(account.capabilities.attribute_write);
        assert!(!digital.capabilities.attribute_write);
        assert!(!digital.capabilities.jwt_submission);
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let profile: ProviderProfile = toml::from_str(
            r#"
            source = "account"
            issuer = "https://account.example.com"
            client_id = "signet"
            redirect_url = "https://www.example.com/callback"
            "#,
        )
        .unwrap();
        assert_eq!(profile.scopes, vec!["openid".to_string()]);
        assert!(profile.capabilities.jwt_submission);
    }
}
