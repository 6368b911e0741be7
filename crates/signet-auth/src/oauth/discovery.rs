//! Provider metadata discovery.
//!
//! The endpoint set is discovered once per client instance from the
//! provider's `.well-known/openid-configuration` document. Only the
//! fields this client consumes are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::OAuthError;

/// The subset of the OpenID Connect discovery document this client uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// URL that the provider asserts as its issuer identifier.
    pub issuer: String,

    /// URL of the authorization endpoint.
    pub authorization_endpoint: String,

    /// URL of the token endpoint.
    pub token_endpoint: String,

    /// URL of the userinfo endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// URL to redirect to for provider-side logout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

/// The resolved endpoints the client calls.
#[derive(Debug, Clone)]
pub struct EndpointSet {
    /// Authorization endpoint.
    pub authorization: Url,

    /// Token endpoint.
    pub token: Url,

    /// Userinfo endpoint.
    pub userinfo: Url,

    /// End-session endpoint, when the provider publishes one.
    pub end_session: Option<Url>,
}

impl EndpointSet {
    /// Resolves an endpoint set from a metadata document.
    ///
    /// # Errors
    ///
    /// Returns an error if a required endpoint is missing or does not
    /// parse as a URL.
    pub fn from_metadata(metadata: &ProviderMetadata) -> Result<Self, OAuthError> {
        let userinfo = metadata
            .userinfo_endpoint
            .as_deref()
            .ok_or_else(|| OAuthError::Discovery {
                field: "userinfo_endpoint".to_string(),
            })?;
        Ok(Self {
            authorization: Url::parse(&metadata.authorization_endpoint)?,
            token: Url::parse(&metadata.token_endpoint)?,
            userinfo: Url::parse(userinfo)?,
            end_session: metadata
                .end_session_endpoint
                .as_deref()
                .map(Url::parse)
                .transpose()?,
        })
    }

    /// Fetches the provider metadata document and resolves the endpoint
    /// set, checking the asserted issuer against the configured one.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, a
    /// malformed document, an issuer mismatch, or a missing endpoint.
    pub async fn discover(http: &reqwest::Client, issuer: &str) -> Result<Self, OAuthError> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        tracing::debug!("Fetching provider metadata from {url}");

        let response = http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::protocol(status.as_u16(), body));
        }

        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| OAuthError::malformed(format!("metadata document: {e}")))?;

        if metadata.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
            return Err(OAuthError::IssuerMismatch {
                expected: issuer.to_string(),
                actual: metadata.issuer,
            });
        }

        Self::from_metadata(&metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(issuer: &str) -> ProviderMetadata {
        ProviderMetadata {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/token"),
            userinfo_endpoint: Some(format!("{issuer}/userinfo")),
            end_session_endpoint: Some(format!("{issuer}/logout")),
        }
    }

    #[test]
    fn test_from_metadata_resolves_all_endpoints() {
        let endpoints = EndpointSet::from_metadata(&metadata("https://id.example.com")).unwrap();
        assert_eq!(endpoints.token.as_str(), "https://id.example.com/token");
        assert!(endpoints.end_session.is_some());
    }

    #[test]
    fn test_from_metadata_requires_userinfo() {
        let mut doc = metadata("https://id.example.com");
        doc.userinfo_endpoint = None;
        let result = EndpointSet::from_metadata(&doc);
        assert!(matches!(result, Err(OAuthError::Discovery { field }) if field == "userinfo_endpoint"));
    }

    #[test]
    fn test_end_session_is_optional() {
        let mut doc = metadata("https://id.example.com");
        doc.end_session_endpoint = None;
        let endpoints = EndpointSet::from_metadata(&doc).unwrap();
        assert!(endpoints.end_session.is_none());
    }
}
