//! The OAuth client and its refresh-and-retry primitive.

use std::collections::HashMap;
use std::time::Duration;

use jsonwebtoken::Validation;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use super::discovery::EndpointSet;
use super::error::OAuthError;
use super::profile::ProviderProfile;
use crate::config::VerificationKey;
use crate::types::{StringOrList, TokenSet};

/// State and nonce for an authorization redirect that has been issued but
/// not yet completed.
///
/// The state value is the CSRF binding between the redirect and the
/// callback; the nonce ties the eventual identity token to this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// CSRF-resistant state value.
    pub state: String,

    /// OIDC nonce.
    pub nonce: String,
}

impl PendingAuthorization {
    /// Generates a fresh state/nonce pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            state: Uuid::new_v4().simple().to_string(),
            nonce: Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Token endpoint response body.
#[derive(Debug, Clone, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

/// OAuth error response body.
#[derive(Debug, Clone, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Identity token claims this client verifies.
#[derive(Debug, Clone, Deserialize)]
struct IdTokenClaims {
    #[allow(dead_code)]
    sub: String,
    #[allow(dead_code)]
    aud: StringOrList,
    #[serde(default)]
    nonce: Option<String>,
}

/// Client for a single identity provider.
///
/// Endpoints are discovered once at construction; every instance is
/// scoped to the one provider its [`ProviderProfile`] describes. The
/// client is stateless with respect to tokens - callers pass the current
/// [`TokenSet`] in and receive the (possibly rotated) set back, so they
/// can persist rotation.
pub struct OAuthClient {
    http: reqwest::Client,
    profile: ProviderProfile,
    endpoints: EndpointSet,
    verification: Option<VerificationKey>,
}

impl OAuthClient {
    /// Creates a client by fetching the provider's metadata document.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or discovery
    /// fails.
    pub async fn discover(
        profile: ProviderProfile,
        verification: Option<VerificationKey>,
        request_timeout: Duration,
    ) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let endpoints = EndpointSet::discover(&http, &profile.issuer).await?;
        Ok(Self {
            http,
            profile,
            endpoints,
            verification,
        })
    }

    /// Creates a client with a pre-resolved endpoint set.
    ///
    /// Used when the endpoints are known statically, and by tests that
    /// substitute a deterministic profile for a live provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_endpoints(
        profile: ProviderProfile,
        endpoints: EndpointSet,
        verification: Option<VerificationKey>,
        request_timeout: Duration,
    ) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            profile,
            endpoints,
            verification,
        })
    }

    /// The profile this client was built from.
    #[must_use]
    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    /// The discovered endpoint set.
    #[must_use]
    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    /// Builds the authorization redirect URL for `pending`.
    ///
    /// Embeds the state and nonce, the profile's scopes and standing
    /// extra parameters, then any call-specific `extra` parameters.
    #[must_use]
    pub fn auth_uri(
        &self,
        pending: &PendingAuthorization,
        extra: &HashMap<String, String>,
    ) -> Url {
        let mut url = self.endpoints.authorization.clone();
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.profile.client_id);
            params.append_pair("redirect_uri", &self.profile.redirect_url);
            params.append_pair("scope", &self.profile.scopes.join(" "));
            params.append_pair("state", &pending.state);
            params.append_pair("nonce", &pending.nonce);
            for (key, value) in &self.profile.extra_auth_params {
                params.append_pair(key, value);
            }
            for (key, value) in extra {
                params.append_pair(key, value);
            }
        }

        tracing::debug!(
            "Built authorization URL for {}",
            url.as_str().split('?').next().unwrap_or("")
        );
        url
    }

    /// Builds the provider-side logout redirect, when the provider
    /// publishes an end-session endpoint.
    #[must_use]
    pub fn end_session_uri(&self, id_token_hint: Option<&str>) -> Option<Url> {
        let mut url = self.endpoints.end_session.clone()?;
        if let Some(hint) = id_token_hint {
            url.query_pairs_mut().append_pair("id_token_hint", hint);
        }
        Some(url)
    }

    /// Exchanges an authorization code for a token set.
    ///
    /// When the response carries an identity token, its signature,
    /// audience, and nonce are verified against `pending` before the set
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a token-endpoint error
    /// response, or identity token verification failure.
    pub async fn exchange_code(
        &self,
        pending: &PendingAuthorization,
        code: &str,
    ) -> Result<TokenSet, OAuthError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.profile.redirect_url.as_str()),
            ("client_id", self.profile.client_id.as_str()),
        ];
        if let Some(secret) = &self.profile.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        tracing::debug!("Exchanging authorization code at {}", self.endpoints.token);
        let body = self.token_request(&params).await?;

        let tokens = TokenSet {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            id_token: body.id_token,
        };
        if let Some(id_token) = &tokens.id_token {
            self.verify_id_token(id_token, &pending.nonce)?;
        }
        Ok(tokens)
    }

    /// Issues an authenticated request, refreshing and retrying once on
    /// an auth-rejection.
    ///
    /// The core retry protocol: the call is made bearing the current
    /// access token; on a 401, if a refresh token is available, the token
    /// pair is refreshed and the call retried exactly once with the new
    /// access token. Any other status is returned to the caller for
    /// interpretation.
    ///
    /// # Returns
    ///
    /// The (possibly unchanged) token set alongside the response, so the
    /// caller can persist rotation.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, on a 401 with no refresh
    /// token available, on refresh failure, or on a 401 after the retry.
    pub async fn authenticated_request(
        &self,
        tokens: &TokenSet,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<(TokenSet, reqwest::Response), OAuthError> {
        let response = self
            .send_bearer(&tokens.access_token, method.clone(), url.clone(), body)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok((tokens.clone(), response));
        }

        if tokens.refresh_token.is_none() {
            return Err(OAuthError::NoRefreshToken);
        }
        tracing::debug!("Access token rejected; refreshing and retrying once");
        let refreshed = self.refresh(tokens).await?;

        let retry = self
            .send_bearer(&refreshed.access_token, method, url, body)
            .await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(OAuthError::RefreshExhausted);
        }
        Ok((refreshed, retry))
    }

    /// Fetches the userinfo document.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or protocol failure; an absent or
    /// malformed body is `None`, not an error.
    pub async fn userinfo(
        &self,
        tokens: &TokenSet,
    ) -> Result<(TokenSet, Option<Value>), OAuthError> {
        let (tokens, response) = self
            .authenticated_request(tokens, Method::GET, self.endpoints.userinfo.clone(), None)
            .await?;
        let value = Self::read_json_option(response).await?;
        Ok((tokens, value))
    }

    /// Fetches one remote attribute value.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or protocol failure; an unset
    /// attribute (404, absent body, malformed body, or JSON null) is
    /// `None`, not an error.
    pub async fn get_attribute(
        &self,
        tokens: &TokenSet,
        name: &str,
    ) -> Result<(TokenSet, Option<Value>), OAuthError> {
        let url = self.profile.attribute_url(name)?;
        let (tokens, response) = self
            .authenticated_request(tokens, Method::GET, url, None)
            .await?;
        let value = Self::read_json_option(response).await?;
        Ok((tokens, value))
    }

    /// Pushes a bulk attribute write to the provider.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or any non-success status.
    pub async fn bulk_set_attributes(
        &self,
        tokens: &TokenSet,
        values: &HashMap<String, Value>,
    ) -> Result<TokenSet, OAuthError> {
        let url = self.profile.attribute_bulk_url()?;
        let body = serde_json::json!({ "attributes": values });
        let (tokens, response) = self
            .authenticated_request(tokens, Method::POST, url, Some(&body))
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::protocol(status.as_u16(), body));
        }
        Ok(tokens)
    }

    /// Submits a signed JWT payload to the provider.
    ///
    /// # Errors
    ///
    /// Returns an error when the active provider does not accept JWT
    /// submission, on transport failure, any non-success status, or an
    /// empty or malformed response body - on this path an empty body is
    /// itself a failure.
    pub async fn submit_jwt(
        &self,
        tokens: &TokenSet,
        payload: &Value,
    ) -> Result<(TokenSet, Value), OAuthError> {
        if !self.profile.capabilities.jwt_submission {
            return Err(OAuthError::CapabilityUnavailable {
                capability: "jwt_submission".to_string(),
            });
        }
        let url = self.profile.jwt_url()?;
        let (tokens, response) = self
            .authenticated_request(tokens, Method::POST, url, Some(payload))
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::protocol(status.as_u16(), body));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(OAuthError::malformed("empty response to JWT submission"));
        }
        let value = serde_json::from_str(&text)
            .map_err(|e| OAuthError::malformed(format!("JWT submission response: {e}")))?;
        Ok((tokens, value))
    }

    /// Refreshes the token pair, preserving fields the provider does not
    /// reissue.
    async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, OAuthError> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or(OAuthError::NoRefreshToken)?;

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.profile.client_id.as_str()),
        ];
        if let Some(secret) = &self.profile.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let body = self.token_request(&params).await?;
        Ok(TokenSet {
            access_token: body.access_token,
            refresh_token: body
                .refresh_token
                .or_else(|| tokens.refresh_token.clone()),
            id_token: body.id_token.or_else(|| tokens.id_token.clone()),
        })
    }

    /// Form-posts to the token endpoint and parses the response.
    async fn token_request(
        &self,
        params: &[(&str, &str)],
    ) -> Result<TokenEndpointResponse, OAuthError> {
        let response = self
            .http
            .post(self.endpoints.token.clone())
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorBody>(&body) {
                return Err(OAuthError::token_endpoint(
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default(),
                ));
            }
            return Err(OAuthError::protocol(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::malformed(format!("token response: {e}")))
    }

    async fn send_bearer(
        &self,
        access_token: &str,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, OAuthError> {
        let mut request = self.http.request(method, url).bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Verifies an identity token's signature, audience, and nonce.
    ///
    /// Skipped when the deployment supplies no verification key.
    fn verify_id_token(&self, id_token: &str, expected_nonce: &str) -> Result<(), OAuthError> {
        let Some(key) = &self.verification else {
            tracing::warn!("No verification key configured; accepting identity token unchecked");
            return Ok(());
        };
        let (decoding_key, algorithm) = key
            .decoding_key()
            .map_err(|e| OAuthError::identity_token(e.to_string()))?;

        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.profile.client_id]);
        validation.set_issuer(&[self.profile.issuer.trim_end_matches('/')]);

        let data = jsonwebtoken::decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| OAuthError::identity_token(e.to_string()))?;

        match data.claims.nonce.as_deref() {
            Some(nonce) if nonce == expected_nonce => Ok(()),
            Some(_) => Err(OAuthError::identity_token("nonce mismatch")),
            None => Err(OAuthError::identity_token("identity token has no nonce")),
        }
    }

    /// Reads a response body on a read path: absent or malformed JSON is
    /// "no value".
    async fn read_json_option(response: reqwest::Response) -> Result<Option<Value>, OAuthError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::protocol(status.as_u16(), body));
        }
        let text = response.text().await?;
        Ok(serde_json::from_str::<Value>(&text)
            .ok()
            .filter(|value| !value.is_null()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::discovery::ProviderMetadata;

    fn endpoints() -> EndpointSet {
        EndpointSet::from_metadata(&ProviderMetadata {
            issuer: "https://id.example.com".to_string(),
            authorization_endpoint: "https://id.example.com/authorize".to_string(),
            token_endpoint: "https://id.example.com/token".to_string(),
            userinfo_endpoint: Some("https://id.example.com/userinfo".to_string()),
            end_session_endpoint: Some("https://id.example.com/logout".to_string()),
        })
        .unwrap()
    }

    fn client() -> OAuthClient {
        OAuthClient::with_endpoints(
            ProviderProfile::account("https://id.example.com", "client-1", "https://rp/cb"),
            endpoints(),
            None,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_pending_authorization_values_are_unique() {
        let first = PendingAuthorization::generate();
        let second = PendingAuthorization::generate();
        assert_ne!(first.state, second.state);
        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn test_auth_uri_embeds_state_and_nonce() {
        let client = client();
        let pending = PendingAuthorization::generate();
        let url = client.auth_uri(&pending, &HashMap::new());

        let query: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "client-1");
        assert_eq!(query["state"], pending.state);
        assert_eq!(query["nonce"], pending.nonce);
        assert_eq!(query["scope"], "openid email profile");
    }

    #[test]
    fn test_auth_uri_appends_extra_params() {
        let client = client();
        let pending = PendingAuthorization::generate();
        let mut extra = HashMap::new();
        extra.insert("vtr".to_string(), "[\"Cl.Cm\"]".to_string());
        let url = client.auth_uri(&pending, &extra);
        assert!(url.query().unwrap_or("").contains("vtr="));
    }

    #[test]
    fn test_end_session_uri_carries_hint() {
        let client = client();
        let url = client.end_session_uri(Some("id-token")).unwrap();
        assert!(url.as_str().starts_with("https://id.example.com/logout"));
        assert!(url.query().unwrap_or("").contains("id_token_hint=id-token"));
    }
}
