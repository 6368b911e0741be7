//! OAuth client protocol tests against a mock identity provider.

use std::collections::HashMap;
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use signet_auth::oauth::{EndpointSet, OAuthClient, OAuthError, PendingAuthorization};
use signet_auth::{ProviderProfile, TokenSet, VerificationKey};

const VERIFY_SECRET: &str = "id-token-verification-secret";

fn profile(server: &MockServer) -> ProviderProfile {
    ProviderProfile::account(server.uri(), "client-1", "https://rp.example.com/callback")
        .with_client_secret("client-secret")
}

fn endpoints(server: &MockServer) -> EndpointSet {
    EndpointSet::from_metadata(&signet_auth::oauth::ProviderMetadata {
        issuer: server.uri(),
        authorization_endpoint: format!("{}/authorize", server.uri()),
        token_endpoint: format!("{}/token", server.uri()),
        userinfo_endpoint: Some(format!("{}/userinfo", server.uri())),
        end_session_endpoint: None,
    })
    .unwrap()
}

fn client(server: &MockServer) -> OAuthClient {
    OAuthClient::with_endpoints(
        profile(server),
        endpoints(server),
        None,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn verifying_client(server: &MockServer) -> OAuthClient {
    OAuthClient::with_endpoints(
        profile(server),
        endpoints(server),
        Some(VerificationKey::Hmac {
            secret: VERIFY_SECRET.to_string(),
        }),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn id_token(server: &MockServer, nonce: &str) -> String {
    let claims = json!({
        "iss": server.uri(),
        "sub": "user-1",
        "aud": "client-1",
        "exp": time::OffsetDateTime::now_utc().unix_timestamp() + 3600,
        "nonce": nonce,
    });
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(VERIFY_SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn discovers_endpoints_from_metadata_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
            "userinfo_endpoint": format!("{}/userinfo", server.uri()),
            "end_session_endpoint": format!("{}/logout", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OAuthClient::discover(profile(&server), None, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(
        client.endpoints().token.as_str(),
        format!("{}/token", server.uri())
    );
    assert!(client.endpoints().end_session.is_some());
}

#[tokio::test]
async fn discovery_rejects_issuer_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": "https://somewhere-else.example.com",
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
            "userinfo_endpoint": format!("{}/userinfo", server.uri()),
        })))
        .mount(&server)
        .await;

    let result = OAuthClient::discover(profile(&server), None, Duration::from_secs(5)).await;
    assert!(matches!(result, Err(OAuthError::IssuerMismatch { .. })));
}

#[tokio::test]
async fn exchanges_code_for_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("client_secret=client-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let pending = PendingAuthorization::generate();
    let tokens = client.exchange_code(&pending, "auth-code").await.unwrap();
    assert_eq!(tokens.access_token, "access-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(tokens.id_token, None);
}

#[tokio::test]
async fn exchange_verifies_identity_token_nonce() {
    let server = MockServer::start().await;
    let pending = PendingAuthorization::generate();
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "id_token": id_token(&server, &pending.nonce),
        })))
        .mount(&server)
        .await;

    let client = verifying_client(&server);
    let tokens = client.exchange_code(&pending, "auth-code").await.unwrap();
    assert!(tokens.id_token.is_some());

    // A different pending request has a different nonce: rejected.
    let other = PendingAuthorization::generate();
    let result = client.exchange_code(&other, "auth-code").await;
    assert!(matches!(result, Err(OAuthError::IdentityToken { .. })));
}

#[tokio::test]
async fn exchange_surfaces_token_endpoint_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "code expired",
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let pending = PendingAuthorization::generate();
    let result = client.exchange_code(&pending, "stale-code").await;
    assert!(matches!(
        result,
        Err(OAuthError::TokenEndpoint { error, .. }) if error == "invalid_grant"
    ));
}

#[tokio::test]
async fn refreshes_and_retries_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "refresh-2",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "user-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let tokens = TokenSet::new("stale").with_refresh_token("refresh-1");
    let (rotated, info) = client.userinfo(&tokens).await.unwrap();

    assert_eq!(rotated.access_token, "fresh");
    assert_eq!(rotated.refresh_token.as_deref(), Some("refresh-2"));
    assert_eq!(info.unwrap()["sub"], json!("user-1"));
}

#[tokio::test]
async fn refresh_keeps_old_refresh_token_when_not_reissued() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "user-1"})))
        .mount(&server)
        .await;

    let client = client(&server);
    let tokens = TokenSet::new("stale").with_refresh_token("refresh-1");
    let (rotated, _) = client.userinfo(&tokens).await.unwrap();
    assert_eq!(rotated.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn unauthorized_without_refresh_token_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.userinfo(&TokenSet::new("stale")).await;
    assert!(matches!(result, Err(OAuthError::NoRefreshToken)));
}

#[tokio::test]
async fn failed_refresh_fails_without_second_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token revoked",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let tokens = TokenSet::new("stale").with_refresh_token("revoked");
    let result = client.userinfo(&tokens).await;
    assert!(matches!(result, Err(OAuthError::TokenEndpoint { .. })));
}

#[tokio::test]
async fn rejection_after_refresh_is_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let tokens = TokenSet::new("stale").with_refresh_token("refresh-1");
    let result = client.userinfo(&tokens).await;
    assert!(matches!(result, Err(OAuthError::RefreshExhausted)));
}

#[tokio::test]
async fn missing_attribute_reads_as_no_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/attributes/unset"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/attributes/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/attributes/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/attributes/set"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"verified": true})))
        .mount(&server)
        .await;

    let client = client(&server);
    let tokens = TokenSet::new("access");
    assert_eq!(client.get_attribute(&tokens, "unset").await.unwrap().1, None);
    assert_eq!(client.get_attribute(&tokens, "empty").await.unwrap().1, None);
    assert_eq!(
        client.get_attribute(&tokens, "garbled").await.unwrap().1,
        None
    );
    assert_eq!(
        client.get_attribute(&tokens, "set").await.unwrap().1,
        Some(json!({"verified": true}))
    );
}

#[tokio::test]
async fn bulk_set_posts_attribute_map() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/attributes"))
        .and(body_string_contains("email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut values = HashMap::new();
    values.insert("email".to_string(), json!("user@example.com"));
    client
        .bulk_set_attributes(&TokenSet::new("access"), &values)
        .await
        .unwrap();
}

#[tokio::test]
async fn jwt_submission_requires_a_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/jwt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client
        .submit_jwt(&TokenSet::new("access"), &json!({"claim": "value"}))
        .await;
    assert!(matches!(result, Err(OAuthError::MalformedResponse { .. })));
}

#[tokio::test]
async fn jwt_submission_refused_without_capability() {
    let server = MockServer::start().await;
    let client = OAuthClient::with_endpoints(
        ProviderProfile::digital_identity(server.uri(), "client-1", "https://rp/cb"),
        endpoints(&server),
        None,
        Duration::from_secs(5),
    )
    .unwrap();

    let result = client
        .submit_jwt(&TokenSet::new("access"), &json!({"claim": "value"}))
        .await;
    assert!(matches!(
        result,
        Err(OAuthError::CapabilityUnavailable { capability }) if capability == "jwt_submission"
    ));
}

#[tokio::test]
async fn jwt_submission_returns_parsed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "receipt-1"})))
        .mount(&server)
        .await;

    let client = client(&server);
    let (_, receipt) = client
        .submit_jwt(&TokenSet::new("access"), &json!({"claim": "value"}))
        .await
        .unwrap();
    assert_eq!(receipt["id"], json!("receipt-1"));
}
