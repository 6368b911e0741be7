//! The account session.
//!
//! An [`AccountSession`] is the decoded, in-memory representation of an
//! authenticated user for one request. It is constructed either from raw
//! tokens right after a successful authorization exchange, or from the
//! session token header on every subsequent request; it is destroyed at
//! the end of the request, persisting nothing beyond its re-serialized
//! token.
//!
//! # Lifecycle
//!
//! 1. Session constructed (**Live**)
//! 2. Attribute operations run; identity-provider calls may rotate the
//!    token pair
//! 3. `serialise()` seals the session (**Sealed**) and returns the token
//!    for the current pair
//! 4. Session dropped
//!
//! Once sealed, any code path that would reach the identity provider
//! fails with `FrozenSession`: the serialized token is the session's
//! final word, and a rotation after sealing would be silently lost.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::attributes::{AttributeOperation, AttributeSchema, AttributeStorage};
use crate::error::{SessionError, SessionRejection};
use crate::oauth::{OAuthClient, OAuthError};
use crate::token::{self, CURRENT_SESSION_VERSION, SessionPayload};
use crate::types::{AuthLevel, IdentitySource, TokenSet};
use signet_store::DynUserRecordStore;

/// Everything a session needs from its deployment: the provider client,
/// the persisted user record, the attribute table, and the codec secret.
///
/// Cheap to clone; one context is built at process start and handed to
/// every request.
#[derive(Clone)]
pub struct SessionContext {
    client: Arc<OAuthClient>,
    user_records: DynUserRecordStore,
    schema: Arc<AttributeSchema>,
    session_secret: String,
}

impl SessionContext {
    /// Creates a context.
    #[must_use]
    pub fn new(
        client: Arc<OAuthClient>,
        user_records: DynUserRecordStore,
        schema: Arc<AttributeSchema>,
        session_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            user_records,
            schema,
            session_secret: session_secret.into(),
        }
    }
}

/// Live/Sealed state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Outbound identity-provider calls are allowed; tokens may rotate.
    Live,
    /// `serialise()` has been called; no further provider calls.
    Sealed,
}

/// The in-memory representation of an authenticated user for one request.
pub struct AccountSession {
    context: SessionContext,
    tokens: TokenSet,
    user_id: Option<String>,
    level: AuthLevel,
    mfa: bool,
    source: IdentitySource,
    state: SessionState,
}

impl AccountSession {
    /// Builds a session from raw tokens and explicit metadata, right
    /// after a successful authorization exchange.
    ///
    /// The identity source is the active provider's - a fresh session can
    /// only have been issued by it.
    #[must_use]
    pub fn from_tokens(
        context: SessionContext,
        tokens: TokenSet,
        user_id: Option<String>,
        level: AuthLevel,
        mfa: bool,
    ) -> Self {
        let source = context.client.profile().source;
        Self {
            context,
            tokens,
            user_id,
            level,
            mfa,
            source,
            state: SessionState::Live,
        }
    }

    /// Builds a session from a decoded payload.
    ///
    /// Versionless payloads are legacy shapes: the level defaults from
    /// the MFA flag, the source defaults to the first-party account
    /// system, and a missing user id is discovered lazily via a userinfo
    /// call. A payload carrying any version other than the current one is
    /// rejected, as is one whose identity source is not the deployment's
    /// active provider.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason; callers at the decode boundary map
    /// it to "no session".
    pub fn from_payload(
        context: SessionContext,
        payload: SessionPayload,
    ) -> Result<Self, SessionRejection> {
        if let Some(version) = payload.version {
            if version != CURRENT_SESSION_VERSION {
                return Err(SessionRejection::UnsupportedVersion { found: version });
            }
        }

        let source = payload.effective_source();
        if source != context.client.profile().source {
            return Err(SessionRejection::StaleIdentitySource { source });
        }

        Ok(Self {
            tokens: payload.tokens(),
            user_id: payload.user_id.clone(),
            level: payload.effective_level(),
            mfa: payload.mfa,
            source,
            state: SessionState::Live,
            context,
        })
    }

    /// Reconstructs a session from a session token header value.
    ///
    /// Returns `None` - never an error - when the token does not decode
    /// or the payload is rejected; a malformed or stale session header is
    /// an expected condition. The rejection kind is logged.
    #[must_use]
    pub fn from_token(context: SessionContext, raw: &str) -> Option<Self> {
        let payload = token::decrypt(raw, &context.session_secret)?;
        match Self::from_payload(context, payload) {
            Ok(session) => Some(session),
            Err(rejection) => {
                tracing::debug!("Rejected session token: {rejection}");
                None
            }
        }
    }

    /// The session's authentication level.
    #[must_use]
    pub fn auth_level(&self) -> AuthLevel {
        self.level
    }

    /// Whether the session was authenticated with MFA.
    #[must_use]
    pub fn has_mfa(&self) -> bool {
        self.mfa
    }

    /// Which identity provider issued this session.
    #[must_use]
    pub fn identity_source(&self) -> IdentitySource {
        self.source
    }

    /// The session's state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` once `serialise()` has been called.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.state == SessionState::Sealed
    }

    /// The current (possibly rotated) token set.
    #[must_use]
    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    /// The user identifier, discovering it via a userinfo call on first
    /// need for sessions whose payload carried none.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is sealed, the userinfo call
    /// fails, or the userinfo document carries no subject.
    pub async fn user_id(&mut self) -> Result<String, SessionError> {
        if let Some(user_id) = &self.user_id {
            return Ok(user_id.clone());
        }

        let client = self.provider()?;
        let (tokens, info) = client.userinfo(&self.tokens).await?;
        self.tokens = tokens;

        let subject = info
            .as_ref()
            .and_then(|document| document.get("sub"))
            .and_then(Value::as_str)
            .ok_or_else(|| OAuthError::malformed("userinfo document has no subject"))?
            .to_string();
        tracing::debug!("Discovered user id via userinfo");
        self.user_id = Some(subject.clone());
        Ok(subject)
    }

    /// Reads the requested attributes, merging local, remote, and cached
    /// values and dropping absent ones.
    ///
    /// Local attributes come from the persisted user record. Remote
    /// attributes are fetched live on every call. Cached attributes are
    /// read from the user record first; each requested name with no
    /// cached value is fetched remotely once and every non-null result is
    /// persisted, so the next request makes no remote call for it.
    ///
    /// # Errors
    ///
    /// Returns an error when a name is unknown, the session's level is
    /// below a get threshold, the session is sealed and a remote fetch is
    /// needed, or a provider or store call fails.
    pub async fn get_attributes(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, Value>, SessionError> {
        let schema = Arc::clone(&self.context.schema);
        schema.check_defined(names)?;
        schema.check_level(names, AttributeOperation::Get, self.level, self.mfa)?;

        let mut local_names = Vec::new();
        let mut remote_names = Vec::new();
        let mut cached_names = Vec::new();
        for name in names {
            match schema.storage(name) {
                Some(AttributeStorage::Local) => local_names.push(name.clone()),
                Some(AttributeStorage::Remote) => remote_names.push(name.clone()),
                Some(AttributeStorage::Cached) => cached_names.push(name.clone()),
                None => {}
            }
        }

        let mut values = HashMap::new();

        if !local_names.is_empty() || !cached_names.is_empty() {
            let user_id = self.user_id().await?;
            let mut stored_names = local_names;
            stored_names.extend(cached_names.iter().cloned());
            let stored = self
                .context
                .user_records
                .get_attributes(&user_id, &stored_names)
                .await?;

            let mut fetched = HashMap::new();
            for name in &cached_names {
                if stored.contains_key(name) {
                    continue;
                }
                if let Some(value) = self.fetch_remote(name).await? {
                    fetched.insert(name.clone(), value);
                }
            }
            if !fetched.is_empty() {
                self.context
                    .user_records
                    .set_attributes(&user_id, &fetched)
                    .await?;
            }

            values.extend(stored);
            values.extend(fetched);
        }

        for name in &remote_names {
            if let Some(value) = self.fetch_remote(name).await? {
                values.insert(name.clone(), value);
            }
        }

        values.retain(|_, value| !value.is_null());
        Ok(values)
    }

    /// Writes the given attributes.
    ///
    /// Local and cached values are persisted to the user record; remote
    /// and cached values are additionally pushed to the identity provider
    /// in one bulk call. Local persistence fully completes before the
    /// remote push starts, and a push failure fails the whole operation.
    ///
    /// # Errors
    ///
    /// Returns an error when a name is unknown or unwritable, the
    /// session's level is below a set threshold, the active provider has
    /// no remote-write capability and remote or cached names were given,
    /// the session is sealed and a push is needed, or a provider or store
    /// call fails.
    pub async fn set_attributes(
        &mut self,
        values: &HashMap<String, Value>,
    ) -> Result<(), SessionError> {
        let names: Vec<String> = values.keys().cloned().collect();
        let schema = Arc::clone(&self.context.schema);
        schema.check_defined(&names)?;
        schema.check_writable(&names)?;
        schema.check_level(&names, AttributeOperation::Set, self.level, self.mfa)?;

        let mut local_values = HashMap::new();
        let mut remote_values = HashMap::new();
        for (name, value) in values {
            match schema.storage(name) {
                Some(AttributeStorage::Local) => {
                    local_values.insert(name.clone(), value.clone());
                }
                Some(AttributeStorage::Remote) => {
                    remote_values.insert(name.clone(), value.clone());
                }
                Some(AttributeStorage::Cached) => {
                    local_values.insert(name.clone(), value.clone());
                    remote_values.insert(name.clone(), value.clone());
                }
                None => {}
            }
        }

        if !remote_values.is_empty()
            && !self.context.client.profile().capabilities.attribute_write
        {
            let mut names: Vec<String> = remote_values.into_keys().collect();
            names.sort();
            return Err(SessionError::cannot_set_remote(names));
        }

        if !local_values.is_empty() {
            let user_id = self.user_id().await?;
            self.context
                .user_records
                .set_attributes(&user_id, &local_values)
                .await?;
        }

        if !remote_values.is_empty() {
            let client = self.provider()?;
            let tokens = client
                .bulk_set_attributes(&self.tokens, &remote_values)
                .await?;
            self.tokens = tokens;
        }

        Ok(())
    }

    /// Seals the session and returns its token.
    ///
    /// The token carries the current (possibly rotated) token pair and
    /// metadata. Sealing is permanent: any later identity-provider call
    /// from this instance fails with `FrozenSession`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be sealed.
    pub fn serialise(&mut self) -> Result<String, SessionError> {
        self.state = SessionState::Sealed;
        let payload = SessionPayload::current(
            &self.tokens,
            self.user_id.clone(),
            self.level,
            self.mfa,
            self.source,
        );
        Ok(token::encrypt(&payload, &self.context.session_secret)?)
    }

    /// The sole accessor to the provider client. Every outbound call
    /// goes through here, which is what makes the sealed state
    /// impossible to bypass.
    fn provider(&self) -> Result<Arc<OAuthClient>, SessionError> {
        match self.state {
            SessionState::Live => Ok(Arc::clone(&self.context.client)),
            SessionState::Sealed => Err(SessionError::FrozenSession),
        }
    }

    async fn fetch_remote(&mut self, name: &str) -> Result<Option<Value>, SessionError> {
        let client = self.provider()?;
        let (tokens, value) = client.get_attribute(&self.tokens, name).await?;
        self.tokens = tokens;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeDefinition;
    use crate::oauth::{EndpointSet, ProviderMetadata, ProviderProfile};
    use serde_json::json;
    use signet_store_memory::MemoryUserRecords;
    use std::time::Duration;

    const SECRET: &str = "session-secret";

    fn endpoints() -> EndpointSet {
        EndpointSet::from_metadata(&ProviderMetadata {
            issuer: "https://id.example.com".to_string(),
            authorization_endpoint: "https://id.example.com/authorize".to_string(),
            token_endpoint: "https://id.example.com/token".to_string(),
            userinfo_endpoint: Some("https://id.example.com/userinfo".to_string()),
            end_session_endpoint: None,
        })
        .unwrap()
    }

    fn context_for(profile: ProviderProfile) -> SessionContext {
        let client =
            OAuthClient::with_endpoints(profile, endpoints(), None, Duration::from_secs(5))
                .unwrap();
        let schema = AttributeSchema::load(vec![
            AttributeDefinition {
                name: "feedback_consent".to_string(),
                storage: AttributeStorage::Local,
                writable: true,
                check_level: AuthLevel(0),
                get_level: AuthLevel(0),
                set_level: AuthLevel(0),
            },
            AttributeDefinition {
                name: "email".to_string(),
                storage: AttributeStorage::Remote,
                writable: true,
                check_level: AuthLevel(0),
                get_level: AuthLevel(0),
                set_level: AuthLevel(1),
            },
        ])
        .unwrap();
        SessionContext::new(
            Arc::new(client),
            Arc::new(MemoryUserRecords::new()),
            Arc::new(schema),
            SECRET,
        )
    }

    fn context() -> SessionContext {
        context_for(ProviderProfile::account(
            "https://id.example.com",
            "client-1",
            "https://rp/cb",
        ))
    }

    fn live_session(context: SessionContext) -> AccountSession {
        AccountSession::from_tokens(
            context,
            TokenSet::new("access").with_refresh_token("refresh"),
            Some("user-1".to_string()),
            AuthLevel::MFA,
            true,
        )
    }

    #[test]
    fn test_token_round_trip_preserves_metadata() {
        let mut session = live_session(context());
        let token = session.serialise().unwrap();

        let restored = AccountSession::from_token(context(), &token).unwrap();
        assert_eq!(restored.auth_level(), AuthLevel::MFA);
        assert!(restored.has_mfa());
        assert_eq!(restored.identity_source(), IdentitySource::Account);
        assert_eq!(restored.tokens().access_token, "access");
        assert!(!restored.is_sealed());
    }

    #[test]
    fn test_version_gate() {
        let mut payload = SessionPayload::current(
            &TokenSet::new("access"),
            Some("user-1".to_string()),
            AuthLevel(0),
            false,
            IdentitySource::Account,
        );
        payload.version = Some(CURRENT_SESSION_VERSION + 1);

        let result = AccountSession::from_payload(context(), payload.clone());
        assert!(matches!(
            result,
            Err(SessionRejection::UnsupportedVersion { found }) if found == CURRENT_SESSION_VERSION + 1
        ));

        // The same payload through the token path is "no session".
        let token = token::encrypt(&payload, SECRET).unwrap();
        assert!(AccountSession::from_token(context(), &token).is_none());
    }

    #[test]
    fn test_stale_identity_source_rejected() {
        // Deployment migrated to the digital-identity provider; a session
        // from the account system is too old to honor.
        let digital_context = context_for(ProviderProfile::digital_identity(
            "https://id.example.com",
            "client-1",
            "https://rp/cb",
        ));
        let payload = SessionPayload::current(
            &TokenSet::new("access"),
            Some("user-1".to_string()),
            AuthLevel(0),
            false,
            IdentitySource::Account,
        );
        let result = AccountSession::from_payload(digital_context, payload);
        assert!(matches!(
            result,
            Err(SessionRejection::StaleIdentitySource { .. })
        ));
    }

    #[test]
    fn test_legacy_payload_defaults() {
        let payload = SessionPayload::legacy("access".to_string(), "refresh".to_string());
        let session = AccountSession::from_payload(context(), payload).unwrap();
        assert_eq!(session.auth_level(), AuthLevel::SINGLE_FACTOR);
        assert!(!session.has_mfa());
        assert_eq!(session.identity_source(), IdentitySource::Account);
    }

    #[tokio::test]
    async fn test_sealed_session_refuses_provider_calls() {
        let mut session = live_session(context());
        session.serialise().unwrap();

        let result = session.get_attributes(&["email".to_string()]).await;
        assert!(matches!(result, Err(SessionError::FrozenSession)));
    }

    #[tokio::test]
    async fn test_local_attributes_survive_sealing() {
        // Local reads need no provider call, so they still work sealed.
        let context = context();
        let mut session = live_session(context.clone());
        let mut values = HashMap::new();
        values.insert("feedback_consent".to_string(), json!(true));
        session.set_attributes(&values).await.unwrap();
        session.serialise().unwrap();

        let got = session
            .get_attributes(&["feedback_consent".to_string()])
            .await
            .unwrap();
        assert_eq!(got["feedback_consent"], json!(true));
    }

    #[tokio::test]
    async fn test_unknown_names_rejected() {
        let mut session = live_session(context());
        let result = session.get_attributes(&["ghost".to_string()]).await;
        assert!(matches!(
            result,
            Err(SessionError::Attribute(
                crate::attributes::AttributeError::UnknownAttributeNames { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_remote_write_refused_without_capability() {
        let context = context_for(ProviderProfile::digital_identity(
            "https://id.example.com",
            "client-1",
            "https://rp/cb",
        ));
        let mut session = AccountSession::from_tokens(
            context,
            TokenSet::new("access"),
            Some("user-1".to_string()),
            AuthLevel::MFA,
            true,
        );
        let mut values = HashMap::new();
        values.insert("email".to_string(), json!("user@example.com"));

        let result = session.set_attributes(&values).await;
        assert!(matches!(
            result,
            Err(SessionError::CannotSetRemoteAttribute { names }) if names == vec!["email".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_set_refused_below_threshold() {
        let mut session = AccountSession::from_tokens(
            context(),
            TokenSet::new("access"),
            Some("user-1".to_string()),
            AuthLevel(0),
            false,
        );
        let mut values = HashMap::new();
        values.insert("email".to_string(), json!("user@example.com"));

        let result = session.set_attributes(&values).await;
        assert!(matches!(
            result,
            Err(SessionError::Attribute(
                crate::attributes::AttributeError::LevelTooLow { needed, .. }
            )) if needed == AuthLevel(1)
        ));
    }
}
