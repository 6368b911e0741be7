//! Deployment configuration for the identity core.
//!
//! Configuration is injected, validated data: the attribute table and
//! provider profile are loaded once at process start and are immutable
//! thereafter. Validation is a pure function over the loaded values,
//! testable without touching the file system.
//!
//! # Example (TOML)
//!
//! ```toml
//! session_secret = "change-me"
//! request_timeout = "30s"
//! replay_ttl = "2m"
//!
//! [provider]
//! source = "account"
//! issuer = "https://account.example.com"
//! client_id = "signet"
//! redirect_url = "https://www.example.com/sign-in/callback"
//!
//! [verification]
//! kind = "hmac"
//! secret = "token-verification-secret"
//!
//! [[attributes]]
//! name = "email"
//! storage = "cached"
//! writable = true
//! set_level = 1
//! ```

use std::path::Path;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeDefinition, AttributeSchema, SchemaError};
use crate::oauth::ProviderProfile;

/// Key material for verifying provider-signed tokens (identity tokens and
/// backchannel logout tokens).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationKey {
    /// Shared-secret HMAC verification (HS256).
    Hmac {
        /// The shared secret.
        secret: String,
    },
    /// RSA public-key verification (RS256).
    RsaPem {
        /// PEM-encoded RSA public key.
        public_key: String,
    },
}

impl VerificationKey {
    /// Resolves the decoding key and algorithm for this key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the key material does not parse.
    pub fn decoding_key(&self) -> Result<(DecodingKey, Algorithm), jsonwebtoken::errors::Error> {
        match self {
            Self::Hmac { secret } => {
                Ok((DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256))
            }
            Self::RsaPem { public_key } => Ok((
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
                Algorithm::RS256,
            )),
        }
    }
}

/// Root configuration for the identity core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Secret the session token codec derives per-call keys from.
    pub session_secret: String,

    /// The active identity-provider profile.
    pub provider: ProviderProfile,

    /// Key material for verifying provider-signed tokens. When absent,
    /// identity tokens are accepted unchecked and logout tokens cannot be
    /// verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationKey>,

    /// Timeout applied to every identity-provider HTTP call.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How long a logout token's single-use identifier stays marked as
    /// used.
    #[serde(with = "humantime_serde")]
    pub replay_ttl: Duration,

    /// The declarative attribute table.
    pub attributes: Vec<AttributeDefinition>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            provider: ProviderProfile::default(),
            verification: None,
            request_timeout: Duration::from_secs(30),
            replay_ttl: Duration::from_secs(120),
            attributes: Vec::new(),
        }
    }
}

/// Error types for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document did not parse.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The configuration parsed but is not valid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The attribute table violates the threshold ordering invariant.
    #[error("Attribute table error: {0}")]
    Schema(#[from] SchemaError),
}

impl IdentityConfig {
    /// Parses a TOML configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails
    /// validation.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Validates the configuration, including the attribute table.
    ///
    /// # Errors
    ///
    /// Returns an error when the session secret is empty or the attribute
    /// table is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_secret.is_empty() {
            return Err(ConfigError::Validation(
                "session_secret must not be empty".to_string(),
            ));
        }
        self.attribute_schema()?;
        Ok(())
    }

    /// Builds the validated attribute schema from the configured table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table violates the ordering invariant.
    pub fn attribute_schema(&self) -> Result<AttributeSchema, SchemaError> {
        AttributeSchema::load(self.attributes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeStorage;
    use crate::types::IdentitySource;

    const SAMPLE: &str = r#"
        session_secret = "secret"
        request_timeout = "10s"
        replay_ttl = "2m"

        [provider]
        source = "digital_identity"
        issuer = "https://identity.example.com"
        client_id = "signet"
        redirect_url = "https://www.example.com/callback"

        [provider.capabilities]
        attribute_write = false

        [verification]
        kind = "hmac"
        secret = "verify"

        [[attributes]]
        name = "email"
        storage = "cached"
        writable = true
        set_level = 1
    "#;

    #[test]
    fn test_parses_full_document() {
        let config = IdentityConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.provider.source, IdentitySource::DigitalIdentity);
        assert!(!config.provider.capabilities.attribute_write);
        assert_eq!(config.replay_ttl, Duration::from_secs(120));

        let schema = config.attribute_schema().unwrap();
        assert_eq!(schema.storage("email"), Some(AttributeStorage::Cached));
    }

    #[test]
    fn test_rejects_empty_session_secret() {
        let result = IdentityConfig::from_toml_str("session_secret = \"\"");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_invalid_attribute_table() {
        let raw = r#"
            session_secret = "secret"

            [[attributes]]
            name = "email"
            storage = "local"
            check_level = 2
            get_level = 0
        "#;
        let result = IdentityConfig::from_toml_str(raw);
        assert!(matches!(result, Err(ConfigError::Schema(_))));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = IdentityConfig::load_from_path(&path).unwrap();
        assert_eq!(config.session_secret, "secret");
    }

    #[test]
    fn test_hmac_verification_key_resolves() {
        let key = VerificationKey::Hmac {
            secret: "verify".to_string(),
        };
        let (_, algorithm) = key.decoding_key().unwrap();
        assert_eq!(algorithm, Algorithm::HS256);
    }
}
