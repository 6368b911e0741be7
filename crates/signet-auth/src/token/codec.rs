//! Authenticated encryption of session payloads.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use super::payload::SessionPayload;

/// Salt size for key derivation (128 bits).
const SALT_SIZE: usize = 16;

/// Nonce size for AES-256-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits).
const KEY_SIZE: usize = 32;

/// Separates the salt segment from the sealed segment. Not part of the
/// base64url alphabet, so it can never occur inside either segment.
const PART_SEPARATOR: char = '$';

/// Separates the two segments of the legacy unauthenticated format.
const LEGACY_SEPARATOR: char = '.';

/// Domain-separation info for key derivation.
const KEY_INFO: &[u8] = b"signet session token v1";

/// Errors that can occur while sealing a payload.
///
/// Opening a token is infallible by design - every failure mode maps to
/// `None` - so only the encrypt direction carries an error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload could not be serialized or encrypted.
    #[error("Failed to seal session payload: {message}")]
    Seal {
        /// Description of the failure.
        message: String,
    },
}

impl CodecError {
    fn seal(message: impl Into<String>) -> Self {
        Self::Seal {
            message: message.into(),
        }
    }
}

/// Seals `payload` into an opaque token string.
///
/// A fresh random salt is drawn per call and a per-call AES-256-GCM key is
/// derived from `secret` and the salt via HKDF-SHA256, so two calls with
/// identical inputs produce unrelated tokens. The result is
/// `base64url(salt) $ base64url(nonce || ciphertext)` - safe for header
/// transport.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized or encrypted.
/// Neither happens for well-formed payloads; the error exists so the
/// failure is propagated rather than panicking.
pub fn encrypt(payload: &SessionPayload, secret: &str) -> Result<String, CodecError> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let key = derive_key(secret, &salt)
        .ok_or_else(|| CodecError::seal("key derivation failed"))?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CodecError::seal(format!("failed to create cipher: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = serde_json::to_vec(payload)
        .map_err(|e| CodecError::seal(format!("failed to serialize payload: {e}")))?;
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_slice())
        .map_err(|e| CodecError::seal(format!("encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(format!(
        "{}{}{}",
        URL_SAFE_NO_PAD.encode(salt),
        PART_SEPARATOR,
        URL_SAFE_NO_PAD.encode(sealed)
    ))
}

/// Opens a token string, returning `None` on any failure.
///
/// Returns `None` when the input is empty or blank, is not valid base64url,
/// does not split into exactly two `$`-delimited parts, fails
/// authentication (tampering or a different secret), or does not
/// deserialize into a payload.
///
/// Input with no `$` separator is tried as the legacy unauthenticated
/// format instead: `base64url(access_token) . base64url(refresh_token)`,
/// with no integrity or expiry protection. Any malformed variant of that
/// also yields `None`.
#[must_use]
pub fn decrypt(token: &str, secret: &str) -> Option<SessionPayload> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let parts: Vec<&str> = token.split(PART_SEPARATOR).collect();
    match parts.as_slice() {
        [salt_part, sealed_part] => decrypt_sealed(salt_part, sealed_part, secret),
        [_] => decrypt_legacy(token),
        _ => None,
    }
}

/// Derives the per-call AES key from the secret and salt.
fn derive_key(secret: &str, salt: &[u8]) -> Option<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), secret.as_bytes());
    let mut key = [0u8; KEY_SIZE];
    hkdf.expand(KEY_INFO, &mut key).ok()?;
    Some(key)
}

fn decrypt_sealed(salt_part: &str, sealed_part: &str, secret: &str) -> Option<SessionPayload> {
    let salt = URL_SAFE_NO_PAD.decode(salt_part).ok()?;
    let sealed = URL_SAFE_NO_PAD.decode(sealed_part).ok()?;
    if salt.len() != SALT_SIZE || sealed.len() <= NONCE_SIZE {
        return None;
    }

    let key = derive_key(secret, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key).ok()?;

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .ok()?;

    serde_json::from_slice(&plaintext).ok()
}

fn decrypt_legacy(token: &str) -> Option<SessionPayload> {
    let (access_part, refresh_part) = token.split_once(LEGACY_SEPARATOR)?;
    if refresh_part.contains(LEGACY_SEPARATOR) {
        return None;
    }

    let access_token = String::from_utf8(URL_SAFE_NO_PAD.decode(access_part).ok()?).ok()?;
    let refresh_token = String::from_utf8(URL_SAFE_NO_PAD.decode(refresh_part).ok()?).ok()?;
    if access_token.is_empty() || refresh_token.is_empty() {
        return None;
    }

    Some(SessionPayload::legacy(access_token, refresh_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthLevel, IdentitySource, TokenSet};

    const SECRET: &str = "test-signing-secret";

    fn sample_payload() -> SessionPayload {
        SessionPayload::current(
            &TokenSet::new("access-token")
                .with_refresh_token("refresh-token")
                .with_id_token("id-token"),
            Some("user-1".to_string()),
            AuthLevel::MFA,
            true,
            IdentitySource::Account,
        )
    }

    #[test]
    fn test_round_trip() {
        let payload = sample_payload();
        let token = encrypt(&payload, SECRET).unwrap();
        assert_eq!(decrypt(&token, SECRET), Some(payload));
    }

    #[test]
    fn test_tokens_are_unique_per_call() {
        let payload = sample_payload();
        let first = encrypt(&payload, SECRET).unwrap();
        let second = encrypt(&payload, SECRET).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_wrong_secret_returns_none() {
        let token = encrypt(&sample_payload(), SECRET).unwrap();
        assert_eq!(decrypt(&token, "a-different-secret"), None);
    }

    #[test]
    fn test_any_single_byte_flip_returns_none() {
        let token = encrypt(&sample_payload(), SECRET).unwrap();
        let (salt_part, sealed_part) = token.split_once(PART_SEPARATOR).unwrap();

        let mut salt = URL_SAFE_NO_PAD.decode(salt_part).unwrap();
        for i in 0..salt.len() {
            salt[i] ^= 0x01;
            let tampered = format!(
                "{}{}{}",
                URL_SAFE_NO_PAD.encode(&salt),
                PART_SEPARATOR,
                sealed_part
            );
            assert_eq!(decrypt(&tampered, SECRET), None, "salt byte {i}");
            salt[i] ^= 0x01;
        }

        let mut sealed = URL_SAFE_NO_PAD.decode(sealed_part).unwrap();
        for i in 0..sealed.len() {
            sealed[i] ^= 0x01;
            let tampered = format!(
                "{}{}{}",
                salt_part,
                PART_SEPARATOR,
                URL_SAFE_NO_PAD.encode(&sealed)
            );
            assert_eq!(decrypt(&tampered, SECRET), None, "sealed byte {i}");
            sealed[i] ^= 0x01;
        }
    }

    #[test]
    fn test_blank_input_returns_none() {
        assert_eq!(decrypt("", SECRET), None);
        assert_eq!(decrypt("   ", SECRET), None);
    }

    #[test]
    fn test_invalid_base64_returns_none() {
        assert_eq!(decrypt("not base64!$also not base64!", SECRET), None);
    }

    #[test]
    fn test_wrong_part_count_returns_none() {
        let token = encrypt(&sample_payload(), SECRET).unwrap();
        assert_eq!(decrypt(&format!("{token}$extra"), SECRET), None);
    }

    #[test]
    fn test_truncated_sealed_segment_returns_none() {
        let salt = URL_SAFE_NO_PAD.encode([0u8; SALT_SIZE]);
        let short = URL_SAFE_NO_PAD.encode([0u8; NONCE_SIZE]);
        assert_eq!(decrypt(&format!("{salt}${short}"), SECRET), None);
    }

    #[test]
    fn test_legacy_two_segment_format() {
        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode("legacy-access"),
            URL_SAFE_NO_PAD.encode("legacy-refresh")
        );
        let payload = decrypt(&token, SECRET).unwrap();
        assert_eq!(payload.access_token, "legacy-access");
        assert_eq!(payload.refresh_token.as_deref(), Some("legacy-refresh"));
        assert_eq!(payload.version, None);
        assert_eq!(payload.user_id, None);
    }

    #[test]
    fn test_malformed_legacy_returns_none() {
        // Not base64url
        assert_eq!(decrypt("access token.refresh token", SECRET), None);
        // Only one segment
        assert_eq!(
            decrypt(&URL_SAFE_NO_PAD.encode("access"), SECRET),
            None
        );
        // Three segments
        let token = format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode("a"),
            URL_SAFE_NO_PAD.encode("b"),
            URL_SAFE_NO_PAD.encode("c")
        );
        assert_eq!(decrypt(&token, SECRET), None);
        // Empty segment
        let token = format!(".{}", URL_SAFE_NO_PAD.encode("refresh"));
        assert_eq!(decrypt(&token, SECRET), None);
    }
}
