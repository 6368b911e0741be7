//! Session token codec.
//!
//! This module seals the session payload into an opaque, transportable
//! string and opens it again. The sealed form is authenticated encryption:
//! a fresh random salt is drawn per call, a symmetric key is derived from
//! the signing secret and the salt, and the serialized payload is encrypted
//! with AES-256-GCM. Any mismatch - tampering, truncation, a different
//! secret - opens as "no session" rather than an error.
//!
//! A legacy, unauthenticated two-segment format is still accepted on the
//! decode path only; see [`decrypt`] for its exact shape.

mod codec;
mod payload;

pub use codec::{CodecError, decrypt, encrypt};
pub use payload::{CURRENT_SESSION_VERSION, SessionPayload};
