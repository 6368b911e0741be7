//! Storage traits for the Signet identity core.
//!
//! # Implementation Notes
//!
//! Implementations of [`SharedStore`] should:
//!
//! - Treat expired entries as absent from every read path
//! - Serialize conflicting writes; the identity core performs no locking
//! - Support efficient lookup by key
//!
//! # Security Considerations
//!
//! The shared store holds replay markers and forced-logout flags. A lost
//! write turns a replayed logout token into an accepted one, so
//! [`SharedStore::set_if_absent`] must be atomic across all server
//! instances sharing the store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::StoreResult;

/// Shared key-value store with per-entry TTL.
///
/// This is the only state the identity core shares across requests and
/// processes. It backs logout-token replay markers and forced-logout
/// notices.
///
/// # Implementations
///
/// - `signet-store-memory` provides [`MemoryStore`] for single-process
///   deployments and tests.
///
/// [`MemoryStore`]: https://docs.rs/signet-store-memory
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Returns
    ///
    /// Returns `Some(value)` if present and not expired, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes `value` under `key`.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to write under
    /// * `value` - The value to store
    /// * `ttl` - Entry lifetime; `None` persists until explicitly deleted
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Atomically writes `value` under `key` if no live entry exists.
    ///
    /// This operation must be atomic to prevent race conditions where the
    /// same single-use token identifier is submitted concurrently to
    /// multiple server instances.
    ///
    /// # Returns
    ///
    /// Returns `true` if the value was written (the key was absent), or
    /// `false` if a live entry already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    /// Deletes the entry under `key`.
    ///
    /// Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Persisted user record storage.
///
/// Keyed by user identifier; holds named attribute values for attributes
/// whose storage location is local or cached. The storage engine itself is
/// out of scope for the identity core - the only contract required here is
/// read-your-writes consistency within one request.
#[async_trait]
pub trait UserRecordStore: Send + Sync {
    /// Reads the requested named attribute values for `user_id`.
    ///
    /// # Returns
    ///
    /// Returns a map containing an entry for each requested name that has
    /// a stored value. Names with no stored value are simply absent from
    /// the result, never mapped to `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_attributes(
        &self,
        user_id: &str,
        names: &[String],
    ) -> StoreResult<HashMap<String, Value>>;

    /// Writes the given named attribute values for `user_id`.
    ///
    /// A `Value::Null` entry removes the stored value for that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set_attributes(
        &self,
        user_id: &str,
        values: &HashMap<String, Value>,
    ) -> StoreResult<()>;
}
