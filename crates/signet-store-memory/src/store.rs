//! TTL-capable in-memory key-value store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use signet_store::{SharedStore, StoreResult};

/// A single stored entry with its optional expiry.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<OffsetDateTime>,
}

impl Entry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory [`SharedStore`] implementation.
///
/// Expired entries are treated as absent on every read path and pruned
/// opportunistically. All mutations happen under a single write lock, which
/// gives [`set_if_absent`](SharedStore::set_if_absent) the atomicity the
/// trait contract requires within one process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes expired entries.
    ///
    /// # Returns
    ///
    /// Returns the number of entries deleted.
    pub async fn cleanup_expired(&self) -> u64 {
        let now = OffsetDateTime::now_utc();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        (before - entries.len()) as u64
    }

    /// Returns the number of live entries.
    pub async fn len(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Returns `true` if the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn expiry_for(ttl: Option<Duration>) -> Option<OffsetDateTime> {
        ttl.map(|ttl| OffsetDateTime::now_utc() + ttl)
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = OffsetDateTime::now_utc();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expiry_for(ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let now = OffsetDateTime::now_utc();
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_expired(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expiry_for(ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}
