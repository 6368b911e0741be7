//! Forced-logout notices.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use signet_store::{DynSharedStore, StoreError, StoreResult};

/// Shared-store key prefix for forced-logout flags.
const KEY_PREFIX: &str = "logout:notice:";

/// Records, reads, and clears the forced-logout flag per identity.
///
/// A notice is written when a valid logout token is verified and has no
/// TTL - it persists until the identity successfully re-authenticates,
/// at which point [`remove`](Self::remove) clears it. Every request that
/// reconstructs a session for an identity must call
/// [`find`](Self::find) and treat the session as invalid when a notice
/// is present.
#[derive(Clone)]
pub struct LogoutNotice {
    store: DynSharedStore,
}

impl LogoutNotice {
    /// Creates a notice handle over the shared store.
    #[must_use]
    pub fn new(store: DynSharedStore) -> Self {
        Self { store }
    }

    /// Records a forced logout for `identity_key` at the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn persist(&self, identity_key: &str) -> StoreResult<()> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| StoreError::serialization(e.to_string()))?;
        self.store.set(&Self::key(identity_key), &timestamp, None).await?;
        tracing::info!("Recorded forced logout notice");
        Ok(())
    }

    /// Reads the forced-logout timestamp for `identity_key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails or a stored value does
    /// not parse as a timestamp.
    pub async fn find(&self, identity_key: &str) -> StoreResult<Option<OffsetDateTime>> {
        let Some(raw) = self.store.get(&Self::key(identity_key)).await? else {
            return Ok(None);
        };
        OffsetDateTime::parse(&raw, &Rfc3339)
            .map(Some)
            .map_err(|e| StoreError::serialization(e.to_string()))
    }

    /// Clears the flag; called when `identity_key` completes a fresh
    /// authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the store delete fails.
    pub async fn remove(&self, identity_key: &str) -> StoreResult<()> {
        self.store.delete(&Self::key(identity_key)).await
    }

    fn key(identity_key: &str) -> String {
        format!("{KEY_PREFIX}{identity_key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signet_store_memory::MemoryStore;
    use std::sync::Arc;

    fn notice() -> LogoutNotice {
        LogoutNotice::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_absent_by_default() {
        assert_eq!(notice().find("user-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persist_then_find() {
        let notice = notice();
        let before = OffsetDateTime::now_utc();
        notice.persist("user-1").await.unwrap();

        let found = notice.find("user-1").await.unwrap().unwrap();
        assert!(found >= before - time::Duration::seconds(1));
        // Notices are per identity.
        assert_eq!(notice.find("user-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_clears_flag() {
        let notice = notice();
        notice.persist("user-1").await.unwrap();
        notice.remove("user-1").await.unwrap();
        assert_eq!(notice.find("user-1").await.unwrap(), None);
    }
}
