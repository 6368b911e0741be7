//! In-memory storage backends for the Signet identity core.
//!
//! This crate provides in-memory implementations of the `SharedStore` and
//! `UserRecordStore` traits from `signet-store`. They are suitable for
//! single-process deployments and are the storage fakes used throughout the
//! identity core's test suites.
//!
//! # Example
//!
//! ```ignore
//! use signet_store::SharedStore;
//! use signet_store_memory::MemoryStore;
//! use std::time::Duration;
//!
//! let store = MemoryStore::new();
//! store.set("logout-notice:user-1", "2024-01-01T00:00:00Z", None).await?;
//! let first = store.set_if_absent("jti:abc", "used", Some(Duration::from_secs(120))).await?;
//! assert!(first);
//! ```

mod store;
mod user_records;

// Re-export the storage traits for convenience
pub use signet_store::{SharedStore, StoreError, UserRecordStore};

pub use store::MemoryStore;
pub use user_records::MemoryUserRecords;

/// Creates a new in-memory [`SharedStore`] instance.
pub fn create_shared_store() -> signet_store::DynSharedStore {
    std::sync::Arc::new(MemoryStore::new())
}

/// Creates a new in-memory [`UserRecordStore`] instance.
pub fn create_user_record_store() -> signet_store::DynUserRecordStore {
    std::sync::Arc::new(MemoryUserRecords::new())
}
