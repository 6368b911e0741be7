//! # signet-store
//!
//! Storage abstraction layer for the Signet identity core.
//!
//! This crate defines the traits that all storage backends must implement.
//! It does not contain any implementations - those are provided by separate
//! crates (e.g. `signet-store-memory`).
//!
//! ## Overview
//!
//! Two traits make up the storage surface:
//!
//! - [`SharedStore`] - a TTL-capable key-value store shared across all
//!   concurrently running request handlers and processes. This is the only
//!   cross-request state in the identity core; it backs logout-token replay
//!   markers and forced-logout notices.
//! - [`UserRecordStore`] - the persisted user record, keyed by user
//!   identifier, holding named local and cached attribute values.
//!
//! ## Consistency contract
//!
//! [`SharedStore`] implementations must provide atomic, immediately
//! consistent check-and-set behavior: [`SharedStore::set_if_absent`] is the
//! primitive that makes single-use token identifiers correct under
//! concurrency. [`UserRecordStore`] implementations must provide
//! read-your-writes consistency within one request.
//!
//! ## Example
//!
//! ```ignore
//! use signet_store::{SharedStore, StoreResult};
//! use std::time::Duration;
//!
//! async fn record_replay_marker(
//!     store: &dyn SharedStore,
//!     jti: &str,
//! ) -> StoreResult<bool> {
//!     store
//!         .set_if_absent(jti, "used", Some(Duration::from_secs(120)))
//!         .await
//! }
//! ```

mod error;
mod traits;

pub use error::StoreError;
pub use traits::{SharedStore, UserRecordStore};

/// Type alias for a storage result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shareable [`SharedStore`] trait object.
pub type DynSharedStore = std::sync::Arc<dyn SharedStore>;

/// Type alias for a shareable [`UserRecordStore`] trait object.
pub type DynUserRecordStore = std::sync::Arc<dyn UserRecordStore>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use signet_store::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        DynSharedStore, DynUserRecordStore, SharedStore, StoreError, StoreResult, UserRecordStore,
    };
}
