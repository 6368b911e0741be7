//! In-memory persisted user records.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use signet_store::{StoreResult, UserRecordStore};

/// In-memory [`UserRecordStore`] implementation.
///
/// Values are stored per user under their attribute name. Writing
/// `Value::Null` removes the stored value, matching the trait contract that
/// reads never surface null entries.
#[derive(Debug, Default)]
pub struct MemoryUserRecords {
    records: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryUserRecords {
    /// Creates a new, empty record store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRecordStore for MemoryUserRecords {
    async fn get_attributes(
        &self,
        user_id: &str,
        names: &[String],
    ) -> StoreResult<HashMap<String, Value>> {
        let records = self.records.read().await;
        let Some(record) = records.get(user_id) else {
            return Ok(HashMap::new());
        };
        Ok(names
            .iter()
            .filter_map(|name| record.get(name).map(|v| (name.clone(), v.clone())))
            .collect())
    }

    async fn set_attributes(
        &self,
        user_id: &str,
        values: &HashMap<String, Value>,
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records.entry(user_id.to_string()).or_default();
        for (name, value) in values {
            if value.is_null() {
                record.remove(name);
            } else {
                record.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }
}
