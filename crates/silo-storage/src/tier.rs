//! Persistence tier contracts
//!
//! Every tier speaks the same key-value protocol; the record store
//! additionally supports per-id operations, which the orphan sweep and
//! per-session deletion depend on.

use serde_json::Value;
use std::collections::HashMap;

use crate::Result;

/// A single persistence tier.
///
/// Implementations must tolerate unknown keys on `get`/`remove` (they are
/// simply absent from the result / ignored).
pub trait StorageTier: Send + Sync {
    /// Short name used in degradation log messages.
    fn name(&self) -> &'static str;

    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    fn set(&self, entries: HashMap<String, Value>) -> Result<()>;

    fn remove(&self, keys: &[&str]) -> Result<()>;
}

/// The durable record store: larger capacity, authoritative for bulk
/// session+cookie data, supports per-id deletion.
pub trait RecordStore: StorageTier {
    fn put_record(&self, id: &str, payload: Value) -> Result<()>;

    fn get_record(&self, id: &str) -> Result<Option<Value>>;

    fn all_ids(&self) -> Result<Vec<String>>;

    fn delete_by_id(&self, id: &str) -> Result<()>;
}
