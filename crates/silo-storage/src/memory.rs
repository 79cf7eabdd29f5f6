//! In-memory tier
//!
//! Backs both the process-lifetime tier and, in hosts without a platform
//! session store, the fast-volatile tier (which survives until the whole
//! browser closes). `wipe` simulates that teardown in tests.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::tier::StorageTier;
use crate::Result;

pub struct MemoryStore {
    name: &'static str,
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop everything, as if the hosting process went away.
    pub fn wipe(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StorageTier for MemoryStore {
    fn name(&self) -> &'static str {
        self.name
    }

    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.read();
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, new_entries: HashMap<String, Value>) -> Result<()> {
        let mut entries = self.entries.write();
        for (key, value) in new_entries {
            entries.insert(key, value);
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: Arc::clone(&self.entries),
        }
    }
}
