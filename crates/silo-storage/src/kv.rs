//! Durable key-value tier
//!
//! Survives restarts but is size-limited: values above the per-entry quota
//! are refused with `StorageError::QuotaExceeded` and the caller degrades
//! to the record store.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;

use crate::database::Database;
use crate::tier::StorageTier;
use crate::{Result, StorageError};

/// Per-entry quota, in the spirit of platform sync-storage item limits.
pub const KV_VALUE_QUOTA_BYTES: usize = 8192;

pub struct SqliteKvStore {
    db: Database,
    quota: usize,
}

impl SqliteKvStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            quota: KV_VALUE_QUOTA_BYTES,
        }
    }

    pub fn with_quota(db: Database, quota: usize) -> Self {
        Self { db, quota }
    }

    /// Keys under a namespace prefix, for scoped enumeration and clears.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.db.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT key FROM kv_entries WHERE key LIKE ?1 || '%'")?;
            let keys: Vec<String> = stmt
                .query_map([prefix], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(keys)
        })
    }
}

impl StorageTier for SqliteKvStore {
    fn name(&self) -> &'static str {
        "durable-kv"
    }

    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv_entries WHERE key = ?1")?;

            let mut out = HashMap::new();
            for key in keys {
                let raw: Option<String> = stmt
                    .query_row([key], |row| row.get(0))
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;

                if let Some(raw) = raw {
                    out.insert(key.to_string(), serde_json::from_str(&raw)?);
                }
            }
            Ok(out)
        })
    }

    fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        // Reject oversized values before touching the database so a failed
        // write leaves no partial state behind.
        let mut serialized = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            let raw = serde_json::to_string(value)?;
            if raw.len() > self.quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.clone(),
                    size: raw.len(),
                    limit: self.quota,
                });
            }
            serialized.push((key.clone(), raw));
        }

        let updated_at = Utc::now().to_rfc3339();
        self.db.transaction(|conn| {
            for (key, raw) in &serialized {
                conn.execute(
                    "INSERT OR REPLACE INTO kv_entries (key, value, updated_at)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![key, raw, updated_at],
                )?;
            }
            Ok(())
        })
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        self.db.with_connection(|conn| {
            for key in keys {
                conn.execute("DELETE FROM kv_entries WHERE key = ?1", [key])?;
            }
            Ok(())
        })
    }
}

impl Clone for SqliteKvStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            quota: self.quota,
        }
    }
}
