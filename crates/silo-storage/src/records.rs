//! Durable record store
//!
//! Authoritative for bulk session+cookie data. One row per session id,
//! with per-id deletion so a session removal never requires rewriting the
//! whole state blob.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;

use crate::database::Database;
use crate::tier::{RecordStore, StorageTier};
use crate::Result;

pub struct SqliteRecordStore {
    db: Database,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl StorageTier for SqliteRecordStore {
    fn name(&self) -> &'static str {
        "durable-records"
    }

    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let mut out = HashMap::new();
        for key in keys {
            if let Some(payload) = self.get_record(key)? {
                out.insert(key.to_string(), payload);
            }
        }
        Ok(out)
    }

    fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        for (key, value) in entries {
            self.put_record(&key, value)?;
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.delete_by_id(key)?;
        }
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn put_record(&self, id: &str, payload: Value) -> Result<()> {
        let raw = serde_json::to_string(&payload)?;
        let updated_at = Utc::now().to_rfc3339();

        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO session_records (id, payload, updated_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![id, raw, updated_at],
            )?;
            Ok(())
        })
    }

    fn get_record(&self, id: &str) -> Result<Option<Value>> {
        self.db.with_connection(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT payload FROM session_records WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            match raw {
                Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
                None => Ok(None),
            }
        })
    }

    fn all_ids(&self) -> Result<Vec<String>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM session_records")?;
            let ids: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(ids)
        })
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM session_records WHERE id = ?1", [id])?;
            Ok(())
        })?;

        tracing::debug!(record_id = %id, "Deleted session record");

        Ok(())
    }
}

impl Clone for SqliteRecordStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
