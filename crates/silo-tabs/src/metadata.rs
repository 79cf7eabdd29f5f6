//! Write-through tab metadata cache
//!
//! Populated on every navigation/activation event because by cleanup time
//! the platform's own tab record may already be gone. The lifecycle reads
//! from here when a session's last tab closes.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::TabId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabMetadata {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub path: String,
}

impl TabMetadata {
    pub fn from_url(url: &str, title: &str) -> Self {
        let (domain, path) = match Url::parse(url) {
            Ok(parsed) => (
                parsed.host_str().unwrap_or_default().to_lowercase(),
                parsed.path().to_string(),
            ),
            Err(_) => (String::new(), String::new()),
        };

        Self {
            url: url.to_string(),
            title: title.to_string(),
            domain,
            path,
        }
    }
}

pub struct TabMetadataCache {
    entries: Arc<RwLock<HashMap<TabId, TabMetadata>>>,
}

impl TabMetadataCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn record(&self, tab_id: TabId, url: &str, title: &str) {
        self.entries
            .write()
            .insert(tab_id, TabMetadata::from_url(url, title));
    }

    /// Refresh the title only, keeping the last known URL.
    pub fn record_title(&self, tab_id: TabId, title: &str) {
        if let Some(meta) = self.entries.write().get_mut(&tab_id) {
            meta.title = title.to_string();
        }
    }

    pub fn get(&self, tab_id: TabId) -> Option<TabMetadata> {
        self.entries.read().get(&tab_id).cloned()
    }

    pub fn remove(&self, tab_id: TabId) -> Option<TabMetadata> {
        self.entries.write().remove(&tab_id)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for TabMetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TabMetadataCache {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}
