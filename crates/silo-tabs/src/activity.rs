//! Domain activity window
//!
//! A sliding recency map `domain → session → last seen`, consulted only
//! for opener-less inheritance: a brand-new tab with a real URL adopts
//! the session that touched the same hostname most recently within the
//! window.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct DomainActivity {
    entries: Arc<RwLock<HashMap<String, HashMap<String, Instant>>>>,
}

impl DomainActivity {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn record(&self, domain: &str, session_id: &str) {
        if domain.is_empty() {
            return;
        }
        self.entries
            .write()
            .entry(domain.to_lowercase())
            .or_default()
            .insert(session_id.to_string(), Instant::now());
    }

    /// The session with the most recent activity on `domain` within the
    /// trailing `window`; ties broken by recency.
    pub fn most_recent_within(&self, domain: &str, window: Duration) -> Option<String> {
        let now = Instant::now();
        self.entries
            .read()
            .get(&domain.to_lowercase())?
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) <= window)
            .max_by_key(|(_, seen)| **seen)
            .map(|(session_id, _)| session_id.clone())
    }

    /// Drop entries older than `window`.
    pub fn prune(&self, window: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        for sessions in entries.values_mut() {
            sessions.retain(|_, seen| now.duration_since(*seen) <= window);
        }
        entries.retain(|_, sessions| !sessions.is_empty());
    }

    /// Forget a session entirely (it was deleted).
    pub fn forget_session(&self, session_id: &str) {
        let mut entries = self.entries.write();
        for sessions in entries.values_mut() {
            sessions.remove(session_id);
        }
        entries.retain(|_, sessions| !sessions.is_empty());
    }
}

impl Default for DomainActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DomainActivity {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}
