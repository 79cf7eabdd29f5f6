//! Shared cookie store contract
//!
//! The host's ordinary, non-isolated cookie store. SILO never writes to
//! it, but in observe-only interception mode cookies can slip in; the
//! leaked-cookie sweep enumerates and deletes them through this surface.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use silo_cookies::Cookie;

use crate::Result;

pub trait SharedCookieStore: Send + Sync {
    fn cookies_for_domain(&self, domain: &str) -> Vec<Cookie>;

    fn remove(&self, domain: &str, name: &str, path: &str) -> Result<()>;
}

/// In-memory shared store, for hosts without a native bridge and for
/// tests.
pub struct MemorySharedStore {
    cookies: Arc<RwLock<HashMap<String, Vec<Cookie>>>>,
}

impl MemorySharedStore {
    pub fn new() -> Self {
        Self {
            cookies: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn insert(&self, cookie: Cookie) {
        self.cookies
            .write()
            .entry(cookie.domain.clone())
            .or_default()
            .push(cookie);
    }

    pub fn len(&self) -> usize {
        self.cookies.read().values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SharedCookieStore for MemorySharedStore {
    fn cookies_for_domain(&self, domain: &str) -> Vec<Cookie> {
        self.cookies
            .read()
            .get(&domain.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn remove(&self, domain: &str, name: &str, path: &str) -> Result<()> {
        let mut cookies = self.cookies.write();
        if let Some(list) = cookies.get_mut(&domain.to_lowercase()) {
            list.retain(|c| !(c.name == name && c.path == path));
            if list.is_empty() {
                cookies.remove(&domain.to_lowercase());
            }
        }
        Ok(())
    }
}

impl Default for MemorySharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemorySharedStore {
    fn clone(&self) -> Self {
        Self {
            cookies: Arc::clone(&self.cookies),
        }
    }
}
