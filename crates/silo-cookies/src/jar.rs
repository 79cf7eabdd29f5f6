//! Per-session cookie storage
//!
//! Cookies are keyed session → domain → path → name. Lookup walks the
//! request host's ancestor domains (stopping before a bare public
//! suffix), filters by path prefix, and purges expired cookies on touch.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cookie::{normalize_domain, Cookie};
use crate::error::CookieError;
use crate::guard::DomainGuard;
use crate::Result;

/// path → name → cookie
type PathMap = HashMap<String, HashMap<String, Cookie>>;
/// domain → paths
type DomainMap = HashMap<String, PathMap>;

pub struct CookieJar {
    jars: Arc<RwLock<HashMap<String, DomainMap>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self {
            jars: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Upsert a cookie into a session's jar, keyed by domain/path/name.
    /// Already-expired cookies are rejected outright.
    pub fn store(&self, session_id: &str, mut cookie: Cookie) -> Result<()> {
        if cookie.name.is_empty() {
            return Err(CookieError::EmptyName);
        }
        if cookie.is_expired() {
            return Err(CookieError::Expired(cookie.name));
        }

        cookie.domain = normalize_domain(&cookie.domain);
        if cookie.path.is_empty() {
            cookie.path = "/".to_string();
        }

        let mut jars = self.jars.write();
        let entry = jars
            .entry(session_id.to_string())
            .or_default()
            .entry(cookie.domain.clone())
            .or_default()
            .entry(cookie.path.clone())
            .or_default()
            .insert(cookie.name.clone(), cookie.clone());

        tracing::debug!(
            session_id = %session_id,
            domain = %cookie.domain,
            name = %cookie.name,
            replaced = entry.is_some(),
            "Stored session cookie"
        );

        Ok(())
    }

    /// All non-expired cookies visible to `session_id` for a request to
    /// `host` + `path`. Expired entries encountered along the way are
    /// removed before the result is built.
    pub fn lookup(&self, session_id: &str, host: &str, path: &str) -> Vec<Cookie> {
        let now = Utc::now().timestamp() as f64;
        let candidates = DomainGuard::ancestor_domains(host);

        let mut jars = self.jars.write();
        let Some(domains) = jars.get_mut(session_id) else {
            return Vec::new();
        };

        let mut matched = Vec::new();
        for domain in &candidates {
            let Some(paths) = domains.get_mut(domain) else {
                continue;
            };

            for (cookie_path, names) in paths.iter_mut() {
                if !path.starts_with(cookie_path.as_str()) {
                    continue;
                }
                names.retain(|_, c| !c.is_expired_at(now));
                matched.extend(names.values().cloned());
            }
        }

        matched
    }

    /// Render the Cookie header value for a request, or `None` when the
    /// session has nothing matching.
    pub fn cookie_header(&self, session_id: &str, host: &str, path: &str) -> Option<String> {
        let cookies = self.lookup(session_id, host, path);
        if cookies.is_empty() {
            return None;
        }

        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Every cookie a session holds, expired entries excluded.
    pub fn session_cookies(&self, session_id: &str) -> Vec<Cookie> {
        let now = Utc::now().timestamp() as f64;
        self.jars
            .read()
            .get(session_id)
            .map(|domains| {
                domains
                    .values()
                    .flat_map(|paths| paths.values())
                    .flat_map(|names| names.values())
                    .filter(|c| !c.is_expired_at(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bulk insert for restoration; expired cookies are silently skipped.
    pub fn restore_session(&self, session_id: &str, cookies: Vec<Cookie>) {
        for cookie in cookies {
            if let Err(e) = self.store(session_id, cookie) {
                tracing::debug!(session_id = %session_id, error = %e, "Skipped cookie on restore");
            }
        }
    }

    /// Domains a session holds cookies for.
    pub fn domains(&self, session_id: &str) -> Vec<String> {
        self.jars
            .read()
            .get(session_id)
            .map(|domains| domains.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Session ids that hold a cookie matching this domain+name. Used by
    /// the leaked-cookie sweep to decide ownership.
    pub fn owning_sessions(&self, domain: &str, name: &str) -> Vec<String> {
        let domain = normalize_domain(domain);
        self.jars
            .read()
            .iter()
            .filter(|(_, domains)| {
                domains
                    .get(&domain)
                    .map(|paths| paths.values().any(|names| names.contains_key(name)))
                    .unwrap_or(false)
            })
            .map(|(session_id, _)| session_id.clone())
            .collect()
    }

    /// Drop a session's jar entirely.
    pub fn remove_session(&self, session_id: &str) {
        if self.jars.write().remove(session_id).is_some() {
            tracing::info!(session_id = %session_id, "Removed session cookie jar");
        }
    }

    /// Remove every expired cookie across all sessions. Running it twice
    /// in a row removes nothing on the second pass.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now().timestamp() as f64;
        let mut removed = 0;

        let mut jars = self.jars.write();
        for domains in jars.values_mut() {
            for paths in domains.values_mut() {
                for names in paths.values_mut() {
                    let before = names.len();
                    names.retain(|_, c| !c.is_expired_at(now));
                    removed += before - names.len();
                }
                paths.retain(|_, names| !names.is_empty());
            }
            domains.retain(|_, paths| !paths.is_empty());
        }

        if removed > 0 {
            tracing::info!(removed, "Purged expired cookies");
        }

        removed
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.jars.read().keys().cloned().collect()
    }
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CookieJar {
    fn clone(&self) -> Self {
        Self {
            jars: Arc::clone(&self.jars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, value: &str, domain: &str) -> Cookie {
        Cookie::new(name, value, domain)
    }

    #[test]
    fn test_sessions_are_isolated() {
        let jar = CookieJar::new();
        jar.store("s1", cookie("sid", "abc", "example.com")).unwrap();

        let s1 = jar.lookup("s1", "example.com", "/");
        assert_eq!(s1.len(), 1);
        assert_eq!(s1[0].value, "abc");

        assert!(jar.lookup("s2", "example.com", "/").is_empty());
    }

    #[test]
    fn test_subdomain_sees_parent_cookie() {
        let jar = CookieJar::new();
        jar.store("s1", cookie("sid", "abc", "example.com")).unwrap();

        let found = jar.lookup("s1", "sub.example.com", "/app");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "sid");

        // The parent never sees a subdomain's cookie
        jar.store("s1", cookie("deep", "x", "sub.example.com"))
            .unwrap();
        let parent = jar.lookup("s1", "example.com", "/");
        assert_eq!(parent.len(), 1);
        assert_eq!(parent[0].name, "sid");
    }

    #[test]
    fn test_path_prefix_match() {
        let jar = CookieJar::new();
        let mut scoped = cookie("scoped", "1", "example.com");
        scoped.path = "/app".to_string();
        jar.store("s1", scoped).unwrap();

        assert_eq!(jar.lookup("s1", "example.com", "/app/page").len(), 1);
        assert!(jar.lookup("s1", "example.com", "/other").is_empty());
    }

    #[test]
    fn test_expired_cookie_rejected_on_store() {
        let jar = CookieJar::new();
        let mut dead = cookie("dead", "x", "example.com");
        dead.expiration_date = Some(Utc::now().timestamp() as f64 - 10.0);

        assert!(matches!(
            jar.store("s1", dead),
            Err(CookieError::Expired(_))
        ));
        assert!(jar.lookup("s1", "example.com", "/").is_empty());
    }

    #[test]
    fn test_expiring_cookie_purged_on_touch() {
        let jar = CookieJar::new();
        let mut soon = cookie("soon", "x", "example.com");
        // Valid at store time, expired by lookup time
        soon.expiration_date = Some(Utc::now().timestamp() as f64 + 0.5);
        jar.store("s1", soon).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(jar.lookup("s1", "example.com", "/").is_empty());
        assert!(jar.session_cookies("s1").is_empty());
    }

    #[test]
    fn test_purge_is_idempotent() {
        let jar = CookieJar::new();
        let mut soon = cookie("soon", "x", "example.com");
        soon.expiration_date = Some(Utc::now().timestamp() as f64 + 0.5);
        jar.store("s1", soon).unwrap();
        jar.store("s1", cookie("keep", "y", "example.com")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(jar.purge_expired(), 1);
        assert_eq!(jar.purge_expired(), 0);
        assert_eq!(jar.session_cookies("s1").len(), 1);
    }

    #[test]
    fn test_upsert_replaces_by_domain_path_name() {
        let jar = CookieJar::new();
        jar.store("s1", cookie("sid", "old", "example.com")).unwrap();
        jar.store("s1", cookie("sid", "new", "example.com")).unwrap();

        let found = jar.lookup("s1", "example.com", "/");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "new");
    }

    #[test]
    fn test_owning_sessions() {
        let jar = CookieJar::new();
        jar.store("s1", cookie("sid", "a", "example.com")).unwrap();
        jar.store("s2", cookie("sid", "b", "example.com")).unwrap();

        let mut owners = jar.owning_sessions("example.com", "sid");
        owners.sort();
        assert_eq!(owners, vec!["s1", "s2"]);
        assert!(jar.owning_sessions("example.com", "other").is_empty());
    }

    #[test]
    fn test_cookie_header_rendering() {
        let jar = CookieJar::new();
        jar.store("s1", cookie("a", "1", "example.com")).unwrap();

        let header = jar.cookie_header("s1", "example.com", "/").unwrap();
        assert_eq!(header, "a=1");
        assert!(jar.cookie_header("s2", "example.com", "/").is_none());
    }
}
