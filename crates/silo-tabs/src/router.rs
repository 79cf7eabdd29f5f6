//! Tab-to-session routing
//!
//! A tab is Unassigned until something binds it to a session: an explicit
//! assignment, its opener's session, or recent domain activity. A tab
//! opened via a generic "new tab" affordance is never auto-assigned.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::activity::DomainActivity;
use crate::metadata::{TabMetadata, TabMetadataCache};
use crate::TabId;

pub const DEFAULT_ACTIVITY_WINDOW: Duration = Duration::from_secs(30);

/// Placeholder URLs used by "new tab" affordances across platforms.
const NEW_TAB_URLS: &[&str] = &[
    "about:blank",
    "about:newtab",
    "about:home",
    "chrome://newtab/",
    "chrome://new-tab-page/",
    "edge://newtab/",
];

/// What the router knew about a tab at removal time.
#[derive(Debug, Clone)]
pub struct RemovedTab {
    pub session_id: String,
    pub metadata: Option<TabMetadata>,
    /// True when this was the session's last tab.
    pub was_last_tab: bool,
}

pub struct TabSessionRouter {
    mappings: Arc<RwLock<HashMap<TabId, String>>>,
    activity: DomainActivity,
    metadata: TabMetadataCache,
    activity_window: Duration,
}

impl TabSessionRouter {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_ACTIVITY_WINDOW)
    }

    pub fn with_window(activity_window: Duration) -> Self {
        Self {
            mappings: Arc::new(RwLock::new(HashMap::new())),
            activity: DomainActivity::new(),
            metadata: TabMetadataCache::new(),
            activity_window,
        }
    }

    pub fn is_placeholder_url(url: &str) -> bool {
        let url = url.trim();
        url.is_empty() || NEW_TAB_URLS.iter().any(|p| url.eq_ignore_ascii_case(p))
    }

    /// Explicitly bind a tab to a session.
    pub fn assign(&self, tab_id: TabId, session_id: &str) {
        self.mappings
            .write()
            .insert(tab_id, session_id.to_string());

        tracing::debug!(tab_id, session_id = %session_id, "Assigned tab to session");
    }

    pub fn session_for(&self, tab_id: TabId) -> Option<String> {
        self.mappings.read().get(&tab_id).cloned()
    }

    /// Route a newly created tab. Opener inheritance wins; otherwise a
    /// real URL consults the domain-activity window; a placeholder URL is
    /// never auto-assigned.
    pub fn on_tab_created(
        &self,
        tab_id: TabId,
        opener: Option<TabId>,
        url: Option<&str>,
    ) -> Option<String> {
        if let Some(opener_id) = opener {
            if let Some(session_id) = self.session_for(opener_id) {
                self.assign(tab_id, &session_id);
                tracing::info!(
                    tab_id,
                    opener = opener_id,
                    session_id = %session_id,
                    "Tab inherited session from opener"
                );
                return Some(session_id);
            }
        }

        let url = url?;
        if Self::is_placeholder_url(url) {
            return None;
        }

        let host = Url::parse(url).ok()?.host_str()?.to_lowercase();
        let session_id = self.activity.most_recent_within(&host, self.activity_window)?;
        self.assign(tab_id, &session_id);

        tracing::info!(
            tab_id,
            domain = %host,
            session_id = %session_id,
            "Tab inherited session from domain activity"
        );

        Some(session_id)
    }

    /// Navigation event: refresh the metadata cache and, when the tab is
    /// assigned, record domain activity for its session.
    pub fn on_tab_updated(&self, tab_id: TabId, url: &str, title: &str) {
        self.metadata.record(tab_id, url, title);

        if let Some(session_id) = self.session_for(tab_id) {
            if let Ok(parsed) = Url::parse(url) {
                if let Some(host) = parsed.host_str() {
                    self.activity.record(host, &session_id);
                }
            }
        }
    }

    /// Activation keeps the metadata fresh and counts as domain activity.
    pub fn on_tab_activated(&self, tab_id: TabId) {
        if let (Some(session_id), Some(meta)) = (self.session_for(tab_id), self.metadata.get(tab_id))
        {
            if !meta.domain.is_empty() {
                self.activity.record(&meta.domain, &session_id);
            }
        }
    }

    /// Unbind a removed tab, reporting its session and captured metadata
    /// so the lifecycle can persist the closing page.
    pub fn on_tab_removed(&self, tab_id: TabId) -> Option<RemovedTab> {
        let session_id = self.mappings.write().remove(&tab_id)?;
        let metadata = self.metadata.remove(tab_id);
        let was_last_tab = !self
            .mappings
            .read()
            .values()
            .any(|s| s == &session_id);

        tracing::info!(
            tab_id,
            session_id = %session_id,
            was_last_tab,
            "Tab removed from session"
        );

        Some(RemovedTab {
            session_id,
            metadata,
            was_last_tab,
        })
    }

    pub fn tabs_in(&self, session_id: &str) -> Vec<TabId> {
        self.mappings
            .read()
            .iter()
            .filter(|(_, s)| s.as_str() == session_id)
            .map(|(tab_id, _)| *tab_id)
            .collect()
    }

    /// Current (tab, session, metadata) snapshot for persistence.
    pub fn snapshot(&self) -> Vec<(TabId, String, Option<TabMetadata>)> {
        self.mappings
            .read()
            .iter()
            .map(|(tab_id, session_id)| (*tab_id, session_id.clone(), self.metadata.get(*tab_id)))
            .collect()
    }

    /// (domain, owning session) pairs for every tracked tab with a real
    /// URL. The leak sweep enumerates the shared store against these.
    pub fn touched_domains(&self) -> Vec<(String, String)> {
        let mappings = self.mappings.read();
        mappings
            .iter()
            .filter_map(|(tab_id, session_id)| {
                let meta = self.metadata.get(*tab_id)?;
                if meta.domain.is_empty() {
                    return None;
                }
                Some((meta.domain, session_id.clone()))
            })
            .collect()
    }

    pub fn metadata(&self) -> &TabMetadataCache {
        &self.metadata
    }

    pub fn activity(&self) -> &DomainActivity {
        &self.activity
    }

    /// Drop every mapping; tab ids are not durable identity, so this runs
    /// on every process start before reconciliation.
    pub fn clear(&self) {
        self.mappings.write().clear();
        self.metadata.clear();
    }

    pub fn forget_session(&self, session_id: &str) {
        self.mappings.write().retain(|_, s| s != session_id);
        self.activity.forget_session(session_id);
    }
}

impl Default for TabSessionRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TabSessionRouter {
    fn clone(&self) -> Self {
        Self {
            mappings: Arc::clone(&self.mappings),
            activity: self.activity.clone(),
            metadata: self.metadata.clone(),
            activity_window: self.activity_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opener_inheritance() {
        let router = TabSessionRouter::new();
        router.assign(1, "s1");

        let inherited = router.on_tab_created(2, Some(1), Some("https://example.com/"));
        assert_eq!(inherited.as_deref(), Some("s1"));
        assert_eq!(router.session_for(2).as_deref(), Some("s1"));
    }

    #[test]
    fn test_unknown_opener_falls_through() {
        let router = TabSessionRouter::new();
        let inherited = router.on_tab_created(2, Some(99), Some("https://example.com/"));
        assert!(inherited.is_none());
    }

    #[test]
    fn test_domain_activity_inheritance() {
        let router = TabSessionRouter::new();
        router.assign(1, "s1");
        router.on_tab_updated(1, "https://app.example.com/home", "Home");

        let inherited = router.on_tab_created(2, None, Some("https://app.example.com/login"));
        assert_eq!(inherited.as_deref(), Some("s1"));
    }

    #[test]
    fn test_stale_activity_does_not_inherit() {
        let router = TabSessionRouter::with_window(Duration::from_millis(10));
        router.assign(1, "s1");
        router.on_tab_updated(1, "https://example.com/", "Example");

        std::thread::sleep(Duration::from_millis(30));
        let inherited = router.on_tab_created(2, None, Some("https://example.com/"));
        assert!(inherited.is_none());
    }

    #[test]
    fn test_new_tab_placeholder_never_auto_assigned() {
        let router = TabSessionRouter::new();
        router.assign(1, "s1");
        router.on_tab_updated(1, "https://example.com/", "Example");

        assert!(router.on_tab_created(2, None, Some("about:blank")).is_none());
        assert!(router
            .on_tab_created(3, None, Some("chrome://newtab/"))
            .is_none());
        assert!(router.on_tab_created(4, None, None).is_none());
    }

    #[test]
    fn test_removal_reports_last_tab() {
        let router = TabSessionRouter::new();
        router.assign(1, "s1");
        router.assign(2, "s1");
        router.on_tab_updated(1, "https://example.com/a", "A");

        let removed = router.on_tab_removed(1).unwrap();
        assert_eq!(removed.session_id, "s1");
        assert!(!removed.was_last_tab);
        assert_eq!(removed.metadata.unwrap().url, "https://example.com/a");

        let removed = router.on_tab_removed(2).unwrap();
        assert!(removed.was_last_tab);
        assert!(router.on_tab_removed(2).is_none());
    }

    #[test]
    fn test_touched_domains() {
        let router = TabSessionRouter::new();
        router.assign(1, "s1");
        router.on_tab_updated(1, "https://example.com/", "Example");

        let touched = router.touched_domains();
        assert_eq!(touched, vec![("example.com".to_string(), "s1".to_string())]);
    }
}
