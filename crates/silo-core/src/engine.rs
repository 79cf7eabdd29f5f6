//! Engine facade
//!
//! Wires the registry, jar, router, interceptor, persistence coordinator,
//! and garbage collector together, and funnels tab and network events
//! from the host into them. Ordinary mutations mark the coordinator
//! dirty; lifecycle changes (create, close-to-dormant, reopen, delete)
//! flush immediately so a crash right after them loses nothing.

use serde_json::Value;
use std::sync::Arc;

use silo_cookies::CookieJar;
use silo_net::{
    CaptureSummary, InterceptMode, RequestInterceptor, SharedCookieStore,
};
use silo_session::{
    CreateOutcome, PolicyRefusal, Session, SessionRegistry, SessionState, StaticTierPolicy,
    TabCloseOutcome, Tier,
};
use silo_storage::{Database, MemoryStore, SqliteKvStore, SqliteRecordStore, StorageTier};
use silo_tabs::{TabHost, TabId, TabSessionRouter};

use crate::config::Config;
use crate::gc::GarbageCollector;
use crate::persist::PersistenceCoordinator;
use crate::Result;

const NEW_SESSION_URL: &str = "about:blank";
const DATA_PREFIX: &str = "data/";

/// What the user gets back from a create call.
#[derive(Debug)]
pub enum CreateSessionOutcome {
    Created {
        session_id: String,
        tab_id: TabId,
        color: String,
    },
    Refused(PolicyRefusal),
}

/// Gate snapshot for status queries.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStatus {
    pub active_count: usize,
    pub limit: silo_session::Limit,
    pub tier: Tier,
}

pub struct Engine {
    config: Config,
    registry: SessionRegistry,
    jar: CookieJar,
    router: TabSessionRouter,
    interceptor: RequestInterceptor,
    coordinator: PersistenceCoordinator,
    gc: GarbageCollector,
    host: Arc<dyn TabHost>,
    kv: SqliteKvStore,
}

impl Engine {
    pub fn new(
        config: Config,
        host: Arc<dyn TabHost>,
        shared: Arc<dyn SharedCookieStore>,
        mode: InterceptMode,
    ) -> Result<Self> {
        let db = Database::open(config.database_path())?;
        Ok(Self::with_database(config, db, host, shared, mode))
    }

    /// Build against an already-open database; tests use the in-memory
    /// variant through here.
    pub fn with_database(
        config: Config,
        db: Database,
        host: Arc<dyn TabHost>,
        shared: Arc<dyn SharedCookieStore>,
        mode: InterceptMode,
    ) -> Self {
        let registry = SessionRegistry::with_auto_restore(
            Arc::new(StaticTierPolicy::new(config.tier)),
            config.auto_restore_opt_in,
        );
        let jar = CookieJar::new();
        let router = TabSessionRouter::with_window(config.activity_window());
        let interceptor = RequestInterceptor::new(jar.clone(), router.clone(), mode);
        let kv = SqliteKvStore::new(db.clone());
        let records = SqliteRecordStore::new(db);

        let coordinator = PersistenceCoordinator::new(
            registry.clone(),
            jar.clone(),
            router.clone(),
            MemoryStore::new("fast-volatile"),
            kv.clone(),
            records.clone(),
            config.debounce_window(),
            config.commit_settle(),
        );

        let gc = GarbageCollector::new(
            registry.clone(),
            jar.clone(),
            router.clone(),
            records,
            shared,
        );

        Self {
            config,
            registry,
            jar,
            router,
            interceptor,
            coordinator,
            gc,
            host,
            kv,
        }
    }

    /// Restore persisted state, reconcile it against the live tab list,
    /// and spawn the background flush and GC loops.
    pub async fn start(&self) {
        // Host tab ids are not durable; drop any stale mappings first.
        self.router.clear();

        let snapshots = self.coordinator.restore();
        let live_tabs = PersistenceCoordinator::enumerate_tabs_with_retry(
            self.host.as_ref(),
            self.config.retry_attempts,
            self.config.retry_backoff(),
        )
        .await;
        self.coordinator.apply_restore(snapshots, &live_tabs);

        tokio::spawn(self.coordinator.clone().run());
        tokio::spawn(self.gc.clone().run(self.config.gc_interval()));

        tracing::info!(tier = %self.config.tier, "Engine started");
    }

    /// Create a session and its first tab. A tier refusal comes back as
    /// data; only host failures are errors.
    pub async fn create_session(
        &self,
        name: Option<String>,
        url: Option<&str>,
    ) -> Result<CreateSessionOutcome> {
        let session = match self.registry.create(name) {
            CreateOutcome::Created(session) => session,
            CreateOutcome::Refused(refusal) => {
                return Ok(CreateSessionOutcome::Refused(refusal))
            }
        };

        let url = url.unwrap_or(NEW_SESSION_URL);
        let tab_id = match self.host.create_tab(url) {
            Ok(tab_id) => tab_id,
            Err(e) => {
                // No tab, no session: undo the half-created entry
                self.registry.remove(&session.id);
                return Err(e.into());
            }
        };

        self.router.assign(tab_id, &session.id);
        self.registry.attach_tab(&session.id, tab_id)?;
        self.coordinator.flush_now().await;

        Ok(CreateSessionOutcome::Created {
            session_id: session.id,
            tab_id,
            color: session.color,
        })
    }

    pub fn list_sessions(&self) -> (Vec<Session>, Vec<Session>) {
        (
            self.registry.list_by_state(SessionState::Active),
            self.registry.list_by_state(SessionState::Dormant),
        )
    }

    /// Reopen a dormant session in a new tab, at the caller's URL or the
    /// first persisted page.
    pub async fn reopen_session(&self, session_id: &str, url: Option<&str>) -> Result<TabId> {
        let target = self.registry.reopen_target(session_id, url)?;
        let tab_id = self.host.create_tab(&target)?;

        self.router.assign(tab_id, session_id);
        self.registry.attach_tab(session_id, tab_id)?;
        self.coordinator.flush_now().await;

        tracing::info!(session_id = %session_id, tab_id, url = %target, "Reopened session");
        Ok(tab_id)
    }

    /// Delete a dormant session from memory and every tier, including its
    /// scoped key-value data.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.registry.delete(session_id)?;
        self.jar.remove_session(session_id);
        self.router.forget_session(session_id);
        self.session_data_clear(session_id)?;
        self.coordinator.delete_session(session_id);
        tokio::time::sleep(self.config.commit_settle()).await;
        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        let gate = self.registry.can_create();
        SessionStatus {
            active_count: gate.active_count,
            limit: gate.limit,
            tier: self.registry.policy().tier(),
        }
    }

    // Tab event funnel

    pub fn on_tab_created(
        &self,
        tab_id: TabId,
        opener: Option<TabId>,
        url: Option<&str>,
    ) -> Option<String> {
        let session_id = self.router.on_tab_created(tab_id, opener, url)?;
        if self.registry.attach_tab(&session_id, tab_id).is_err() {
            // Router knew a session the registry no longer has
            self.router.forget_session(&session_id);
            return None;
        }
        self.coordinator.mark_dirty();
        Some(session_id)
    }

    pub fn on_tab_updated(&self, tab_id: TabId, url: &str, title: &str) {
        self.router.on_tab_updated(tab_id, url, title);
        if let Some(session_id) = self.router.session_for(tab_id) {
            self.registry.touch(&session_id);
            self.coordinator.mark_dirty();
        }
    }

    pub fn on_tab_activated(&self, tab_id: TabId) {
        self.router.on_tab_activated(tab_id);
    }

    /// A tab closed. When it was the session's last one the session goes
    /// Dormant (flushed immediately) or, under an auto-restore grant, is
    /// deleted outright.
    pub async fn on_tab_removed(&self, tab_id: TabId) -> Result<Option<TabCloseOutcome>> {
        let Some(removed) = self.router.on_tab_removed(tab_id) else {
            return Ok(None);
        };

        let outcome =
            self.registry
                .handle_tab_closed(&removed.session_id, tab_id, removed.metadata)?;

        match outcome {
            TabCloseOutcome::StillActive => self.coordinator.mark_dirty(),
            TabCloseOutcome::WentDormant => self.coordinator.flush_now().await,
            TabCloseOutcome::Deleted => {
                self.jar.remove_session(&removed.session_id);
                self.session_data_clear(&removed.session_id)?;
                self.coordinator.delete_session(&removed.session_id);
            }
        }

        Ok(Some(outcome))
    }

    // Network event funnel

    pub fn rewrite_request(&self, tab_id: TabId, url: &str, headers: &mut Vec<(String, String)>) {
        self.interceptor.rewrite_request(tab_id, url, headers);
    }

    pub fn capture_response(
        &self,
        tab_id: TabId,
        url: &str,
        headers: &mut Vec<(String, String)>,
    ) -> CaptureSummary {
        let summary = self.interceptor.capture_response(tab_id, url, headers);
        if summary.stored > 0 {
            self.coordinator.mark_dirty();
        }
        summary
    }

    // Session-scoped key-value data

    fn data_key(session_id: &str, key: &str) -> String {
        format!("{DATA_PREFIX}{session_id}/{key}")
    }

    pub fn session_data_set(&self, session_id: &str, key: &str, value: Value) -> Result<()> {
        let entries = [(Self::data_key(session_id, key), value)]
            .into_iter()
            .collect();
        self.kv.set(entries)?;
        Ok(())
    }

    pub fn session_data_get(&self, session_id: &str, key: &str) -> Result<Option<Value>> {
        let key = Self::data_key(session_id, key);
        let mut found = self.kv.get(&[key.as_str()])?;
        Ok(found.remove(&key))
    }

    pub fn session_data_remove(&self, session_id: &str, key: &str) -> Result<()> {
        let key = Self::data_key(session_id, key);
        self.kv.remove(&[key.as_str()])?;
        Ok(())
    }

    pub fn session_data_clear(&self, session_id: &str) -> Result<()> {
        let prefix = format!("{DATA_PREFIX}{session_id}/");
        let keys = self.kv.keys_with_prefix(&prefix)?;
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.kv.remove(&refs)?;
        Ok(())
    }

    // Shared handles for hosts that wire events directly

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    pub fn router(&self) -> &TabSessionRouter {
        &self.router
    }

    pub fn garbage_collector(&self) -> &GarbageCollector {
        &self.gc
    }

    pub fn coordinator(&self) -> &PersistenceCoordinator {
        &self.coordinator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use silo_net::MemorySharedStore;
    use silo_tabs::HostTab;

    struct MockHost {
        tabs: Mutex<Vec<HostTab>>,
        next_id: Mutex<TabId>,
    }

    impl MockHost {
        fn new() -> Self {
            Self {
                tabs: Mutex::new(Vec::new()),
                next_id: Mutex::new(1),
            }
        }
    }

    impl TabHost for MockHost {
        fn list_tabs(&self) -> Vec<HostTab> {
            self.tabs.lock().clone()
        }

        fn create_tab(&self, url: &str) -> silo_tabs::Result<TabId> {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            self.tabs.lock().push(HostTab {
                id,
                url: url.to_string(),
                title: String::new(),
                opener: None,
            });
            Ok(id)
        }

        fn remove_tab(&self, tab_id: TabId) -> silo_tabs::Result<()> {
            self.tabs.lock().retain(|t| t.id != tab_id);
            Ok(())
        }
    }

    fn engine(config: Config) -> Engine {
        Engine::with_database(
            config,
            Database::open_in_memory().unwrap(),
            Arc::new(MockHost::new()),
            Arc::new(MemorySharedStore::new()),
            InterceptMode::Blocking,
        )
    }

    fn test_config() -> Config {
        let mut config = Config::new("/tmp/silo-test");
        config.commit_settle_ms = 1;
        config.debounce_window_ms = 10;
        config.retry_backoff_ms = 1;
        config
    }

    async fn created(engine: &Engine, name: &str) -> (String, TabId) {
        match engine
            .create_session(Some(name.to_string()), Some("https://example.com/"))
            .await
            .unwrap()
        {
            CreateSessionOutcome::Created {
                session_id, tab_id, ..
            } => (session_id, tab_id),
            CreateSessionOutcome::Refused(r) => panic!("unexpected refusal: {}", r.reason),
        }
    }

    #[tokio::test]
    async fn test_create_session_opens_and_assigns_tab() {
        let engine = engine(test_config());
        let (session_id, tab_id) = created(&engine, "Work").await;

        assert_eq!(engine.router.session_for(tab_id).as_deref(), Some(session_id.as_str()));
        let (active, dormant) = engine.list_sessions();
        assert_eq!(active.len(), 1);
        assert!(dormant.is_empty());
        assert_eq!(active[0].name.as_deref(), Some("Work"));
    }

    #[tokio::test]
    async fn test_create_refused_at_free_tier_limit() {
        let engine = engine(test_config());
        for i in 0..5 {
            created(&engine, &format!("s{i}")).await;
        }

        match engine.create_session(None, None).await.unwrap() {
            CreateSessionOutcome::Refused(refusal) => {
                assert_eq!(refusal.active_count, 5);
                assert_eq!(refusal.limit, 5);
                assert_eq!(refusal.tier, Tier::Free);
            }
            CreateSessionOutcome::Created { .. } => panic!("expected refusal"),
        }

        let status = engine.status();
        assert_eq!(status.active_count, 5);
    }

    #[tokio::test]
    async fn test_close_last_tab_then_reopen() {
        let engine = engine(test_config());
        let (session_id, tab_id) = created(&engine, "Mail").await;
        engine.on_tab_updated(tab_id, "https://mail.example.com/inbox", "Inbox");

        let outcome = engine.on_tab_removed(tab_id).await.unwrap();
        assert_eq!(outcome, Some(TabCloseOutcome::WentDormant));
        let (active, dormant) = engine.list_sessions();
        assert!(active.is_empty());
        assert_eq!(dormant.len(), 1);

        let new_tab = engine.reopen_session(&session_id, None).await.unwrap();
        assert_ne!(new_tab, tab_id);
        assert_eq!(
            engine.router.session_for(new_tab).as_deref(),
            Some(session_id.as_str())
        );
        let (active, _) = engine.list_sessions();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_requires_dormant_and_clears_data() {
        let engine = engine(test_config());
        let (session_id, tab_id) = created(&engine, "Temp").await;
        engine
            .session_data_set(&session_id, "theme", json!("dark"))
            .unwrap();

        assert!(engine.delete_session(&session_id).await.is_err());

        engine.on_tab_removed(tab_id).await.unwrap();
        engine.delete_session(&session_id).await.unwrap();

        assert!(!engine.registry.contains(&session_id));
        assert!(engine
            .session_data_get(&session_id, "theme")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_session_data_is_namespaced() {
        let engine = engine(test_config());
        let (a, _) = created(&engine, "A").await;
        let (b, _) = created(&engine, "B").await;

        engine.session_data_set(&a, "theme", json!("dark")).unwrap();
        engine.session_data_set(&b, "theme", json!("light")).unwrap();

        assert_eq!(engine.session_data_get(&a, "theme").unwrap(), Some(json!("dark")));
        assert_eq!(engine.session_data_get(&b, "theme").unwrap(), Some(json!("light")));

        engine.session_data_clear(&a).unwrap();
        assert!(engine.session_data_get(&a, "theme").unwrap().is_none());
        assert_eq!(engine.session_data_get(&b, "theme").unwrap(), Some(json!("light")));
    }

    #[tokio::test]
    async fn test_session_data_quota_surfaces_as_error() {
        let engine = engine(test_config());
        let (session_id, _) = created(&engine, "Big").await;

        let oversized = json!("x".repeat(10_000));
        assert!(engine
            .session_data_set(&session_id, "blob", oversized)
            .is_err());
    }

    #[tokio::test]
    async fn test_network_funnel_isolates_cookies() {
        let engine = engine(test_config());
        let (session_id, tab_id) = created(&engine, "Shop").await;

        let mut inbound = vec![("Set-Cookie".to_string(), "cart=3; Path=/".to_string())];
        let summary = engine.capture_response(tab_id, "https://shop.example.com/", &mut inbound);
        assert_eq!(summary.stored, 1);
        assert!(inbound.is_empty());

        let mut outbound = vec![("Cookie".to_string(), "ambient=1".to_string())];
        engine.rewrite_request(tab_id, "https://shop.example.com/cart", &mut outbound);
        assert_eq!(outbound, vec![("Cookie".to_string(), "cart=3".to_string())]);

        assert_eq!(engine.jar.session_cookies(&session_id).len(), 1);
    }

    #[tokio::test]
    async fn test_opener_inheritance_through_funnel() {
        let engine = engine(test_config());
        let (session_id, tab_id) = created(&engine, "Docs").await;

        let inherited = engine.on_tab_created(99, Some(tab_id), Some("https://example.com/"));
        assert_eq!(inherited.as_deref(), Some(session_id.as_str()));
        assert!(engine
            .registry
            .get(&session_id)
            .unwrap()
            .tabs
            .contains(&99));
    }
}
