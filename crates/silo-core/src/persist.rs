//! Multi-tier persistence coordination
//!
//! Session state lives in memory and is mirrored across three further
//! tiers: a fast-volatile store, a size-limited durable key-value store,
//! and the authoritative durable record store. Writes are debounced after
//! ordinary mutations and immediate (with a commit settle) around
//! lifecycle changes. Restore walks the tiers most-fresh-first and takes
//! the first non-trivial answer. A failing tier is logged and skipped;
//! it never blocks the in-memory operation that triggered the write.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use silo_cookies::{Cookie, CookieJar};
use silo_session::{Session, SessionRegistry};
use silo_storage::{MemoryStore, RecordStore, SqliteKvStore, SqliteRecordStore, StorageTier};
use silo_tabs::{HostTab, TabHost, TabId, TabSessionRouter};

/// Whole-state key used in the volatile and key-value tiers.
pub const STATE_KEY: &str = "silo/state";

/// A tab binding captured at flush time. `url` is the remap key after a
/// restart; entries without one can only match by raw id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabMapping {
    pub tab_id: TabId,
    #[serde(default)]
    pub url: String,
}

/// Everything needed to bring one session back: the session itself, its
/// cookies, and the tab bindings it had when last flushed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: Session,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub tab_mappings: Vec<TabMapping>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateBlob {
    sessions: Vec<SessionSnapshot>,
}

pub struct PersistenceCoordinator {
    registry: SessionRegistry,
    jar: CookieJar,
    router: TabSessionRouter,
    volatile: MemoryStore,
    kv: SqliteKvStore,
    records: SqliteRecordStore,
    dirty: Arc<Notify>,
    pending: Arc<AtomicBool>,
    debounce: Duration,
    settle: Duration,
}

impl PersistenceCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: SessionRegistry,
        jar: CookieJar,
        router: TabSessionRouter,
        volatile: MemoryStore,
        kv: SqliteKvStore,
        records: SqliteRecordStore,
        debounce: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            registry,
            jar,
            router,
            volatile,
            kv,
            records,
            dirty: Arc::new(Notify::new()),
            pending: Arc::new(AtomicBool::new(false)),
            debounce,
            settle,
        }
    }

    /// Request a debounced flush. Returns immediately; the background loop
    /// writes once the debounce window has passed without further marks.
    pub fn mark_dirty(&self) {
        self.pending.store(true, Ordering::SeqCst);
        self.dirty.notify_one();
    }

    /// Background debounce loop; spawn once on the host runtime. Every
    /// further mark re-arms the window, so a flush happens only once the
    /// full window has passed since the last mutation.
    pub async fn run(self) {
        loop {
            self.dirty.notified().await;

            loop {
                tokio::select! {
                    _ = self.dirty.notified() => {}
                    _ = tokio::time::sleep(self.debounce) => break,
                }
            }

            if self.pending.swap(false, Ordering::SeqCst) {
                self.write_all();
            }
        }
    }

    /// Immediate flush: write every tier now, then wait out the commit
    /// settle so callers observe durable state before proceeding.
    pub async fn flush_now(&self) {
        self.write_all();
        tokio::time::sleep(self.settle).await;
    }

    /// Current state as per-session snapshots.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let tab_snapshot = self.router.snapshot();

        self.registry
            .list()
            .into_iter()
            .map(|session| {
                let cookies = self.jar.session_cookies(&session.id);
                let tab_mappings = tab_snapshot
                    .iter()
                    .filter(|(_, session_id, _)| session_id == &session.id)
                    .map(|(tab_id, _, meta)| TabMapping {
                        tab_id: *tab_id,
                        url: meta.as_ref().map(|m| m.url.clone()).unwrap_or_default(),
                    })
                    .collect();

                SessionSnapshot {
                    session,
                    cookies,
                    tab_mappings,
                }
            })
            .collect()
    }

    /// Write the current state to every tier. Per-tier failures are logged
    /// and absorbed; the remaining tiers are still written.
    pub fn write_all(&self) -> usize {
        let snapshots = self.snapshot();
        let count = snapshots.len();

        for snapshot in &snapshots {
            match serde_json::to_value(snapshot) {
                Ok(payload) => {
                    if let Err(e) = self.records.put_record(&snapshot.session.id, payload) {
                        tracing::warn!(
                            tier = self.records.name(),
                            session_id = %snapshot.session.id,
                            error = %e,
                            "Tier write failed; continuing with remaining tiers"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %snapshot.session.id, error = %e, "Snapshot serialization failed");
                }
            }
        }

        let blob = match serde_json::to_value(StateBlob { sessions: snapshots }) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(error = %e, "State blob serialization failed");
                return count;
            }
        };

        for tier in [&self.volatile as &dyn StorageTier, &self.kv] {
            let entries = [(STATE_KEY.to_string(), blob.clone())].into_iter().collect();
            if let Err(e) = tier.set(entries) {
                tracing::warn!(
                    tier = tier.name(),
                    error = %e,
                    "Tier write failed; continuing with remaining tiers"
                );
            }
        }

        tracing::debug!(sessions = count, "Flushed state to all tiers");
        count
    }

    /// Remove one session from every tier and refresh the whole-state
    /// blobs.
    pub fn delete_session(&self, session_id: &str) {
        if let Err(e) = self.records.delete_by_id(session_id) {
            tracing::warn!(
                tier = self.records.name(),
                session_id = %session_id,
                error = %e,
                "Tier delete failed"
            );
        }
        self.write_all();
    }

    /// Read back the freshest available state: volatile, then key-value,
    /// then the record store, then empty.
    pub fn restore(&self) -> Vec<SessionSnapshot> {
        for tier in [&self.volatile as &dyn StorageTier, &self.kv] {
            match tier.get(&[STATE_KEY]) {
                Ok(mut found) => {
                    if let Some(blob) = found.remove(STATE_KEY) {
                        if let Some(snapshots) = parse_blob(blob) {
                            if !snapshots.is_empty() {
                                tracing::info!(
                                    tier = tier.name(),
                                    sessions = snapshots.len(),
                                    "Restored state"
                                );
                                return snapshots;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(tier = tier.name(), error = %e, "Tier read failed; trying next");
                }
            }
        }

        match self.restore_from_records() {
            Ok(snapshots) if !snapshots.is_empty() => {
                tracing::info!(
                    tier = self.records.name(),
                    sessions = snapshots.len(),
                    "Restored state"
                );
                snapshots
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(tier = self.records.name(), error = %e, "Tier read failed; starting empty");
                Vec::new()
            }
        }
    }

    fn restore_from_records(&self) -> silo_storage::Result<Vec<SessionSnapshot>> {
        let mut snapshots = Vec::new();
        for id in self.records.all_ids()? {
            match self.records.get_record(&id)? {
                Some(payload) => match serde_json::from_value(payload) {
                    Ok(snapshot) => snapshots.push(snapshot),
                    Err(e) => {
                        tracing::warn!(record_id = %id, error = %e, "Skipping unreadable session record");
                    }
                },
                None => {}
            }
        }
        Ok(snapshots)
    }

    /// Load restored snapshots into the in-memory state and, when the
    /// auto-restore gate is open, remap tabs by exact URL against the live
    /// tab list. A session with no confident match stays Dormant.
    pub fn apply_restore(&self, snapshots: Vec<SessionSnapshot>, live_tabs: &[HostTab]) -> usize {
        let auto_restore = self.registry.auto_restore_enabled();
        let mut claimed: HashSet<TabId> = HashSet::new();
        let mut remapped = 0;

        for snapshot in snapshots {
            let mut session = snapshot.session;
            let session_id = session.id.clone();
            session.tabs.clear();

            self.registry.restore(session);
            self.jar.restore_session(&session_id, snapshot.cookies);

            if !auto_restore {
                continue;
            }

            for mapping in &snapshot.tab_mappings {
                let matched = if mapping.url.is_empty() {
                    // Legacy entry without URL metadata: raw-id match only
                    live_tabs
                        .iter()
                        .find(|t| t.id == mapping.tab_id && !claimed.contains(&t.id))
                } else {
                    live_tabs
                        .iter()
                        .find(|t| t.url == mapping.url && !claimed.contains(&t.id))
                };

                let Some(tab) = matched else {
                    // On-disk-only tab: dropped, session may stay Dormant
                    continue;
                };

                claimed.insert(tab.id);
                self.router.assign(tab.id, &session_id);
                self.router.metadata().record(tab.id, &tab.url, &tab.title);
                if self.registry.attach_tab(&session_id, tab.id).is_ok() {
                    remapped += 1;
                }
            }
        }

        if auto_restore {
            tracing::info!(remapped, "Applied restored state with tab remapping");
        } else {
            tracing::info!("Applied restored state as dormant metadata only");
        }

        remapped
    }

    /// Enumerate host tabs after a restart, retrying while the platform's
    /// own restoration may still be in flight.
    pub async fn enumerate_tabs_with_retry(
        host: &dyn TabHost,
        attempts: u32,
        backoff: Duration,
    ) -> Vec<HostTab> {
        for attempt in 1..=attempts.max(1) {
            let tabs = host.list_tabs();
            if !tabs.is_empty() {
                return tabs;
            }

            if attempt < attempts {
                tracing::debug!(attempt, "No tabs enumerated yet; retrying");
                tokio::time::sleep(backoff).await;
            }
        }

        tracing::info!(attempts, "Concluded no tabs are available");
        Vec::new()
    }
}

impl Clone for PersistenceCoordinator {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            jar: self.jar.clone(),
            router: self.router.clone(),
            volatile: self.volatile.clone(),
            kv: self.kv.clone(),
            records: self.records.clone(),
            dirty: Arc::clone(&self.dirty),
            pending: Arc::clone(&self.pending),
            debounce: self.debounce,
            settle: self.settle,
        }
    }
}

fn parse_blob(blob: Value) -> Option<Vec<SessionSnapshot>> {
    match serde_json::from_value::<StateBlob>(blob) {
        Ok(state) => Some(state.sessions),
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable state blob; trying next tier");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use silo_session::{CreateOutcome, StaticTierPolicy, Tier};
    use silo_storage::Database;

    fn coordinator(
        db: &Database,
        tier: Tier,
        auto_restore_opt_in: bool,
    ) -> PersistenceCoordinator {
        let registry = SessionRegistry::with_auto_restore(
            Arc::new(StaticTierPolicy::new(tier)),
            auto_restore_opt_in,
        );
        PersistenceCoordinator::new(
            registry,
            CookieJar::new(),
            TabSessionRouter::new(),
            MemoryStore::new("fast-volatile"),
            SqliteKvStore::new(db.clone()),
            SqliteRecordStore::new(db.clone()),
            Duration::from_millis(10),
            Duration::from_millis(1),
        )
    }

    fn create_session(coordinator: &PersistenceCoordinator, name: &str) -> Session {
        match coordinator.registry.create(Some(name.to_string())) {
            CreateOutcome::Created(s) => s,
            CreateOutcome::Refused(r) => panic!("unexpected refusal: {}", r.reason),
        }
    }

    #[test]
    fn test_round_trip_survives_memory_loss() {
        let db = Database::open_in_memory().unwrap();
        let first = coordinator(&db, Tier::Free, false);

        let session = create_session(&first, "Work");
        first.registry.attach_tab(&session.id, 7).unwrap();
        first.router.assign(7, &session.id);
        first
            .jar
            .store(&session.id, Cookie::new("sid", "abc", "example.com"))
            .unwrap();
        first.write_all();

        // Fresh process: memory and volatile tier are gone, durable tiers
        // share the database.
        let second = coordinator(&db, Tier::Free, false);
        let snapshots = second.restore();
        second.apply_restore(snapshots, &[]);

        let restored = second.registry.get(&session.id).unwrap();
        assert_eq!(restored.name.as_deref(), Some("Work"));
        assert_eq!(restored.color, session.color);
        assert!(restored.tabs.is_empty());

        let cookies = second.jar.session_cookies(&session.id);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, "abc");
    }

    #[test]
    fn test_restore_prefers_volatile_tier() {
        let db = Database::open_in_memory().unwrap();
        let first = coordinator(&db, Tier::Free, false);

        let session = create_session(&first, "Fresh");
        first.registry.finish_creation(&session.id);
        first.write_all();

        // Durable tiers fall behind: delete the session there but leave
        // the volatile blob intact.
        first.records.delete_by_id(&session.id).unwrap();
        first.kv.remove(&[STATE_KEY]).unwrap();

        let snapshots = first.restore();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].session.id, session.id);

        // With the volatile tier wiped the record store answers, and it
        // has nothing.
        first.volatile.wipe();
        assert!(first.restore().is_empty());
    }

    #[test]
    fn test_delete_confirmed_by_record_ids() {
        let db = Database::open_in_memory().unwrap();
        let c = coordinator(&db, Tier::Free, false);

        let session = create_session(&c, "Gone");
        c.registry.finish_creation(&session.id);
        c.write_all();
        assert_eq!(c.records.all_ids().unwrap(), vec![session.id.clone()]);

        c.registry.remove(&session.id);
        c.delete_session(&session.id);
        assert!(c.records.all_ids().unwrap().is_empty());
    }

    #[test]
    fn test_tab_remap_by_exact_url() {
        let db = Database::open_in_memory().unwrap();
        let first = coordinator(&db, Tier::Premium, true);

        let session = create_session(&first, "Mail");
        first.registry.attach_tab(&session.id, 3).unwrap();
        first.router.assign(3, &session.id);
        first
            .router
            .on_tab_updated(3, "https://mail.example.com/inbox", "Inbox");
        first.write_all();

        // After restart the host hands out different tab ids.
        let second = coordinator(&db, Tier::Premium, true);
        let live = vec![HostTab {
            id: 42,
            url: "https://mail.example.com/inbox".to_string(),
            title: "Inbox".to_string(),
            opener: None,
        }];

        let snapshots = second.restore();
        let remapped = second.apply_restore(snapshots, &live);
        assert_eq!(remapped, 1);
        assert_eq!(second.router.session_for(42).as_deref(), Some(session.id.as_str()));

        let restored = second.registry.get(&session.id).unwrap();
        assert!(restored.tabs.contains(&42));
    }

    #[test]
    fn test_no_url_match_leaves_session_dormant() {
        let db = Database::open_in_memory().unwrap();
        let first = coordinator(&db, Tier::Premium, true);

        let session = create_session(&first, "Mail");
        first.registry.attach_tab(&session.id, 3).unwrap();
        first.router.assign(3, &session.id);
        first
            .router
            .on_tab_updated(3, "https://mail.example.com/inbox", "Inbox");
        first.write_all();

        let second = coordinator(&db, Tier::Premium, true);
        let live = vec![HostTab {
            id: 42,
            url: "https://other.example.com/".to_string(),
            title: "Other".to_string(),
            opener: None,
        }];

        let snapshots = second.restore();
        assert_eq!(second.apply_restore(snapshots, &live), 0);
        assert!(second.registry.get(&session.id).unwrap().tabs.is_empty());
    }

    #[test]
    fn test_gate_closed_restores_dormant_metadata_only() {
        let db = Database::open_in_memory().unwrap();
        let first = coordinator(&db, Tier::Premium, true);

        let session = create_session(&first, "Mail");
        first.registry.attach_tab(&session.id, 3).unwrap();
        first.router.assign(3, &session.id);
        first
            .router
            .on_tab_updated(3, "https://mail.example.com/inbox", "Inbox");
        first.write_all();

        // Same tier, but the user never opted in.
        let second = coordinator(&db, Tier::Premium, false);
        let live = vec![HostTab {
            id: 42,
            url: "https://mail.example.com/inbox".to_string(),
            title: "Inbox".to_string(),
            opener: None,
        }];

        let snapshots = second.restore();
        assert_eq!(second.apply_restore(snapshots, &live), 0);
        assert!(second.registry.contains(&session.id));
        assert!(second.router.session_for(42).is_none());
    }

    #[test]
    fn test_kv_quota_failure_degrades_to_records() {
        let db = Database::open_in_memory().unwrap();
        let registry = SessionRegistry::new(Arc::new(StaticTierPolicy::new(Tier::Free)));
        let jar = CookieJar::new();
        let c = PersistenceCoordinator::new(
            registry.clone(),
            jar.clone(),
            TabSessionRouter::new(),
            MemoryStore::new("fast-volatile"),
            SqliteKvStore::with_quota(db.clone(), 8),
            SqliteRecordStore::new(db.clone()),
            Duration::from_millis(10),
            Duration::from_millis(1),
        );

        let session = match registry.create(Some("Big".to_string())) {
            CreateOutcome::Created(s) => s,
            CreateOutcome::Refused(r) => panic!("unexpected refusal: {}", r.reason),
        };
        registry.finish_creation(&session.id);
        c.write_all();

        // Key-value tier refused on quota; record store still has it.
        assert!(c.kv.get(&[STATE_KEY]).unwrap().is_empty());
        assert_eq!(c.records.all_ids().unwrap(), vec![session.id]);
    }

    struct ScriptedHost {
        responses: Mutex<Vec<Vec<HostTab>>>,
    }

    impl TabHost for ScriptedHost {
        fn list_tabs(&self) -> Vec<HostTab> {
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Vec::new()
            } else {
                responses.remove(0)
            }
        }

        fn create_tab(&self, _url: &str) -> silo_tabs::Result<TabId> {
            Ok(0)
        }

        fn remove_tab(&self, _tab_id: TabId) -> silo_tabs::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_enumeration_retries_until_tabs_appear() {
        let tab = HostTab {
            id: 1,
            url: "https://example.com/".to_string(),
            title: "Example".to_string(),
            opener: None,
        };
        let host = ScriptedHost {
            responses: Mutex::new(vec![Vec::new(), Vec::new(), vec![tab]]),
        };

        let tabs =
            PersistenceCoordinator::enumerate_tabs_with_retry(&host, 3, Duration::from_millis(1))
                .await;
        assert_eq!(tabs.len(), 1);
    }

    #[tokio::test]
    async fn test_enumeration_gives_up_after_bounded_attempts() {
        let host = ScriptedHost {
            responses: Mutex::new(Vec::new()),
        };

        let tabs =
            PersistenceCoordinator::enumerate_tabs_with_retry(&host, 3, Duration::from_millis(1))
                .await;
        assert!(tabs.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_burst_defers_flush_until_quiet() {
        let db = Database::open_in_memory().unwrap();
        let registry = SessionRegistry::new(Arc::new(StaticTierPolicy::new(Tier::Free)));
        let c = PersistenceCoordinator::new(
            registry.clone(),
            CookieJar::new(),
            TabSessionRouter::new(),
            MemoryStore::new("fast-volatile"),
            SqliteKvStore::new(db.clone()),
            SqliteRecordStore::new(db.clone()),
            Duration::from_millis(100),
            Duration::from_millis(1),
        );

        let session = match registry.create(Some("Burst".to_string())) {
            CreateOutcome::Created(s) => s,
            CreateOutcome::Refused(r) => panic!("unexpected refusal: {}", r.reason),
        };
        registry.finish_creation(&session.id);

        let background = c.clone();
        let handle = tokio::spawn(background.run());

        // Each mark lands inside the previous window and must re-arm it
        for _ in 0..4 {
            c.mark_dirty();
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        assert!(c.records.all_ids().unwrap().is_empty());

        // A full quiet window after the last mark: now it flushes
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.abort();
        assert_eq!(c.records.all_ids().unwrap(), vec![session.id]);
    }

    #[tokio::test]
    async fn test_debounced_flush_happens_after_quiet_period() {
        let db = Database::open_in_memory().unwrap();
        let c = coordinator(&db, Tier::Free, false);

        let session = create_session(&c, "Debounced");
        c.registry.finish_creation(&session.id);

        let background = c.clone();
        let handle = tokio::spawn(background.run());

        c.mark_dirty();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(c.records.all_ids().unwrap(), vec![session.id]);
    }
}
