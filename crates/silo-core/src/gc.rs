//! Garbage collection
//!
//! Four independent sweeps keep the session set and the stores honest:
//! retention expiry for dormant sessions (tier-gated), record-store
//! orphans from interrupted deletes, cookies that leaked into the shared
//! non-isolated store, and expired cookies across all jars.

use std::sync::Arc;
use std::time::Duration;

use silo_cookies::CookieJar;
use silo_net::SharedCookieStore;
use silo_session::SessionRegistry;
use silo_storage::{RecordStore, SqliteRecordStore};
use silo_tabs::TabSessionRouter;

/// Per-run sweep counts, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_sessions: usize,
    pub orphaned_records: usize,
    pub leaked_cookies: usize,
    pub expired_cookies: usize,
}

pub struct GarbageCollector {
    registry: SessionRegistry,
    jar: CookieJar,
    router: TabSessionRouter,
    records: SqliteRecordStore,
    shared: Arc<dyn SharedCookieStore>,
}

impl GarbageCollector {
    pub fn new(
        registry: SessionRegistry,
        jar: CookieJar,
        router: TabSessionRouter,
        records: SqliteRecordStore,
        shared: Arc<dyn SharedCookieStore>,
    ) -> Self {
        Self {
            registry,
            jar,
            router,
            records,
            shared,
        }
    }

    /// Run every sweep once.
    pub fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            expired_sessions: self.expiration_sweep(),
            orphaned_records: self.orphan_sweep(),
            leaked_cookies: self.leak_sweep(),
            expired_cookies: self.jar.purge_expired(),
        };

        if report != SweepReport::default() {
            tracing::info!(
                expired_sessions = report.expired_sessions,
                orphaned_records = report.orphaned_records,
                leaked_cookies = report.leaked_cookies,
                expired_cookies = report.expired_cookies,
                "Garbage collection swept"
            );
        }

        report
    }

    /// Periodic loop; spawn once on the host runtime.
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.sweep();
        }
    }

    /// Delete zero-tab sessions whose last access is past the tier's
    /// retention window, from memory and every store. Unlimited-retention
    /// tiers never expire anything.
    pub fn expiration_sweep(&self) -> usize {
        let expired = self.registry.expired_dormant();
        let count = expired.len();

        for session_id in expired {
            self.registry.remove(&session_id);
            self.jar.remove_session(&session_id);
            self.router.forget_session(&session_id);
            if let Err(e) = self.records.delete_by_id(&session_id) {
                tracing::warn!(session_id = %session_id, error = %e, "Record delete failed during expiry");
            }

            tracing::info!(session_id = %session_id, "Expired dormant session past retention");
        }

        count
    }

    /// Delete record-store rows whose session id no longer exists in
    /// memory. Recovers from a prior interrupted delete.
    pub fn orphan_sweep(&self) -> usize {
        let ids = match self.records.all_ids() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Record enumeration failed; skipping orphan sweep");
                return 0;
            }
        };

        let mut removed = 0;
        for id in ids {
            if self.registry.contains(&id) {
                continue;
            }

            match self.records.delete_by_id(&id) {
                Ok(()) => {
                    removed += 1;
                    tracing::info!(record_id = %id, "Deleted orphaned session record");
                }
                Err(e) => {
                    tracing::warn!(record_id = %id, error = %e, "Orphan delete failed");
                }
            }
        }

        removed
    }

    /// Scan the shared store for domains touched by session tabs. A cookie
    /// there is harmless if no session owns it, expected if owned by the
    /// tab's own session, and a leak if owned by a different session —
    /// those are deleted.
    pub fn leak_sweep(&self) -> usize {
        let mut removed = 0;

        for (domain, tab_session) in self.router.touched_domains() {
            for cookie in self.shared.cookies_for_domain(&domain) {
                let owners = self.jar.owning_sessions(&cookie.domain, &cookie.name);
                if owners.is_empty() || owners.contains(&tab_session) {
                    continue;
                }

                match self.shared.remove(&cookie.domain, &cookie.name, &cookie.path) {
                    Ok(()) => {
                        removed += 1;
                        tracing::warn!(
                            domain = %cookie.domain,
                            name = %cookie.name,
                            "Removed cookie leaked into shared store"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(domain = %cookie.domain, error = %e, "Shared store delete failed");
                    }
                }
            }
        }

        removed
    }
}

impl Clone for GarbageCollector {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            jar: self.jar.clone(),
            router: self.router.clone(),
            records: self.records.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}
