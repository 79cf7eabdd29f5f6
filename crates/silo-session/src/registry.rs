//! Session registry
//!
//! The single owner of the session table. All lifecycle transitions
//! funnel through here: tier-gated creation, Active/Dormant flips on tab
//! attach/close, reopening, and Dormant-only deletion.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use silo_tabs::{TabId, TabMetadata};

use crate::error::SessionError;
use crate::session::{PersistedTab, Session, SessionState, COLOR_PALETTE};
use crate::tier::{Limit, Tier, TierPolicy};
use crate::Result;

/// Structured refusal when the tier's active-session limit is reached.
/// Returned as data, never raised as an error.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PolicyRefusal {
    pub active_count: usize,
    pub limit: u32,
    pub tier: Tier,
    pub reason: String,
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Session),
    Refused(PolicyRefusal),
}

/// Snapshot of the creation gate for status queries.
#[derive(Debug, Clone, Copy)]
pub struct CreateGate {
    pub allowed: bool,
    pub active_count: usize,
    pub limit: Limit,
}

/// What happened to a session when one of its tabs closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabCloseOutcome {
    StillActive,
    WentDormant,
    /// Tier grants auto-restore and the user opted in: the session was
    /// deleted outright, relying on the host's own tab restoration.
    Deleted,
}

pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    policy: Arc<dyn TierPolicy>,
    /// User opt-in for auto-restore; only effective when the tier also
    /// grants it.
    auto_restore_opt_in: bool,
}

impl SessionRegistry {
    pub fn new(policy: Arc<dyn TierPolicy>) -> Self {
        Self::with_auto_restore(policy, false)
    }

    pub fn with_auto_restore(policy: Arc<dyn TierPolicy>, auto_restore_opt_in: bool) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            policy,
            auto_restore_opt_in,
        }
    }

    /// Sessions currently counting against the tier limit: those with
    /// tabs plus those still mid-creation.
    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| !s.tabs.is_empty() || s.is_creating)
            .count()
    }

    pub fn can_create(&self) -> CreateGate {
        let active_count = self.active_count();
        let limit = self.policy.limits().max_active_sessions;

        CreateGate {
            allowed: limit.allows(active_count),
            active_count,
            limit,
        }
    }

    /// Create a session, or refuse when the tier's limit is reached.
    pub fn create(&self, name: Option<String>) -> CreateOutcome {
        let gate = self.can_create();
        if !gate.allowed {
            let tier = self.policy.tier();
            let limit = match gate.limit {
                Limit::Finite(n) => n,
                Limit::Unbounded => unreachable!("unbounded limits always allow"),
            };

            let refusal = PolicyRefusal {
                active_count: gate.active_count,
                limit,
                tier,
                reason: format!(
                    "The {tier} tier allows {limit} active sessions; {count} are already active",
                    count = gate.active_count
                ),
            };

            tracing::warn!(
                tier = %tier,
                active = gate.active_count,
                limit,
                "Refused session creation at tier limit"
            );

            return CreateOutcome::Refused(refusal);
        }

        let color = COLOR_PALETTE[self.sessions.read().len() % COLOR_PALETTE.len()];
        let session = Session::new(name, color);
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());

        tracing::info!(
            session_id = %session.id,
            color = %session.color,
            "Created new session"
        );

        CreateOutcome::Created(session)
    }

    /// Clear the transient creation marker once the first tab is bound.
    pub fn finish_creation(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.is_creating = false;
        }
    }

    pub fn get(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn list_by_state(&self, state: SessionState) -> Vec<Session> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.state() == state)
            .cloned()
            .collect()
    }

    pub fn touch(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.touch();
        }
    }

    pub fn attach_tab(&self, session_id: &str, tab_id: TabId) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        session.attach_tab(tab_id);
        session.is_creating = false;
        Ok(session.clone())
    }

    /// Handle a tab closing: capture the page, detach the tab, and flip
    /// the session Dormant when it was the last one. Under an
    /// auto-restore grant with user opt-in the emptied session is deleted
    /// outright instead.
    pub fn handle_tab_closed(
        &self,
        session_id: &str,
        tab_id: TabId,
        metadata: Option<TabMetadata>,
    ) -> Result<TabCloseOutcome> {
        let delete_when_empty =
            self.policy.limits().auto_restore_allowed && self.auto_restore_opt_in;

        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if let Some(meta) = metadata {
            session.persist_tab(PersistedTab::from(meta));
        }
        session.detach_tab(tab_id);

        if !session.tabs.is_empty() {
            return Ok(TabCloseOutcome::StillActive);
        }

        if delete_when_empty {
            sessions.remove(session_id);
            tracing::info!(
                session_id = %session_id,
                "Deleted emptied session under auto-restore grant"
            );
            return Ok(TabCloseOutcome::Deleted);
        }

        tracing::info!(session_id = %session_id, "Session went dormant");
        Ok(TabCloseOutcome::WentDormant)
    }

    /// Resolve the URL a dormant session should reopen at.
    pub fn reopen_target(&self, session_id: &str, url: Option<&str>) -> Result<String> {
        let session = self.get(session_id)?;

        if let Some(url) = url {
            return Ok(url.to_string());
        }

        session
            .persisted_tabs
            .first()
            .map(|t| t.url.clone())
            .ok_or_else(|| SessionError::NothingToReopen(session_id.to_string()))
    }

    /// Delete a session. Permitted only while Dormant.
    pub fn delete(&self, session_id: &str) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if session.state() != SessionState::Dormant {
            return Err(SessionError::NotDormant(session_id.to_string()));
        }

        let session = sessions.remove(session_id).expect("checked above");
        tracing::info!(session_id = %session_id, "Deleted session");
        Ok(session)
    }

    pub fn set_custom_color(&self, session_id: &str, color: &str) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        session.set_custom_color(color)?;
        Ok(session.clone())
    }

    /// Dormant sessions whose last access is older than the tier's
    /// retention window. Unlimited-retention tiers never expire anything.
    pub fn expired_dormant(&self) -> Vec<String> {
        let retention_days = match self.policy.limits().retention_days {
            Limit::Finite(days) => days,
            Limit::Unbounded => return Vec::new(),
        };

        let cutoff = Utc::now() - ChronoDuration::days(retention_days as i64);
        self.sessions
            .read()
            .values()
            .filter(|s| s.tabs.is_empty() && s.last_accessed_at < cutoff)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Force-remove regardless of state; used by the expiration sweep
    /// after its own checks.
    pub fn remove(&self, session_id: &str) -> Option<Session> {
        self.sessions.write().remove(session_id)
    }

    /// Insert a session recovered from a durability tier.
    pub fn restore(&self, mut session: Session) {
        session.is_creating = false;
        self.sessions.write().insert(session.id.clone(), session);
    }

    /// Replace a session wholesale (reconciliation updates tab sets).
    pub fn put(&self, session: Session) {
        self.sessions.write().insert(session.id.clone(), session);
    }

    pub fn clear(&self) {
        self.sessions.write().clear();
    }

    pub fn policy(&self) -> &Arc<dyn TierPolicy> {
        &self.policy
    }

    pub fn auto_restore_enabled(&self) -> bool {
        self.policy.limits().auto_restore_allowed && self.auto_restore_opt_in
    }
}

impl Clone for SessionRegistry {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            policy: Arc::clone(&self.policy),
            auto_restore_opt_in: self.auto_restore_opt_in,
        }
    }
}
