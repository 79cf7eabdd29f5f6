//! Session data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use silo_tabs::{TabId, TabMetadata};

use crate::error::SessionError;
use crate::Result;

/// Palette cycled through for new sessions.
pub const COLOR_PALETTE: &[&str] = &[
    "blue", "red", "green", "yellow", "purple", "orange", "teal", "pink",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// At least one tab is assigned
    Active,
    /// No open tabs; cookies and metadata retained for reopening
    Dormant,
}

/// A tab captured when its session went dormant, enough to reopen it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedTab {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub path: String,
}

impl From<TabMetadata> for PersistedTab {
    fn from(meta: TabMetadata) -> Self {
        Self {
            url: meta.url,
            title: meta.title,
            domain: meta.domain,
            path: meta.path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Immutable identifier, never reused — a fresh one is minted even on
    /// import
    pub id: String,
    pub name: Option<String>,
    /// Palette color name
    pub color: String,
    /// Optional user-picked #rrggbb override
    pub custom_color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Currently assigned host tabs; rebuilt after every restart
    #[serde(default)]
    pub tabs: HashSet<TabId>,
    /// Pages captured when the session last went dormant
    #[serde(default)]
    pub persisted_tabs: Vec<PersistedTab>,
    /// Transient creation marker, never persisted
    #[serde(skip)]
    pub is_creating: bool,
}

impl Session {
    pub fn new(name: Option<String>, color: &str) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            color: color.to_string(),
            custom_color: None,
            created_at: now,
            last_accessed_at: now,
            tabs: HashSet::new(),
            persisted_tabs: Vec::new(),
            is_creating: true,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.tabs.is_empty() {
            SessionState::Dormant
        } else {
            SessionState::Active
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    pub fn attach_tab(&mut self, tab_id: TabId) {
        self.tabs.insert(tab_id);
        self.touch();
    }

    pub fn detach_tab(&mut self, tab_id: TabId) {
        self.tabs.remove(&tab_id);
        self.touch();
    }

    /// Append a closing tab's capture, deduplicated by URL.
    pub fn persist_tab(&mut self, tab: PersistedTab) {
        if tab.url.is_empty() {
            return;
        }
        if self.persisted_tabs.iter().any(|t| t.url == tab.url) {
            return;
        }
        self.persisted_tabs.push(tab);
    }

    pub fn set_custom_color(&mut self, color: &str) -> Result<()> {
        if !is_valid_hex_color(color) {
            return Err(SessionError::InvalidColor(color.to_string()));
        }
        self.custom_color = Some(color.to_lowercase());
        self.touch();
        Ok(())
    }

    /// The color the UI should show: custom override, else palette name.
    pub fn display_color(&self) -> &str {
        self.custom_color.as_deref().unwrap_or(&self.color)
    }
}

fn is_valid_hex_color(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };
    hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())
}
