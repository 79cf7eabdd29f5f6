//! Host tab contract
//!
//! The engine consumes tab events from the host platform and needs a thin
//! surface back into it: enumerate open tabs, create one, remove one.

use crate::{Result, TabId};

/// A tab as reported by the host platform.
#[derive(Debug, Clone)]
pub struct HostTab {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub opener: Option<TabId>,
}

pub trait TabHost: Send + Sync {
    /// Every currently open tab. Immediately after a restart this may
    /// race the platform's own restoration and come back empty.
    fn list_tabs(&self) -> Vec<HostTab>;

    /// Open a new tab at `url`, returning the host-assigned id.
    fn create_tab(&self, url: &str) -> Result<TabId>;

    fn remove_tab(&self, tab_id: TabId) -> Result<()>;
}
