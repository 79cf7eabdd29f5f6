//! SILO Tab Routing
//!
//! Maps host tabs to sessions. Tab ids are assigned by the host platform
//! and are not stable across restarts; the mapping is rebuilt every
//! process start. Inheritance rules: an opener's session wins, otherwise
//! recent domain activity within a sliding window, otherwise the tab
//! stays unassigned.

mod activity;
mod error;
mod host;
mod metadata;
mod router;

pub use activity::DomainActivity;
pub use error::TabError;
pub use host::{HostTab, TabHost};
pub use metadata::{TabMetadata, TabMetadataCache};
pub use router::{RemovedTab, TabSessionRouter, DEFAULT_ACTIVITY_WINDOW};

/// Host-assigned tab identifier. Not durable identity.
pub type TabId = i64;

pub type Result<T> = std::result::Result<T, TabError>;
