//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use silo_session::Tier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database
    pub data_dir: PathBuf,
    pub tier: Tier,
    /// User opt-in for auto-restore; effective only when the tier grants it
    pub auto_restore_opt_in: bool,
    /// Quiet period after the last mutation before a debounced flush
    pub debounce_window_ms: u64,
    /// Settle wait after an immediate flush commits
    pub commit_settle_ms: u64,
    /// Sliding window for domain-activity tab inheritance
    pub activity_window_secs: u64,
    pub gc_interval_secs: u64,
    /// Post-restart tab enumeration retries
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Config {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            tier: Tier::Free,
            auto_restore_opt_in: false,
            debounce_window_ms: 1000,
            commit_settle_ms: 100,
            activity_window_secs: 30,
            gc_interval_secs: 300,
            retry_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("silo.db")
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn commit_settle(&self) -> Duration {
        Duration::from_millis(self.commit_settle_ms)
    }

    pub fn activity_window(&self) -> Duration {
        Duration::from_secs(self.activity_window_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
