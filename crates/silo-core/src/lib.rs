//! SILO Core Engine
//!
//! Ties the workspace together: session registry, per-session cookie
//! jars, tab routing, request interception, four-tier persistence, and
//! garbage collection, behind one `Engine` facade and a closed typed API.

mod api;
mod config;
mod engine;
mod error;
mod gc;
mod persist;

pub use api::{dispatch, ApiRequest, ApiResponse};
pub use config::Config;
pub use engine::{CreateSessionOutcome, Engine, SessionStatus};
pub use error::CoreError;
pub use gc::{GarbageCollector, SweepReport};
pub use persist::{PersistenceCoordinator, SessionSnapshot, TabMapping, STATE_KEY};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
