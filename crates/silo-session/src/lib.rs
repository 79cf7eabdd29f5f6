//! SILO Session Lifecycle
//!
//! A session is an isolated browsing identity: its own cookie jar and
//! zero-or-more tabs. Sessions are Active while at least one tab is
//! assigned, Dormant once the last tab closes (metadata retained), and
//! may only be Deleted while Dormant. Creation is gated by the active
//! tier's limits; a refusal is a structured result, never an error.

mod error;
mod registry;
mod session;
mod tier;

pub use error::SessionError;
pub use registry::{CreateGate, CreateOutcome, PolicyRefusal, SessionRegistry, TabCloseOutcome};
pub use session::{PersistedTab, Session, SessionState, COLOR_PALETTE};
pub use tier::{Limit, StaticTierPolicy, Tier, TierLimits, TierPolicy};

pub type Result<T> = std::result::Result<T, SessionError>;
