//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {0} still has open tabs; only dormant sessions can be deleted")]
    NotDormant(String),

    #[error("Session {0} has no persisted tabs to reopen")]
    NothingToReopen(String),

    #[error("Invalid color '{0}': expected #rrggbb")]
    InvalidColor(String),
}
