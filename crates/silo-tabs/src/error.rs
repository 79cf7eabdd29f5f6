//! Tab error types

use thiserror::Error;

use crate::TabId;

#[derive(Error, Debug)]
pub enum TabError {
    #[error("Tab not found: {0}")]
    NotFound(TabId),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Host platform error: {0}")]
    Host(String),
}
