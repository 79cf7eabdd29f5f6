//! Engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] silo_storage::StorageError),

    #[error("Cookie error: {0}")]
    Cookie(#[from] silo_cookies::CookieError),

    #[error("Tab error: {0}")]
    Tab(#[from] silo_tabs::TabError),

    #[error("Session error: {0}")]
    Session(#[from] silo_session::SessionError),

    #[error("Network error: {0}")]
    Net(#[from] silo_net::NetError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
