//! Cookie error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CookieError {
    #[error("Cookie '{0}' is already expired")]
    Expired(String),

    #[error("Cookie name cannot be empty")]
    EmptyName,

    #[error("Cookie domain '{domain}' is not valid for host '{host}'")]
    DomainMismatch { domain: String, host: String },

    #[error("Malformed cookie: {0}")]
    Malformed(String),
}
