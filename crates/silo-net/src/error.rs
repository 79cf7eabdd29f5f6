//! Network interception error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("Cookie error: {0}")]
    Cookie(#[from] silo_cookies::CookieError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Shared cookie store error: {0}")]
    Shared(String),
}
