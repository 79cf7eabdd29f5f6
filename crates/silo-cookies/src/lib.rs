//! SILO Cookie Isolation
//!
//! Each session owns a private cookie jar; a cookie stored under one
//! session is never visible to another. The DomainGuard blocks cookies
//! that declare an unrelated or overly broad domain before they ever
//! reach a jar.

mod cookie;
mod error;
mod guard;
mod jar;

pub use cookie::{parse_expiry, Cookie, SameSite};
pub use error::CookieError;
pub use guard::DomainGuard;
pub use jar::CookieJar;

pub type Result<T> = std::result::Result<T, CookieError>;
