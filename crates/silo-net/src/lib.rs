//! SILO Network Interception
//!
//! Hooks into the host's before-send / after-receive points. Outbound
//! requests from session tabs carry exactly their session's cookies,
//! never merged with ambient state; inbound Set-Cookie headers are
//! captured into the session jar and stripped before the shared cookie
//! store can observe them. The host may not support synchronous
//! suppression; in that observe-only mode the leaked-cookie sweep
//! provides the correctness backstop.

mod error;
mod interceptor;
mod setcookie;
mod shared;

pub use error::NetError;
pub use interceptor::{CaptureSummary, InterceptMode, RequestInterceptor};
pub use setcookie::parse_set_cookie;
pub use shared::{MemorySharedStore, SharedCookieStore};

pub type Result<T> = std::result::Result<T, NetError>;
