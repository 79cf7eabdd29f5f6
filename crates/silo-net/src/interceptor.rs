//! Request interception
//!
//! Outbound: a session tab's Cookie header is replaced with exactly that
//! session's matching cookies. Inbound: Set-Cookie headers are parsed,
//! validated, captured into the session jar, and stripped so the shared
//! store never observes them. Both hooks run concurrently across many
//! in-flight requests; jar mutations complete within one invocation.

use url::Url;

use silo_cookies::{CookieJar, DomainGuard};
use silo_tabs::{TabId, TabSessionRouter};

use crate::setcookie::parse_set_cookie;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptMode {
    /// The host applies header rewrites synchronously; stripping a
    /// Set-Cookie actually suppresses it.
    Blocking,
    /// The host only reports headers after the fact. Capture still
    /// happens, but suppression is impossible and the leaked-cookie
    /// sweep must clean up.
    Observe,
}

/// Counts from one inbound capture pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub stored: usize,
    pub rejected: usize,
    /// Set-Cookie entries left in the forwarded header set (observe mode
    /// only).
    pub leaked: usize,
}

pub struct RequestInterceptor {
    jar: CookieJar,
    router: TabSessionRouter,
    mode: InterceptMode,
}

impl RequestInterceptor {
    pub fn new(jar: CookieJar, router: TabSessionRouter, mode: InterceptMode) -> Self {
        Self { jar, router, mode }
    }

    pub fn mode(&self) -> InterceptMode {
        self.mode
    }

    /// Before-send hook. Requests from unassigned tabs pass through
    /// untouched; for session tabs any existing Cookie header is removed
    /// and replaced with the session's own matching cookies — ambient
    /// cookies are never merged in.
    pub fn rewrite_request(&self, tab_id: TabId, url: &str, headers: &mut Vec<(String, String)>) {
        let Some(session_id) = self.router.session_for(tab_id) else {
            return;
        };

        let Some((host, path)) = split_url(url) else {
            return;
        };

        headers.retain(|(name, _)| !name.eq_ignore_ascii_case("cookie"));

        if let Some(value) = self.jar.cookie_header(&session_id, &host, &path) {
            headers.push(("Cookie".to_string(), value));
        }

        tracing::trace!(tab_id, session_id = %session_id, host = %host, "Rewrote request cookies");
    }

    /// After-receive hook. Every Set-Cookie for a session tab is parsed,
    /// domain-validated, and stored in the session jar; in blocking mode
    /// the header is stripped from the forwarded set.
    pub fn capture_response(
        &self,
        tab_id: TabId,
        url: &str,
        headers: &mut Vec<(String, String)>,
    ) -> CaptureSummary {
        let mut summary = CaptureSummary::default();

        let Some(session_id) = self.router.session_for(tab_id) else {
            return summary;
        };

        let Some((host, _)) = split_url(url) else {
            return summary;
        };

        let mut remaining = Vec::with_capacity(headers.len());
        for (name, value) in headers.drain(..) {
            if !name.eq_ignore_ascii_case("set-cookie") {
                remaining.push((name, value));
                continue;
            }

            match parse_set_cookie(&value, &host) {
                Ok(cookie) if DomainGuard::validate(&cookie.domain, &host) => {
                    match self.jar.store(&session_id, cookie) {
                        Ok(()) => summary.stored += 1,
                        Err(e) => {
                            summary.rejected += 1;
                            tracing::debug!(
                                session_id = %session_id,
                                error = %e,
                                "Rejected inbound cookie"
                            );
                        }
                    }
                }
                Ok(cookie) => {
                    summary.rejected += 1;
                    tracing::warn!(
                        session_id = %session_id,
                        cookie_domain = %cookie.domain,
                        host = %host,
                        "Blocked cookie declaring foreign domain"
                    );
                }
                Err(e) => {
                    summary.rejected += 1;
                    tracing::debug!(host = %host, error = %e, "Malformed Set-Cookie");
                }
            }

            // Suppressed in blocking mode; observe mode must forward it
            // and rely on the leak sweep.
            if self.mode == InterceptMode::Observe {
                summary.leaked += 1;
                remaining.push((name, value));
            }
        }

        *headers = remaining;
        summary
    }
}

impl Clone for RequestInterceptor {
    fn clone(&self) -> Self {
        Self {
            jar: self.jar.clone(),
            router: self.router.clone(),
            mode: self.mode,
        }
    }
}

fn split_url(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some((host, parsed.path().to_string()))
}
