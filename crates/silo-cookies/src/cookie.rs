//! Cookie data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Owning domain, stored lowercase without a leading dot
    pub domain: String,
    /// Path scope, defaults to "/"
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    /// Expiry as epoch seconds; `None` means a session cookie that never
    /// expires on its own
    pub expiration_date: Option<f64>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            same_site: None,
            expiration_date: None,
        }
    }

    pub fn is_expired_at(&self, now_epoch: f64) -> bool {
        match self.expiration_date {
            Some(expiry) => expiry <= now_epoch,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp() as f64)
    }
}

/// Strip a leading dot and lowercase, the canonical stored form.
pub(crate) fn normalize_domain(domain: &str) -> String {
    domain.trim_start_matches('.').to_lowercase()
}

/// Parse a cookie expiry attribute.
///
/// Accepts numeric epoch seconds or a date string (RFC 2822 / RFC 3339 /
/// the classic HTTP cookie date). Unparsable input fails open: the cookie
/// is treated as non-expiring rather than rejected.
pub fn parse_expiry(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(epoch) = raw.parse::<f64>() {
        return Some(epoch);
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.timestamp() as f64);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp() as f64);
    }

    // Old-style cookie dates use dashes: "Wed, 21-Oct-2015 07:28:00 GMT"
    let dedashed = raw.replacen('-', " ", 2).replace('-', " ");
    if let Ok(dt) = DateTime::parse_from_rfc2822(&dedashed) {
        return Some(dt.timestamp() as f64);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_epoch_and_dates() {
        assert_eq!(parse_expiry("1700000000"), Some(1700000000.0));

        let rfc2822 = parse_expiry("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(rfc2822 as i64, 1445412480);

        let dashed = parse_expiry("Wed, 21-Oct-2015 07:28:00 GMT").unwrap();
        assert_eq!(dashed as i64, 1445412480);
    }

    #[test]
    fn test_unparsable_expiry_fails_open() {
        assert_eq!(parse_expiry("next tuesday"), None);
        assert_eq!(parse_expiry(""), None);

        let mut cookie = Cookie::new("sid", "abc", "example.com");
        cookie.expiration_date = parse_expiry("garbage");
        assert!(!cookie.is_expired());
    }

    #[test]
    fn test_expired_detection() {
        let mut cookie = Cookie::new("sid", "abc", "example.com");
        assert!(!cookie.is_expired());

        cookie.expiration_date = Some(Utc::now().timestamp() as f64 - 10.0);
        assert!(cookie.is_expired());
    }

    #[test]
    fn test_domain_normalized() {
        let cookie = Cookie::new("sid", "abc", ".Example.COM");
        assert_eq!(cookie.domain, "example.com");
    }
}
