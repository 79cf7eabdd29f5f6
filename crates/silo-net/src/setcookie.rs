//! Set-Cookie parsing

use chrono::Utc;

use silo_cookies::{parse_expiry, Cookie, CookieError, SameSite};

/// Parse one Set-Cookie header value. A missing Domain attribute defaults
/// to the response host. Max-Age takes precedence over Expires; an
/// unparsable Expires fails open (non-expiring).
pub fn parse_set_cookie(raw: &str, response_host: &str) -> Result<Cookie, CookieError> {
    let mut parts = raw.split(';');

    let pair = parts
        .next()
        .ok_or_else(|| CookieError::Malformed(raw.to_string()))?;
    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| CookieError::Malformed(pair.to_string()))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(CookieError::EmptyName);
    }

    let mut cookie = Cookie::new(name, value.trim(), response_host);
    let mut max_age: Option<f64> = None;
    let mut expires: Option<f64> = None;

    for attr in parts {
        let attr = attr.trim();
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim()),
            None => (attr.to_ascii_lowercase(), ""),
        };

        match key.as_str() {
            "domain" if !val.is_empty() => {
                cookie.domain = val.trim_start_matches('.').to_lowercase();
            }
            "path" if !val.is_empty() => cookie.path = val.to_string(),
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            "samesite" => {
                cookie.same_site = match val.to_ascii_lowercase().as_str() {
                    "strict" => Some(SameSite::Strict),
                    "lax" => Some(SameSite::Lax),
                    "none" => Some(SameSite::None),
                    _ => None,
                };
            }
            "max-age" => {
                if let Ok(secs) = val.parse::<f64>() {
                    max_age = Some(Utc::now().timestamp() as f64 + secs);
                }
            }
            "expires" => expires = parse_expiry(val),
            _ => {}
        }
    }

    cookie.expiration_date = max_age.or(expires);

    Ok(cookie)
}
