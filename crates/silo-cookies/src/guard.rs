//! Domain containment validation
//!
//! Blocks cookie injection that declares an unrelated or overly broad
//! domain: a cookie domain is accepted only when the request host equals
//! it or is a strict subdomain of it, and a bare public suffix is never a
//! valid cookie domain, not even against itself.

use crate::cookie::normalize_domain;

/// Frequent multi-label public suffixes. No canonical list is wired in;
/// unknown two-label hosts fall back to the short-label heuristic below.
const TWO_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "net.uk", "com.au", "net.au", "org.au",
    "edu.au", "gov.au", "co.nz", "net.nz", "org.nz", "co.jp", "ne.jp", "or.jp", "ac.jp",
    "com.br", "net.br", "org.br", "com.cn", "net.cn", "org.cn", "com.mx", "com.ar", "com.tr",
    "co.in", "net.in", "org.in", "co.kr", "or.kr", "com.tw", "com.sg", "com.hk", "co.za",
    "org.za", "com.my", "co.th", "com.vn", "com.ph", "co.id",
];

pub struct DomainGuard;

impl DomainGuard {
    /// True iff `request_host` equals `cookie_domain` (leading dot
    /// stripped) or is a strict subdomain of it. A bare public suffix
    /// never validates, including against itself.
    pub fn validate(cookie_domain: &str, request_host: &str) -> bool {
        let domain = normalize_domain(cookie_domain);
        let host = normalize_domain(request_host);

        if domain.is_empty() || host.is_empty() {
            return false;
        }

        if Self::is_public_suffix(&domain) {
            return false;
        }

        host == domain || host.ends_with(&format!(".{domain}"))
    }

    /// Heuristic public-suffix check: any single label, the known
    /// two-label suffixes, and otherwise a two-label host whose first
    /// label is short enough to look like a registry prefix (co.*, ne.*).
    pub fn is_public_suffix(domain: &str) -> bool {
        let domain = normalize_domain(domain);
        let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();

        match labels.len() {
            0 | 1 => true,
            2 => {
                if TWO_LABEL_SUFFIXES.contains(&domain.as_str()) {
                    return true;
                }
                // Unrecognized two-label hosts are treated as registrable
                // domains unless they look like "co.xx" registry prefixes.
                labels[0].len() <= 2 && labels[1].len() == 2
            }
            _ => false,
        }
    }

    /// All stored-domain candidates a request host may see cookies from:
    /// the host itself plus each strict ancestor, stopping before a bare
    /// public suffix.
    pub fn ancestor_domains(request_host: &str) -> Vec<String> {
        let host = normalize_domain(request_host);
        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();

        let mut out = Vec::new();
        for i in 0..labels.len() {
            let candidate = labels[i..].join(".");
            if Self::is_public_suffix(&candidate) {
                break;
            }
            out.push(candidate);
        }
        out
    }
}
