//! Utility functions for handling domain names and URLs.

use crate::error::{AppError, Result};
use url::Url;

fn has_http_scheme(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Prefixes `https://` when the input carries no http(s) scheme.
pub fn with_scheme(raw: &str) -> String {
    let trimmed = raw.trim();
    if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    }
}

/// Parses the input website string into a valid Url object, adding a scheme if necessary.
pub fn normalize_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(AppError::Config("Website URL is empty".to_string()));
    }
    let url = Url::parse(&with_scheme(raw)).map_err(|e| {
        tracing::debug!("Failed to parse URL '{}': {}", raw, e);
        AppError::UrlParse(e)
    })?;
    if url.host_str().is_none() {
        return Err(AppError::UrlParse(url::ParseError::EmptyHost));
    }
    Ok(url)
}

/// Returns the lowercase host of a URL, or an empty string when it has none.
pub fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_lowercase()
}

/// Best-effort host for error results, when the input may not even parse.
pub fn host_of_raw(raw: &str) -> String {
    normalize_url(raw).map(|u| host_of(&u)).unwrap_or_default()
}

/// Two URLs belong to the same site when their hosts match, ignoring a leading `www.`.
pub fn same_site(a: &Url, b: &Url) -> bool {
    let strip = |u: &Url| {
        let host = host_of(u);
        host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
    };
    let (ha, hb) = (strip(a), strip(b));
    !ha.is_empty() && ha == hb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_scheme() {
        assert_eq!(with_scheme("example.org"), "https://example.org");
        assert_eq!(with_scheme("http://example.org"), "http://example.org");
        assert_eq!(with_scheme("HTTPS://Example.org"), "HTTPS://Example.org");
        assert_eq!(with_scheme("  acme.io/about "), "https://acme.io/about");
    }

    #[test]
    fn test_normalize_url() {
        let url = normalize_url("acme.io").unwrap();
        assert_eq!(url.as_str(), "https://acme.io/");
        assert_eq!(host_of(&url), "acme.io");

        let url = normalize_url("http://WWW.Acme.io:8080/contact?x=1").unwrap();
        assert_eq!(host_of(&url), "www.acme.io");
    }

    #[test]
    fn test_normalize_url_invalid() {
        assert!(normalize_url("").is_err());
        assert!(normalize_url("   ").is_err());
        assert!(normalize_url("http://").is_err());
        assert_eq!(host_of_raw("http://"), "");
    }

    #[test]
    fn test_same_site() {
        let a = Url::parse("https://www.acme.io/").unwrap();
        let b = Url::parse("http://acme.io/contact").unwrap();
        let c = Url::parse("https://facebook.com/acme").unwrap();
        assert!(same_site(&a, &b));
        assert!(!same_site(&a, &c));
    }
}
