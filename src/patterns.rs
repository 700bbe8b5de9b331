//! Plain pattern extractors for emails, phone numbers and social profile links.

use crate::models::SocialPlatform;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

pub(crate) static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
        .expect("Failed to compile email regex pattern. This should not happen.")
});

static INTERNATIONAL_PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+[0-9]{1,3}[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}")
        .expect("invalid international phone regex")
});

static US_PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}").expect("invalid US phone regex")
});

static SOCIAL_PATTERNS: Lazy<Vec<(SocialPlatform, Regex)>> = Lazy::new(|| {
    let patterns = [
        (
            SocialPlatform::Linkedin,
            r"(?:https?://)?(?:www\.)?\blinkedin\.com/(?:in|company)/[a-zA-Z0-9_-]+/?",
        ),
        (
            SocialPlatform::Twitter,
            r"(?:https?://)?(?:www\.)?\b(?:twitter\.com|x\.com)/[a-zA-Z0-9_-]+/?",
        ),
        (
            SocialPlatform::Facebook,
            r"(?:https?://)?(?:www\.)?\bfacebook\.com/(?:profile\.php\?id=\d+|[a-zA-Z0-9._-]+)/?",
        ),
        (
            SocialPlatform::Instagram,
            r"(?:https?://)?(?:www\.)?\binstagram\.com/[a-zA-Z0-9._-]+/?",
        ),
        (
            SocialPlatform::Youtube,
            r"(?:https?://)?(?:www\.)?\byoutube\.com/(?:channel|user)/[a-zA-Z0-9_-]+/?",
        ),
        (
            SocialPlatform::Github,
            r"(?:https?://)?(?:www\.)?\bgithub\.com/[a-zA-Z0-9_-]+/?",
        ),
    ];
    patterns
        .into_iter()
        .map(|(platform, pattern)| {
            let re = Regex::new(pattern).unwrap_or_else(|e| {
                panic!("Failed to compile {} regex: {}", platform.as_str(), e)
            });
            (platform, re)
        })
        .collect()
});

const PLACEHOLDER_DOMAINS: [&str; 3] = ["@example.", "@domain.", "@email."];

/// Lowercases a candidate email and drops placeholders and malformed sequences.
pub(crate) fn accept_email(candidate: &str) -> Option<String> {
    let email = candidate.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return None;
    }
    if PLACEHOLDER_DOMAINS.iter().any(|p| email.contains(p)) {
        return None;
    }
    if email.contains("..") || email.contains("@.") || email.contains(".@") {
        return None;
    }
    Some(email)
}

/// Finds plain `local@domain.tld` addresses in a block of text.
pub fn extract_emails(text: &str) -> BTreeSet<String> {
    EMAIL_RE
        .find_iter(text)
        .filter_map(|m| accept_email(m.as_str()))
        .collect()
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(char::is_ascii_digit).count()
}

/// Finds phone numbers with 10 to 15 digits, keeping the text as written.
pub fn extract_phones(text: &str) -> BTreeSet<String> {
    INTERNATIONAL_PHONE_RE
        .find_iter(text)
        .chain(US_PHONE_RE.find_iter(text))
        .map(|m| m.as_str().trim())
        .filter(|phone| (10..=15).contains(&digit_count(phone)))
        .map(str::to_string)
        .collect()
}

/// Finds the first profile link per social platform in raw HTML.
pub fn extract_social_media(html: &str) -> BTreeMap<SocialPlatform, String> {
    let mut profiles = BTreeMap::new();
    for (platform, re) in SOCIAL_PATTERNS.iter() {
        if let Some(m) = re.find(html) {
            let url = m.as_str();
            let url = if url.starts_with("http") {
                url.to_string()
            } else {
                format!("https://{}", url.trim_start_matches('/'))
            };
            profiles.insert(*platform, url);
        }
    }
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_emails_lowercases_and_dedupes() {
        let text = "Write to Sales@Acme.io or sales@acme.io, and support@help.acme.co.uk.";
        let emails = extract_emails(text);
        assert_eq!(
            emails.into_iter().collect::<Vec<_>>(),
            vec!["sales@acme.io", "support@help.acme.co.uk"]
        );
    }

    #[test]
    fn test_extract_emails_rejects_placeholders() {
        let text = "you@example.com user@domain.com me@email.net real@acme.io";
        let emails = extract_emails(text);
        assert_eq!(emails.len(), 1);
        assert!(emails.contains("real@acme.io"));
    }

    #[test]
    fn test_accept_email_rejects_malformed() {
        assert_eq!(accept_email("a..b@acme.io"), None);
        assert_eq!(accept_email("ab.@acme.io"), None);
        assert_eq!(accept_email("ab@.acme.io"), None);
        assert_eq!(accept_email("no-at-sign"), None);
        assert_eq!(accept_email(" Bob@Acme.IO "), Some("bob@acme.io".to_string()));
    }

    #[test]
    fn test_extract_emails_requires_tld() {
        assert!(extract_emails("user@localhost is not routable").is_empty());
    }

    #[test]
    fn test_extract_phones_keeps_original_form() {
        let phones = extract_phones("Call (555) 123-4567 today");
        assert!(phones.contains("(555) 123-4567"));
        for phone in &phones {
            let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
            assert!((10..=15).contains(&digits));
        }
    }

    #[test]
    fn test_extract_phones_international() {
        let phones = extract_phones("Office: +44 207-946-0958");
        assert!(phones.contains("+44 207-946-0958"));
    }

    #[test]
    fn test_extract_phones_ignores_short_numbers() {
        assert!(extract_phones("Room 555-1234, zip 90210").is_empty());
    }

    #[test]
    fn test_extract_phones_only_ascii_digits() {
        assert!(extract_phones("هاتف ٥٥٥-١٢٣-٤٥٦٧").is_empty());
        assert!(extract_phones("電話 ５５５-１２３-４５６７").is_empty());
        assert!(extract_phones("555-123-٤٥٦٧").is_empty());
        assert!(extract_phones("tel 555-123-4567").contains("555-123-4567"));
    }

    #[test]
    fn test_extract_social_media_first_match_wins() {
        let html = r#"
            <a href="https://www.linkedin.com/company/acme">in</a>
            <a href="https://linkedin.com/in/someone-else">in</a>
            <a href="//twitter.com/acme">tw</a>
            <a href="https://github.com/acme-labs">gh</a>
        "#;
        let social = extract_social_media(html);
        assert_eq!(
            social.get(&SocialPlatform::Linkedin).map(String::as_str),
            Some("https://www.linkedin.com/company/acme")
        );
        assert_eq!(
            social.get(&SocialPlatform::Twitter).map(String::as_str),
            Some("https://twitter.com/acme")
        );
        assert_eq!(
            social.get(&SocialPlatform::Github).map(String::as_str),
            Some("https://github.com/acme-labs")
        );
        assert!(!social.contains_key(&SocialPlatform::Facebook));
    }

    #[test]
    fn test_extract_social_media_ignores_lookalike_hosts() {
        let social = extract_social_media(r#"<a href="https://dropbox.com/files">files</a>"#);
        assert!(social.is_empty());
    }
}
