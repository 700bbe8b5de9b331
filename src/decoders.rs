//! Decoders for email addresses that pages deliberately hide from scrapers.
//!
//! Every finder returns lowercase addresses that already passed the same
//! placeholder and structure checks as plain-text matches.

use crate::patterns::{EMAIL_RE, accept_email};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

static CLOUDFLARE_HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href="/cdn-cgi/l/email-protection#([a-z0-9]+)""#)
        .expect("invalid cloudflare href regex")
});

static CLOUDFLARE_DATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)data-cfemail="([a-z0-9]+)""#).expect("invalid cloudflare data regex")
});

static AT_DOT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)([a-z0-9._%+-]+)\s*(?:\[at\]|@|[(\[{]at[)\]}]|&#64;|%40)\s*([a-z0-9.-]+)\s*(?:\[dot\]|\.|\(dot\)|&#46;|%2E)\s*([a-z]{2,})",
    )
    .expect("invalid at/dot regex")
});

static JS_CONCAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"document\.write\(['"]([a-zA-Z0-9._%+-]+)['"]\s*\+\s*['"]@['"]\s*\+\s*['"]([a-zA-Z0-9.-]+)\s*['"]\s*\+\s*['"]\.['"]\s*\+\s*['"]([a-zA-Z]{2,})['"]"#,
    )
    .expect("invalid js concatenation regex")
});

static ENCODED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)([a-z0-9._%+-]+)(?:&#0*64;|&#x0*40;|%40|\\u0*40|\\x40)([a-z0-9.-]+)(?:&#0*46;|&#x0*2e;|%2E|\\u0*2e|\\x2e)([a-z]{2,})",
    )
    .expect("invalid encoded email regex")
});

static CSS_SPLIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<span[^>]*data-user=["']([^"']+)["'][^>]*>.*?</span>.*?<span[^>]*data-domain=["']([^"']+)["'][^>]*>.*?</span>"#,
    )
    .expect("invalid css split regex")
});

static IMG_ALT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[alt]").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[title]").unwrap());
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Decodes a Cloudflare email-protection payload.
///
/// The payload is hex; the first byte is the XOR key for every following byte.
/// Returns `None` (and logs) when the hex is malformed.
pub fn decode_cloudflare_email(encoded: &str) -> Option<String> {
    if encoded.len() < 2 || encoded.len() % 2 != 0 {
        tracing::warn!("Failed to decode Cloudflare email '{}': odd or empty hex", encoded);
        return None;
    }
    let bytes: Result<Vec<u8>, _> = (0..encoded.len())
        .step_by(2)
        .map(|i| {
            encoded
                .get(i..i + 2)
                .ok_or(())
                .and_then(|pair| u8::from_str_radix(pair, 16).map_err(|_| ()))
        })
        .collect();
    let Ok(bytes) = bytes else {
        tracing::warn!("Failed to decode Cloudflare email '{}': invalid hex", encoded);
        return None;
    };

    let key = bytes[0];
    Some(bytes[1..].iter().map(|b| char::from(b ^ key)).collect())
}

/// Finds Cloudflare-protected addresses in raw HTML.
pub fn find_cloudflare_emails(html: &str) -> BTreeSet<String> {
    CLOUDFLARE_HREF_RE
        .captures_iter(html)
        .chain(CLOUDFLARE_DATA_RE.captures_iter(html))
        .filter_map(|caps| decode_cloudflare_email(&caps[1]))
        .filter(|decoded| decoded.contains('@'))
        .filter_map(|decoded| accept_email(&decoded))
        .collect()
}

fn join_three_parts(re: &Regex, haystack: &str) -> BTreeSet<String> {
    re.captures_iter(haystack)
        .filter_map(|caps| {
            let email = format!(
                "{}@{}.{}",
                caps[1].trim(),
                caps[2].trim(),
                caps[3].trim()
            );
            accept_email(&email)
        })
        .collect()
}

/// Finds `name [at] host [dot] tld` style addresses.
pub fn find_at_dot_emails(text: &str) -> BTreeSet<String> {
    join_three_parts(&AT_DOT_RE, text)
}

/// Finds addresses assembled with `document.write('a' + '@' + 'b' + '.' + 'c')`.
pub fn find_js_concat_emails(html: &str) -> BTreeSet<String> {
    join_three_parts(&JS_CONCAT_RE, html)
}

/// Finds addresses whose `@` and `.` are written as HTML entities, percent
/// escapes or JavaScript escapes.
pub fn find_encoded_emails(html: &str) -> BTreeSet<String> {
    join_three_parts(&ENCODED_RE, html)
}

/// Finds addresses split across `data-user` / `data-domain` span attributes.
pub fn find_css_split_emails(html: &str) -> BTreeSet<String> {
    CSS_SPLIT_RE
        .captures_iter(html)
        .filter_map(|caps| accept_email(&format!("{}@{}", &caps[1], &caps[2])))
        .collect()
}

/// Finds plain addresses hidden in `img alt` and `title` attributes.
pub fn find_attribute_emails(document: &Html) -> BTreeSet<String> {
    let alts = document
        .select(&IMG_ALT_SELECTOR)
        .filter_map(|el| el.value().attr("alt"));
    let titles = document
        .select(&TITLE_SELECTOR)
        .filter_map(|el| el.value().attr("title"));

    alts.chain(titles)
        .flat_map(|value| EMAIL_RE.find_iter(value))
        .filter_map(|m| accept_email(m.as_str()))
        .collect()
}

/// Harvests `mailto:` anchors, dropping any query string.
pub fn find_mailto_emails(document: &Html) -> BTreeSet<String> {
    let mut emails = BTreeSet::new();
    for element in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if !href.to_ascii_lowercase().starts_with("mailto:") {
            continue;
        }
        let email = href["mailto:".len()..]
            .split('?')
            .next()
            .unwrap_or("")
            .trim();
        if email.contains('@') && email.contains('.') {
            if let Some(email) = accept_email(email) {
                emails.insert(email);
            } else {
                tracing::debug!(target: "scrape_task", "Mailto content rejected: {}", email);
            }
        }
    }
    emails
}

/// Runs every decoder against one page and unions their findings.
pub fn decode_hidden_emails(html: &str, text: &str, document: &Html) -> BTreeSet<String> {
    let mut emails = BTreeSet::new();

    let cloudflare = find_cloudflare_emails(html);
    if !cloudflare.is_empty() {
        tracing::info!(target: "scrape_task", "Found {} Cloudflare protected emails", cloudflare.len());
    }
    emails.extend(cloudflare);

    emails.extend(find_at_dot_emails(text));
    emails.extend(find_js_concat_emails(html));
    emails.extend(find_encoded_emails(html));
    emails.extend(find_css_split_emails(html));

    let attributes = find_attribute_emails(document);
    if !attributes.is_empty() {
        tracing::info!(target: "scrape_task", "Found {} emails in image alt/title attributes", attributes.len());
    }
    emails.extend(attributes);

    let mailto = find_mailto_emails(document);
    if !mailto.is_empty() {
        tracing::info!(target: "scrape_task", "Found {} emails in mailto links", mailto.len());
    }
    emails.extend(mailto);

    emails
}
