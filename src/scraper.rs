//! Page fetching: the primary page of a target plus its contact/about pages.

use crate::domain::same_site;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use std::time::{Duration, Instant};
use url::Url;

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Keywords that mark a link as leading to a contact or about page.
pub const CONTACT_KEYWORDS: [&str; 6] = [
    "contact",
    "about",
    "kontakt",
    "contacto",
    "get in touch",
    "support",
];

/// Raw HTML of one fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub html: String,
}

/// How the pages of a target were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// The fetcher that was configured.
    Primary,
    /// The plain HTTP fallback used when the configured fetcher was unavailable.
    SimpleFallback,
}

/// Everything fetched for one target.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub primary: FetchedPage,
    /// Contact/about pages that were fetched successfully, in visiting order.
    pub contact_pages: Vec<FetchedPage>,
    pub strategy: FetchStrategy,
}

/// Produces the primary page and contact pages for a target URL.
///
/// A failure of the primary page is an error; contact page failures are not.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchOutcome>;

    fn name(&self) -> &'static str;
}

/// Elements whose boundaries separate words in rendered text.
const BLOCK_ELEMENTS: [&str; 34] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "option", "p", "pre", "section", "table", "td", "th", "tr",
];

/// Nesting below this depth is flattened without block separators.
const MAX_TEXT_DEPTH: usize = 256;

/// Collects the text of a document.
///
/// Text nodes are joined as they appear in the markup, so inline elements
/// (`<span>`, `<b>`, `<a>`) do not split words; block-level element
/// boundaries become a single space.
pub fn page_text(document: &Html) -> String {
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());
    let mut text_content = String::new();
    collect_text(root, 0, &mut text_content);
    text_content
}

fn collect_text(element: ElementRef<'_>, depth: usize, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&el.name());
                if block {
                    out.push(' ');
                }
                if depth >= MAX_TEXT_DEPTH {
                    out.extend(child_ref.text());
                } else {
                    collect_text(child_ref, depth + 1, out);
                }
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Finds same-site links whose text or href mentions a contact keyword.
///
/// Links are returned in document order without duplicates, and never include
/// the page itself.
pub fn find_contact_links(document: &Html, page_url: &Url) -> Vec<Url> {
    let mut links: Vec<Url> = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let href_lower = href.to_lowercase();
        if href.is_empty()
            || href == "#"
            || href_lower.starts_with("javascript:")
            || href_lower.starts_with("mailto:")
            || href_lower.starts_with("tel:")
        {
            continue;
        }

        let link_text = element.text().collect::<String>().to_lowercase();
        let is_contact = CONTACT_KEYWORDS
            .iter()
            .any(|k| link_text.contains(k) || href_lower.contains(k));
        if !is_contact {
            continue;
        }

        let resolved = match page_url.join(href) {
            Ok(mut url) => {
                url.set_fragment(None);
                url
            }
            Err(e) => {
                tracing::debug!(target: "scrape_task", "Skipping unresolvable link '{}': {}", href, e);
                continue;
            }
        };
        if !matches!(resolved.scheme(), "http" | "https") || !same_site(&resolved, page_url) {
            continue;
        }
        if resolved.as_str() == page_url.as_str() || links.contains(&resolved) {
            continue;
        }
        links.push(resolved);
    }

    links
}

/// Fetches pages with a plain HTTP client.
pub struct HttpFetcher {
    client: Client,
    primary_timeout: Duration,
    contact_timeout: Duration,
    max_contact_pages: usize,
    strategy: FetchStrategy,
}

impl HttpFetcher {
    pub fn new(
        client: Client,
        primary_timeout: Duration,
        contact_timeout: Duration,
        max_contact_pages: usize,
    ) -> Self {
        Self {
            client,
            primary_timeout,
            contact_timeout,
            max_contact_pages,
            strategy: FetchStrategy::Primary,
        }
    }

    /// Marks every outcome of this fetcher as produced by the simple fallback.
    pub fn as_fallback(mut self) -> Self {
        self.strategy = FetchStrategy::SimpleFallback;
        self
    }

    async fn get_page(&self, url: &Url, timeout: Duration) -> Result<FetchedPage> {
        tracing::debug!(target: "scrape_task", "Attempting to GET: {}", url);
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(target: "scrape_task", "GET {} status: {}", url, status);
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let final_url = response.url().clone();
        let html = response.text().await?;
        Ok(FetchedPage {
            url: final_url,
            html,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
        let start_time = Instant::now();
        let primary = self.get_page(url, self.primary_timeout).await?;

        let candidates = {
            let document = Html::parse_document(&primary.html);
            find_contact_links(&document, &primary.url)
        };

        let mut contact_pages = Vec::new();
        for contact_url in candidates.into_iter().take(self.max_contact_pages) {
            tracing::info!(target: "scrape_task", "Visiting contact page: {}", contact_url);
            match self.get_page(&contact_url, self.contact_timeout).await {
                Ok(page) => contact_pages.push(page),
                Err(e) => {
                    tracing::warn!(target: "scrape_task", "Error visiting contact page {}: {}", contact_url, e);
                }
            }
        }

        tracing::debug!(
            target: "scrape_task",
            "Fetched {} plus {} contact page(s) in {:.2?}",
            url,
            contact_pages.len(),
            start_time.elapsed()
        );

        Ok(FetchOutcome {
            primary,
            contact_pages,
            strategy: self.strategy,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
