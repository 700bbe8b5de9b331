//! Single-URL scrape orchestration: fetch, extract, decode, merge.

use crate::config::{Config, FetcherKind};
use crate::decoders::decode_hidden_emails;
use crate::domain::{host_of, host_of_raw, normalize_url, with_scheme};
use crate::error::{AppError, Result};
use crate::models::{ExtractionResult, ScrapeStatus, ScrapeTarget, SocialPlatform};
use crate::patterns::{extract_emails, extract_phones, extract_social_media};
use crate::scraper::{FetchStrategy, FetchedPage, HttpFetcher, PageFetcher, page_text};
use reqwest::Client;
use scraper::Html;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Contacts found on a single page.
#[derive(Debug, Default)]
struct PageContacts {
    emails: BTreeSet<String>,
    phones: BTreeSet<String>,
    social_media: BTreeMap<SocialPlatform, String>,
}

impl PageContacts {
    /// Later pages win for social links; emails and phones are unioned.
    fn merge(&mut self, other: PageContacts) {
        self.emails.extend(other.emails);
        self.phones.extend(other.phones);
        self.social_media.extend(other.social_media);
    }
}

/// Runs every extractor and decoder over one page.
fn extract_page(page: &FetchedPage) -> PageContacts {
    let document = Html::parse_document(&page.html);
    let text = page_text(&document);

    let mut emails = extract_emails(&text);
    emails.extend(decode_hidden_emails(&page.html, &text, &document));

    PageContacts {
        emails,
        phones: extract_phones(&text),
        social_media: extract_social_media(&page.html),
    }
}

/// Turns a target URL into exactly one [`ExtractionResult`].
#[derive(Clone)]
pub struct Harvester {
    fetcher: Arc<dyn PageFetcher>,
}

impl Harvester {
    /// Creates a harvester with a shared HTTP client and the configured fetcher.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Generic(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        let http = HttpFetcher::new(
            client,
            config.request_timeout,
            config.contact_page_timeout,
            config.contact_page_limit(),
        );

        let fetcher: Arc<dyn PageFetcher> = match config.fetcher {
            FetcherKind::Http => Arc::new(http),
            #[cfg(feature = "browser")]
            FetcherKind::Browser => Arc::new(crate::browser::BrowserFetcher::new(
                config.user_agent.clone(),
                config.request_timeout,
                config.contact_page_limit(),
                http,
            )),
            #[cfg(not(feature = "browser"))]
            FetcherKind::Browser => {
                tracing::warn!(
                    "Browser fetcher requested but the `browser` feature is not enabled; using the simple scraper"
                );
                Arc::new(http.as_fallback())
            }
        };
        tracing::info!("Using {} page fetcher", fetcher.name());

        Ok(Self { fetcher })
    }

    pub fn with_fetcher(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Scrapes one target. Never fails: problems end up in the result status.
    pub async fn scrape_url(&self, target: &ScrapeTarget) -> ExtractionResult {
        let raw = target.as_str();
        tracing::info!(target: "scrape_task", "Scraping {}", raw);

        let url = match normalize_url(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(target: "scrape_task", "Invalid URL '{}': {}", raw, e);
                return ExtractionResult::failed(with_scheme(raw), host_of_raw(raw), e.to_string());
            }
        };
        let display_url = with_scheme(raw);
        let domain = host_of(&url);

        let outcome = match self.fetcher.fetch(&url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(target: "scrape_task", "Error scraping {}: {}", display_url, e);
                return ExtractionResult::failed(display_url, domain, e.to_string());
            }
        };

        let mut contacts = extract_page(&outcome.primary);
        for page in &outcome.contact_pages {
            contacts.merge(extract_page(page));
        }

        let status = match outcome.strategy {
            FetchStrategy::Primary => ScrapeStatus::Success,
            FetchStrategy::SimpleFallback => ScrapeStatus::SuccessSimple,
        };

        tracing::info!(target: "scrape_task",
            "Finished {}: {} emails, {} phones, {} social profiles",
            display_url,
            contacts.emails.len(),
            contacts.phones.len(),
            contacts.social_media.len()
        );

        ExtractionResult::success(
            display_url,
            domain,
            contacts.emails,
            contacts.phones,
            contacts.social_media,
            status,
        )
    }
}
