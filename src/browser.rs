//! Headless Chrome page fetcher.
//!
//! Renders JavaScript before extraction and visits up to three contact pages.
//! When Chrome cannot be launched the plain HTTP fetcher takes over and the
//! outcome is tagged as a simple-scraper result.

use crate::error::{AppError, Result};
use crate::scraper::{
    FetchOutcome, FetchStrategy, FetchedPage, HttpFetcher, PageFetcher, find_contact_links,
};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::Html;
use std::ffi::OsStr;
use std::time::Duration;
use url::Url;

const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

fn hide_webdriver_command() -> Page::AddScriptToEvaluateOnNewDocument {
    Page::AddScriptToEvaluateOnNewDocument {
        source: HIDE_WEBDRIVER_SCRIPT.to_string(),
        world_name: None,
        include_command_line_api: None,
        run_immediately: None,
    }
}

/// Pause between contact page visits.
const CONTACT_PAGE_DELAY: Duration = Duration::from_secs(1);

pub struct BrowserFetcher {
    user_agent: String,
    page_timeout: Duration,
    max_contact_pages: usize,
    fallback: HttpFetcher,
}

impl BrowserFetcher {
    pub fn new(
        user_agent: String,
        page_timeout: Duration,
        max_contact_pages: usize,
        fallback: HttpFetcher,
    ) -> Self {
        Self {
            user_agent,
            page_timeout,
            max_contact_pages,
            fallback: fallback.as_fallback(),
        }
    }
}

fn launch_browser() -> Result<Browser> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .window_size(Some((1920, 1080)))
        .idle_browser_timeout(Duration::from_secs(120))
        .args(vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--ignore-certificate-errors"),
        ])
        .build()
        .map_err(|e| AppError::Browser(format!("Failed to build Chrome launch options: {}", e)))?;
    Browser::new(options)
        .map_err(|e| AppError::Browser(format!("Failed to launch headless Chrome: {}", e)))
}

fn load_page(tab: &Tab, url: &Url) -> Result<FetchedPage> {
    tab.navigate_to(url.as_str())
        .map_err(|e| AppError::Browser(format!("Navigation to {} failed: {}", url, e)))?;
    tab.wait_until_navigated()
        .map_err(|e| AppError::Browser(format!("Page load failed for {}: {}", url, e)))?;
    tab.wait_for_element("body")
        .map_err(|e| AppError::Browser(format!("No body on {}: {}", url, e)))?;

    let html = tab
        .get_content()
        .map_err(|e| AppError::Browser(format!("Failed to read content of {}: {}", url, e)))?;
    let final_url = Url::parse(&tab.get_url()).unwrap_or_else(|_| url.clone());
    Ok(FetchedPage {
        url: final_url,
        html,
    })
}

/// Result of one blocking browser session.
enum BrowserRun {
    Fetched(Result<FetchOutcome>),
    LaunchFailed(AppError),
}

fn fetch_blocking(
    url: Url,
    user_agent: String,
    page_timeout: Duration,
    max_contact_pages: usize,
) -> BrowserRun {
    let browser = match launch_browser() {
        Ok(browser) => browser,
        Err(e) => return BrowserRun::LaunchFailed(e),
    };
    BrowserRun::Fetched(fetch_with_browser(
        &browser,
        &url,
        &user_agent,
        page_timeout,
        max_contact_pages,
    ))
}

fn fetch_with_browser(
    browser: &Browser,
    url: &Url,
    user_agent: &str,
    page_timeout: Duration,
    max_contact_pages: usize,
) -> Result<FetchOutcome> {
    let tab = browser
        .new_tab()
        .map_err(|e| AppError::Browser(format!("Failed to create tab: {}", e)))?;
    tab.set_default_timeout(page_timeout);
    tab.set_user_agent(user_agent, None, None)
        .map_err(|e| AppError::Browser(format!("Failed to set user agent: {}", e)))?;
    // Runs before any page script on every navigation of this tab.
    if let Err(e) = tab.call_method(hide_webdriver_command()) {
        tracing::debug!(target: "scrape_task", "Could not mask webdriver flag for {}: {}", url, e);
    }

    let primary = load_page(&tab, url)?;
    let candidates = {
        let document = Html::parse_document(&primary.html);
        find_contact_links(&document, &primary.url)
    };

    let mut contact_pages = Vec::new();
    for contact_url in candidates.into_iter().take(max_contact_pages) {
        tracing::info!(target: "scrape_task", "Found contact page: {}", contact_url);
        match load_page(&tab, &contact_url) {
            Ok(page) => contact_pages.push(page),
            Err(e) => {
                tracing::warn!(target: "scrape_task", "Error visiting contact page {}: {}", contact_url, e);
            }
        }
        std::thread::sleep(CONTACT_PAGE_DELAY);
    }

    Ok(FetchOutcome {
        primary,
        contact_pages,
        strategy: FetchStrategy::Primary,
    })
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
        let target = url.clone();
        let user_agent = self.user_agent.clone();
        let page_timeout = self.page_timeout;
        let max_contact_pages = self.max_contact_pages;

        // headless_chrome is blocking
        let run = tokio::task::spawn_blocking(move || {
            fetch_blocking(target, user_agent, page_timeout, max_contact_pages)
        })
        .await
        .map_err(|e| AppError::Task(format!("Browser task failed: {}", e)))?;

        match run {
            BrowserRun::Fetched(outcome) => outcome,
            BrowserRun::LaunchFailed(e) => {
                tracing::warn!(target: "scrape_task", "{}; using simple scraper for {}", e, url);
                self.fallback.fetch(url).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
