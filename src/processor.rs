//! Runs a list of targets through the harvester with a bounded worker pool.

use crate::domain::{host_of_raw, with_scheme};
use crate::harvester::Harvester;
use crate::models::{ExtractionResult, ScrapeTarget};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Scrapes every target, at most `workers` at a time, handing each result to
/// `on_result` as soon as it is ready.
///
/// With one worker the targets are processed sequentially in input order.
/// Every target yields exactly one result: a task that panics or is cancelled
/// becomes an error row for its URL and the rest of the batch carries on.
pub async fn scrape_all<F>(
    harvester: Arc<Harvester>,
    targets: Vec<ScrapeTarget>,
    workers: usize,
    mut on_result: F,
) where
    F: FnMut(ExtractionResult),
{
    let workers = workers.max(1);
    tracing::debug!(target: "job_task", "Scraping {} targets with {} workers", targets.len(), workers);

    let mut results = stream::iter(targets.into_iter().map(|target| {
        let harvester = Arc::clone(&harvester);
        let raw = target.as_str().to_string();
        let handle = tokio::spawn(async move { harvester.scrape_url(&target).await });
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(target: "job_task", "Scrape task for {} failed: {}", raw, e);
                    ExtractionResult::failed(
                        with_scheme(&raw),
                        host_of_raw(&raw),
                        format!("Scrape task failed: {}", e),
                    )
                }
            }
        }
    }))
    .buffer_unordered(workers);

    while let Some(result) = results.next().await {
        on_result(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::scraper::{FetchOutcome, FetchStrategy, FetchedPage, PageFetcher};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct CountingFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(FetchOutcome {
                primary: FetchedPage {
                    url: url.clone(),
                    html: format!("<body>info@{}</body>", url.host_str().unwrap_or("x.io")),
                },
                contact_pages: Vec::new(),
                strategy: FetchStrategy::Primary,
            })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    /// Panics for `bad.io`, serves a one-email page for everything else.
    struct PanickingFetcher;

    #[async_trait]
    impl PageFetcher for PanickingFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchOutcome> {
            if url.host_str() == Some("bad.io") {
                panic!("fetcher exploded");
            }
            Ok(FetchOutcome {
                primary: FetchedPage {
                    url: url.clone(),
                    html: "<body>info@acme.io</body>".to_string(),
                },
                contact_pages: Vec::new(),
                strategy: FetchStrategy::Primary,
            })
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    fn targets(n: usize) -> Vec<ScrapeTarget> {
        (0..n).map(|i| ScrapeTarget::new(format!("site{}.io", i))).collect()
    }

    #[tokio::test]
    async fn test_worker_pool_is_bounded() {
        let fetcher = Arc::new(CountingFetcher {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let harvester = Arc::new(Harvester::with_fetcher(fetcher.clone()));

        let mut collected = Vec::new();
        scrape_all(harvester, targets(12), 3, |r| collected.push(r)).await;

        assert_eq!(collected.len(), 12);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_single_worker_keeps_input_order() {
        let fetcher = Arc::new(CountingFetcher {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let harvester = Arc::new(Harvester::with_fetcher(fetcher));

        let mut urls = Vec::new();
        scrape_all(harvester, targets(4), 1, |r| urls.push(r.url)).await;
        assert_eq!(
            urls,
            vec![
                "https://site0.io",
                "https://site1.io",
                "https://site2.io",
                "https://site3.io"
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_task_becomes_error_row() {
        let harvester = Arc::new(Harvester::with_fetcher(Arc::new(PanickingFetcher)));
        let targets: Vec<ScrapeTarget> = ["a.io", "bad.io", "c.io", "d.io"]
            .into_iter()
            .map(ScrapeTarget::new)
            .collect();

        let mut collected = Vec::new();
        scrape_all(harvester, targets, 1, |r| collected.push(r)).await;

        assert_eq!(collected.len(), 4);
        let failed: Vec<&ExtractionResult> =
            collected.iter().filter(|r| !r.status.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].url, "https://bad.io");
        assert_eq!(failed[0].domain, "bad.io");
        assert!(failed[0].status.to_string().starts_with("Error"));
        assert_eq!(collected[3].url, "https://d.io");
        assert_eq!(collected[3].emails, vec!["info@acme.io"]);
    }
}
