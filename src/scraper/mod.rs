pub mod boj;
pub mod leetcode;
pub mod programmers;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{PlatformId, Problem, ProblemReference, ScrapeOutcome};
use crate::transport::{check_status, HttpResponse, Transport};

pub use boj::BojScraper;
pub use leetcode::LeetCodeScraper;
pub use programmers::ProgrammersScraper;

/// Headers sent with every HTML page request.
pub(crate) const HTML_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"),
];

/// Fetches one problem from one platform. `fetch` never returns an error:
/// every failure is folded into the outcome.
#[async_trait]
pub trait Scraper: Send + Sync {
    fn platform(&self) -> PlatformId;

    async fn fetch(&self, reference: &ProblemReference) -> ScrapeOutcome;
}

/// Fold a scrape result into an outcome. A problem without a title is a
/// parse failure.
pub(crate) fn into_outcome(result: ScrapeResult<Problem>) -> ScrapeOutcome {
    match result {
        Ok(problem) if problem.title.trim().is_empty() => ScrapeOutcome::Failure {
            failure: ScrapeError::Parse("problem title is empty".into()).into_failure(),
        },
        Ok(problem) => ScrapeOutcome::Success { problem },
        Err(e) => ScrapeOutcome::Failure {
            failure: e.into_failure(),
        },
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of retries.
/// Only transient network errors are retried.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> ScrapeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ScrapeResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let backoff = policy.backoff(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}, backing off {:.1}s",
                    label,
                    attempt + 1,
                    policy.max_retries,
                    e,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// GET a page with retries and map its status onto the error taxonomy.
pub(crate) async fn get_page(
    transport: &dyn Transport,
    policy: &RetryPolicy,
    url: &str,
    headers: &[(&str, &str)],
) -> ScrapeResult<HttpResponse> {
    with_retry(policy, url, || async move {
        let response = transport.get(url, headers).await?;
        check_status(response)
    })
    .await
}

/// Platform → scraper table, built once and read-only afterwards.
#[derive(Clone, Default)]
pub struct ScraperFactory {
    scrapers: HashMap<PlatformId, Arc<dyn Scraper>>,
}

impl ScraperFactory {
    /// Factory with the three built-in scrapers sharing one transport.
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        ScraperFactory::default()
            .with_scraper(Arc::new(BojScraper::new(transport.clone(), retry)))
            .with_scraper(Arc::new(LeetCodeScraper::new(transport.clone(), retry)))
            .with_scraper(Arc::new(ProgrammersScraper::new(transport, retry)))
    }

    /// Register (or replace) the scraper for its platform. `Unknown` is never
    /// registered.
    pub fn with_scraper(mut self, scraper: Arc<dyn Scraper>) -> Self {
        let platform = scraper.platform();
        if platform == PlatformId::Unknown {
            debug!("ignoring scraper registered for Unknown platform");
            return self;
        }
        self.scrapers.insert(platform, scraper);
        self
    }

    pub fn create(&self, platform: PlatformId) -> Option<Arc<dyn Scraper>> {
        self.scrapers.get(&platform).cloned()
    }

    pub fn platforms(&self) -> Vec<PlatformId> {
        let mut platforms: Vec<PlatformId> = self.scrapers.keys().copied().collect();
        platforms.sort_by_key(|p| p.as_str());
        platforms
    }
}
