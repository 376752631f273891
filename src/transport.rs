use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::config::ScrapeConfig;
use crate::error::{ScrapeError, ScrapeResult};

/// Response from a GET or POST.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Outbound HTTP used by every scraper. Implementations must bound each call
/// with a timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> ScrapeResult<HttpResponse>;

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
    ) -> ScrapeResult<HttpResponse>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ScrapeConfig) -> ScrapeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    async fn finish(response: reqwest::Response) -> ScrapeResult<HttpResponse> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;
        debug!(url = %url, status, bytes = body.len(), "response received");
        Ok(HttpResponse { url, status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> ScrapeResult<HttpResponse> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let response = req.send().await?;
        Self::finish(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
    ) -> ScrapeResult<HttpResponse> {
        let mut req = self.client.post(url).json(body);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let response = req.send().await?;
        Self::finish(response).await
    }
}

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static CHALLENGE_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](?:https?://[^"'/]+)?/cdn-cgi/challenge-platform/"#).unwrap()
});

/// Page titles of anti-bot interstitials served with a 200.
const BLOCK_TITLES: &[&str] = &[
    "Just a moment...",
    "Attention Required! | Cloudflare",
    "자동화된 접근",
];

/// Interstitial detection. Only the `<title>` and challenge script URLs
/// count; statement text quoting a marker does not.
pub fn looks_blocked(body: &str) -> bool {
    // Real problem pages are large; interstitials are small.
    if body.len() >= 64 * 1024 {
        return false;
    }
    let blocked_title = TITLE_RE
        .captures(body)
        .map(|caps| {
            let title = caps[1].trim();
            BLOCK_TITLES.iter().any(|m| title.contains(m))
        })
        .unwrap_or(false);
    blocked_title || CHALLENGE_SCRIPT_RE.is_match(body)
}

/// Map a response to the scrape error taxonomy. 2xx passes through.
pub fn check_status(response: HttpResponse) -> ScrapeResult<HttpResponse> {
    let status = response.status;
    let url = response.url.as_str();
    match status {
        200..=299 if looks_blocked(&response.body) => Err(ScrapeError::Blocked(format!(
            "block page served for {}",
            url
        ))),
        200..=299 => Ok(response),
        404 | 410 => Err(ScrapeError::NotFound(format!("HTTP {} for {}", status, url))),
        403 | 451 => Err(ScrapeError::Blocked(format!("HTTP {} for {}", status, url))),
        429 | 500..=599 => Err(ScrapeError::transient(format!("HTTP {} for {}", status, url))),
        _ => Err(ScrapeError::permanent(format!("HTTP {} for {}", status, url))),
    }
}
