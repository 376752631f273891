//! In-memory transport for tests.
//!
//! Replies are queued per URL; the last queued reply repeats once the queue
//! is down to one, so a single `reply` answers every call. Every call is
//! recorded for verification.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ScrapeError, ScrapeResult};
use crate::transport::{HttpResponse, Transport};

/// Canned answer for one call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response { status: u16, body: String },
    /// Connection-level failure, surfaced as a transient network error.
    Unreachable(String),
    /// Panics inside the transport call.
    Panic,
}

impl MockReply {
    pub fn ok(body: impl Into<String>) -> Self {
        MockReply::Response {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        MockReply::Response {
            status,
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<MockReply>,
    delay: Duration,
}

/// POST replies are keyed by URL plus a needle that must occur in the
/// serialized request body, so one GraphQL endpoint can serve many slugs.
type ScriptKey = (String, Option<String>);

#[derive(Default, Clone)]
pub struct MockTransport {
    scripts: Arc<RwLock<HashMap<ScriptKey, Script>>>,
    calls: Arc<RwLock<Vec<MockCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for GETs of `url`.
    pub fn reply(self, url: &str, reply: MockReply) -> Self {
        self.push((url.to_string(), None), reply);
        self
    }

    /// Queue a reply for POSTs to `url` whose body contains `needle`.
    pub fn reply_post(self, url: &str, needle: &str, reply: MockReply) -> Self {
        self.push((url.to_string(), Some(needle.to_string())), reply);
        self
    }

    /// Delay every call to `url` (GET) by `delay` before answering.
    pub fn delay(self, url: &str, delay: Duration) -> Self {
        self.set_delay((url.to_string(), None), delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls (either method) made to `url`.
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.read().unwrap().iter().filter(|c| c.url == url).count()
    }

    fn push(&self, key: ScriptKey, reply: MockReply) {
        let mut scripts = self.scripts.write().unwrap();
        scripts.entry(key).or_default().replies.push_back(reply);
    }

    fn set_delay(&self, key: ScriptKey, delay: Duration) {
        let mut scripts = self.scripts.write().unwrap();
        scripts.entry(key).or_default().delay = delay;
    }

    fn record(&self, method: Method, url: &str, body: Option<&serde_json::Value>, headers: &[(&str, &str)]) {
        self.calls.write().unwrap().push(MockCall {
            method,
            url: url.to_string(),
            body: body.cloned(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }

    /// Pop the next reply for the first matching script. Unscripted calls get
    /// a 404.
    fn next_reply(&self, url: &str, body: Option<&str>) -> (Option<MockReply>, Duration) {
        let mut scripts = self.scripts.write().unwrap();
        let key = scripts
            .keys()
            .find(|(u, needle)| {
                u == url
                    && match (needle, body) {
                        (None, None) => true,
                        (Some(n), Some(b)) => b.contains(n.as_str()),
                        _ => false,
                    }
            })
            .cloned();
        let Some(key) = key else {
            return (None, Duration::ZERO);
        };
        let script = scripts.get_mut(&key).unwrap();
        let reply = if script.replies.len() > 1 {
            script.replies.pop_front()
        } else {
            script.replies.front().cloned()
        };
        (reply, script.delay)
    }

    async fn answer(&self, url: &str, body: Option<&str>) -> ScrapeResult<HttpResponse> {
        let (reply, delay) = self.next_reply(url, body);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Some(MockReply::Response { status, body }) => Ok(HttpResponse {
                url: url.to_string(),
                status,
                body,
            }),
            Some(MockReply::Unreachable(message)) => Err(ScrapeError::transient(message)),
            Some(MockReply::Panic) => panic!("mock transport panicked on {}", url),
            None => Ok(HttpResponse {
                url: url.to_string(),
                status: 404,
                body: String::new(),
            }),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> ScrapeResult<HttpResponse> {
        self.record(Method::Get, url, None, headers);
        self.answer(url, None).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
    ) -> ScrapeResult<HttpResponse> {
        self.record(Method::Post, url, Some(body), headers);
        let serialized = body.to_string();
        self.answer(url, Some(&serialized)).await
    }
}
