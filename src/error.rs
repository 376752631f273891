use thiserror::Error;

use crate::model::{BatchResult, Failure, FailureReason};

/// Errors raised inside a single scrape. Every one of them is converted into
/// a [`Failure`] before it leaves the scraper.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("{message}")]
    Network { message: String, transient: bool },
    #[error("{0}")]
    Blocked(String),
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    NotFound(String),
}

impl ScrapeError {
    /// Timeouts, resets, 5xx and 429.
    pub fn transient(message: impl Into<String>) -> Self {
        ScrapeError::Network {
            message: message.into(),
            transient: true,
        }
    }

    /// 4xx responses that retrying will not fix.
    pub fn permanent(message: impl Into<String>) -> Self {
        ScrapeError::Network {
            message: message.into(),
            transient: false,
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            ScrapeError::Network { .. } => FailureReason::NetworkError,
            ScrapeError::Blocked(_) => FailureReason::Blocked,
            ScrapeError::Parse(_) => FailureReason::ParseError,
            ScrapeError::NotFound(_) => FailureReason::NotFound,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ScrapeError::Network { transient: true, .. })
    }

    pub fn into_failure(self) -> Failure {
        let reason = self.reason();
        Failure::new(reason, self.to_string())
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScrapeError::transient(format!("request timed out: {}", e))
        } else if e.is_decode() || e.is_body() {
            ScrapeError::Parse(format!("unreadable response body: {}", e))
        } else if e.is_builder() {
            ScrapeError::permanent(format!("invalid request: {}", e))
        } else {
            ScrapeError::transient(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(e: serde_json::Error) -> Self {
        ScrapeError::Parse(format!("invalid JSON: {}", e))
    }
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A batch stopped by its cancellation token or deadline. `partial` holds
/// the files that finished, in input order.
#[derive(Debug, Error)]
#[error("batch cancelled after {} of {total} files", .partial.len())]
pub struct BatchCancelled {
    pub partial: BatchResult,
    pub total: usize,
}

/// Failures reported by the review collaborators.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("review agent failed: {0}")]
    Agent(String),
    #[error("posting comment failed: {0}")]
    Comment(String),
}
