pub mod config;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod platform;
pub mod review;
pub mod scraper;
pub mod testing;
pub mod transport;

pub use config::{RetryPolicy, ScrapeConfig, Settings};
pub use error::{BatchCancelled, ConfigError, ReviewError, ScrapeError};
pub use fallback::{DocumentSource, FallbackResolver, FsDocuments, MemoryDocuments};
pub use model::{
    BatchEntry, BatchResult, ChangedFile, Example, Failure, FailureReason, Language, PlatformId,
    Problem, ProblemReference, ScrapeOutcome,
};
pub use orchestrator::Orchestrator;
pub use review::{CommitCommenter, ReviewAgent, ReviewDecision};
pub use scraper::{Scraper, ScraperFactory};
pub use transport::{ReqwestTransport, Transport};
