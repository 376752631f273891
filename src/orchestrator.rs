use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ScrapeConfig;
use crate::error::BatchCancelled;
use crate::extract::extract;
use crate::fallback::{DocumentSource, FallbackResolver};
use crate::model::{BatchEntry, BatchResult, ChangedFile, FailureReason, ScrapeOutcome};
use crate::platform;
use crate::scraper::ScraperFactory;
use crate::transport::Transport;

const DEADLINE_DETAIL: &str = "batch deadline exceeded";

/// Per-file pipeline shared by every task of a batch.
struct Pipeline {
    factory: ScraperFactory,
    fallback: Option<FallbackResolver>,
}

impl Pipeline {
    /// extract → classify → scrape → (BOJ only) README fallback.
    async fn process(&self, file: &ChangedFile) -> ScrapeOutcome {
        let Some(url) = extract(&file.content, &file.path) else {
            debug!(file = %file.path, "no problem URL on the first line");
            return ScrapeOutcome::failure(
                FailureReason::UnsupportedPlatform,
                "no problem URL in a first-line comment",
            );
        };
        let Some(reference) = platform::reference(&url) else {
            debug!(file = %file.path, url = %url, "URL does not match any platform");
            return ScrapeOutcome::failure(
                FailureReason::UnsupportedPlatform,
                format!("{} is not a supported problem URL", url),
            );
        };
        let Some(scraper) = self.factory.create(reference.platform) else {
            return ScrapeOutcome::failure(
                FailureReason::UnsupportedPlatform,
                format!("no scraper registered for {}", reference.platform),
            );
        };

        info!(file = %file.path, platform = %reference.platform, problem = %reference.problem_id, "fetching problem");
        match scraper.fetch(&reference).await {
            ScrapeOutcome::Failure { failure }
                if FallbackResolver::applies(reference.platform, failure.reason) =>
            {
                match &self.fallback {
                    Some(resolver) => resolver.resolve(file, &reference, failure).await,
                    None => ScrapeOutcome::Failure { failure },
                }
            }
            outcome => outcome,
        }
    }
}

/// Runs the per-file pipeline over a commit's files with bounded
/// concurrency. One file's failure, or panic, never affects another.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    config: ScrapeConfig,
}

impl Orchestrator {
    pub fn new(factory: ScraperFactory, config: ScrapeConfig) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                factory,
                fallback: None,
            }),
            config,
        }
    }

    /// Orchestrator with the built-in scrapers on `transport` and, when
    /// `documents` is given, the README fallback.
    pub fn from_config(
        transport: Arc<dyn Transport>,
        documents: Option<Arc<dyn DocumentSource>>,
        config: ScrapeConfig,
    ) -> Self {
        let factory = ScraperFactory::new(transport, config.retry);
        let mut orchestrator = Self::new(factory, config);
        if let Some(documents) = documents {
            let resolver = FallbackResolver::new(documents, orchestrator.config.readme_name.clone());
            orchestrator = orchestrator.with_fallback(resolver);
        }
        orchestrator
    }

    pub fn with_fallback(self, resolver: FallbackResolver) -> Self {
        let factory = self.pipeline.factory.clone();
        Self {
            pipeline: Arc::new(Pipeline {
                factory,
                fallback: Some(resolver),
            }),
            config: self.config,
        }
    }

    /// Process every file. Always returns one entry per file in input
    /// order; files cut off by the batch deadline get a network failure.
    pub async fn run(&self, files: Vec<ChangedFile>) -> BatchResult {
        let slots = self.run_slots(&files, CancellationToken::new()).await;
        let entries = files
            .into_iter()
            .zip(slots)
            .map(|(file, slot)| BatchEntry {
                outcome: slot.unwrap_or_else(|| {
                    ScrapeOutcome::failure(FailureReason::NetworkError, DEADLINE_DETAIL)
                }),
                file,
            })
            .collect();
        BatchResult { entries }
    }

    /// Like [`run`](Self::run), but stops when `cancel` fires (or the
    /// deadline passes) and returns the finished files as an error.
    pub async fn run_cancellable(
        &self,
        files: Vec<ChangedFile>,
        cancel: CancellationToken,
    ) -> Result<BatchResult, BatchCancelled> {
        let total = files.len();
        let slots = self.run_slots(&files, cancel).await;
        let complete = slots.iter().all(Option::is_some);

        let entries: Vec<BatchEntry> = files
            .into_iter()
            .zip(slots)
            .filter_map(|(file, slot)| slot.map(|outcome| BatchEntry { file, outcome }))
            .collect();

        if complete {
            Ok(BatchResult { entries })
        } else {
            info!(finished = entries.len(), total, "batch cancelled");
            Err(BatchCancelled {
                partial: BatchResult { entries },
                total,
            })
        }
    }

    /// One slot per input file, `None` where the task was cancelled. Tasks
    /// live in `JoinSet`s, so dropping this future aborts them and their
    /// in-flight requests.
    async fn run_slots(
        &self,
        files: &[ChangedFile],
        cancel: CancellationToken,
    ) -> Vec<Option<ScrapeOutcome>> {
        let cancel = cancel.child_token();
        let mut deadline: JoinSet<()> = JoinSet::new();
        if let Some(limit) = self.config.batch_deadline {
            let token = cancel.clone();
            deadline.spawn(async move {
                tokio::time::sleep(limit).await;
                info!(deadline_secs = limit.as_secs_f64(), "batch deadline reached");
                token.cancel();
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        info!(files = files.len(), concurrency = self.config.concurrency, "starting batch");

        let mut tasks = JoinSet::new();
        for (index, file) in files.iter().cloned().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let sem = Arc::clone(&semaphore);
            let token = cancel.clone();
            tasks.spawn(async move {
                let slot = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    outcome = async {
                        let _permit = match sem.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => return None,
                        };
                        Some(pipeline.process(&file).await)
                    } => outcome,
                };
                (index, slot)
            });
        }

        // Outer `None`: the task never reported back.
        let mut reported: Vec<Option<Option<ScrapeOutcome>>> = vec![None; files.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, slot)) => reported[index] = Some(slot),
                Err(e) => debug!(error = %e, "pipeline task ended abnormally"),
            }
        }
        deadline.abort_all();

        let slots: Vec<Option<ScrapeOutcome>> = files
            .iter()
            .zip(reported)
            .map(|(file, slot)| match slot {
                Some(slot) => slot,
                None => {
                    error!(file = %file.path, "pipeline panicked");
                    Some(ScrapeOutcome::failure(
                        FailureReason::ParseError,
                        "scraper panicked while processing the page",
                    ))
                }
            })
            .collect();

        let done = slots.iter().filter(|s| s.is_some()).count();
        info!(done, total = files.len(), "batch finished");
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::fallback::{MemoryDocuments, RECOVERED_NOTE};
    use crate::model::{PlatformId, Problem, ProblemReference};
    use crate::scraper::leetcode::GRAPHQL_URL;
    use crate::scraper::Scraper;
    use crate::testing::{MockReply, MockTransport};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config() -> ScrapeConfig {
        ScrapeConfig {
            retry: RetryPolicy {
                max_retries: 1,
                base_backoff: Duration::from_millis(1),
            },
            ..ScrapeConfig::default()
        }
    }

    fn boj_url(id: usize) -> String {
        format!("https://www.acmicpc.net/problem/{}", id)
    }

    fn boj_page(title: &str) -> String {
        format!(
            "<html><body><span id=\"problem_title\">{}</span><div id=\"problem_description\"><p>statement</p></div></body></html>",
            title
        )
    }

    fn boj_file(id: usize) -> ChangedFile {
        ChangedFile::new(format!("boj/{}/main.py", id), format!("# {}\nprint(1)\n", boj_url(id)))
    }

    fn orchestrator(mock: &MockTransport) -> Orchestrator {
        Orchestrator::from_config(Arc::new(mock.clone()), None, config())
    }

    #[tokio::test]
    async fn no_url_means_no_network() {
        let mock = MockTransport::new();
        let files = vec![
            ChangedFile::new("a.py", "print(1)"),
            ChangedFile::new("b.cpp", "// see https://codeforces.com/problemset/problem/1/A\nint main(){}"),
            ChangedFile::new("notes.txt", "https://www.acmicpc.net/problem/1000"),
        ];
        let result = orchestrator(&mock).run(files).await;
        assert_eq!(result.len(), 3);
        for entry in result.iter() {
            assert_eq!(entry.outcome.failure_reason(), Some(FailureReason::UnsupportedPlatform));
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn boj_blocked_reads_readme_once() {
        let readme = std::fs::read_to_string("tests/fixtures/readme_11729.md").unwrap();
        let docs = MemoryDocuments::new().with("boj/11729/README.md", readme);
        let mock = MockTransport::new().reply(&boj_url(11729), MockReply::status(403));
        let orch = Orchestrator::from_config(
            Arc::new(mock.clone()),
            Some(Arc::new(docs.clone())),
            config(),
        );

        let result = orch.run(vec![boj_file(11729)]).await;
        match &result.entries[0].outcome {
            ScrapeOutcome::Degraded { problem, .. } => assert_eq!(problem.title, "하노이 탑 이동 순서"),
            other => panic!("expected degraded, got {:?}", other),
        }
        assert_eq!(docs.read_count(), 1);
        assert_eq!(mock.calls_to(&boj_url(11729)), 1);
    }

    #[tokio::test]
    async fn other_platforms_never_fall_back() {
        let docs = MemoryDocuments::new();
        let lesson = "https://school.programmers.co.kr/learn/courses/30/lessons/42576";
        let mock = MockTransport::new()
            .reply(lesson, MockReply::status(403))
            .reply_post(GRAPHQL_URL, "two-sum", MockReply::status(403));
        let orch = Orchestrator::from_config(
            Arc::new(mock.clone()),
            Some(Arc::new(docs.clone())),
            config(),
        );
        let files = vec![
            ChangedFile::new("lc/two_sum.rs", "// https://leetcode.com/problems/two-sum/\nfn main() {}"),
            ChangedFile::new("pg/42576.py", format!("# {}\n", lesson)),
        ];
        let result = orch.run(files).await;
        for entry in result.iter() {
            assert_eq!(entry.outcome.failure_reason(), Some(FailureReason::Blocked));
        }
        assert_eq!(docs.read_count(), 0);
    }

    #[tokio::test]
    async fn boj_not_found_does_not_fall_back() {
        let docs = MemoryDocuments::new();
        let mock = MockTransport::new().reply(&boj_url(99999), MockReply::status(404));
        let orch = Orchestrator::from_config(Arc::new(mock), Some(Arc::new(docs.clone())), config());
        let result = orch.run(vec![boj_file(99999)]).await;
        assert_eq!(result.entries[0].outcome.failure_reason(), Some(FailureReason::NotFound));
        assert_eq!(docs.read_count(), 0);
    }

    #[tokio::test]
    async fn boj_network_error_falls_back_after_retries() {
        let readme = std::fs::read_to_string("tests/fixtures/readme_11729.md").unwrap();
        let docs = MemoryDocuments::new().with("boj/11729/README.md", readme);
        let mock = MockTransport::new().reply(&boj_url(11729), MockReply::status(503));
        let orch = Orchestrator::from_config(
            Arc::new(mock.clone()),
            Some(Arc::new(docs.clone())),
            ScrapeConfig {
                retry: RetryPolicy {
                    max_retries: 2,
                    base_backoff: Duration::from_millis(1),
                },
                ..config()
            },
        );

        let result = orch.run(vec![boj_file(11729)]).await;
        match &result.entries[0].outcome {
            ScrapeOutcome::Degraded { problem, note } => {
                assert_eq!(problem.title, "하노이 탑 이동 순서");
                assert_eq!(note, RECOVERED_NOTE);
            }
            other => panic!("expected degraded, got {:?}", other),
        }
        assert_eq!(mock.calls_to(&boj_url(11729)), 3);
        assert_eq!(docs.read_count(), 1);
    }

    #[tokio::test]
    async fn dropping_the_batch_stops_its_requests() {
        let mock = MockTransport::new()
            .reply(&boj_url(1000), MockReply::status(503))
            .delay(&boj_url(1000), Duration::from_millis(100));
        let orch = Orchestrator::from_config(
            Arc::new(mock.clone()),
            None,
            ScrapeConfig {
                retry: RetryPolicy {
                    max_retries: 5,
                    base_backoff: Duration::from_millis(10),
                },
                batch_deadline: Some(Duration::from_secs(30)),
                ..config()
            },
        );

        let cut = tokio::time::timeout(Duration::from_millis(150), orch.run(vec![boj_file(1000)])).await;
        assert!(cut.is_err());
        let calls_at_cut = mock.call_count();
        assert!(calls_at_cut >= 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.call_count(), calls_at_cut);
    }

    #[tokio::test]
    async fn panic_is_isolated_to_its_file() {
        let mock = MockTransport::new()
            .reply(&boj_url(1000), MockReply::Panic)
            .reply(&boj_url(1001), MockReply::ok(boj_page("A-B")));
        let result = orchestrator(&mock).run(vec![boj_file(1000), boj_file(1001)]).await;
        assert_eq!(result.entries[0].outcome.failure_reason(), Some(FailureReason::ParseError));
        assert!(result.entries[1].outcome.is_success());
    }

    #[tokio::test]
    async fn cancellation_returns_finished_files() {
        let mock = MockTransport::new()
            .reply(&boj_url(1000), MockReply::ok(boj_page("fast")))
            .reply(&boj_url(1001), MockReply::ok(boj_page("slow")))
            .delay(&boj_url(1001), Duration::from_secs(30));
        let orch = orchestrator(&mock);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = orch
            .run_cancellable(vec![boj_file(1000), boj_file(1001)], token)
            .await
            .unwrap_err();
        assert_eq!(err.total, 2);
        assert_eq!(err.partial.len(), 1);
        assert_eq!(err.partial.entries[0].file.path, "boj/1000/main.py");
    }

    #[tokio::test]
    async fn deadline_fills_unfinished_slots() {
        let mock = MockTransport::new()
            .reply(&boj_url(1000), MockReply::ok(boj_page("fast")))
            .reply(&boj_url(1001), MockReply::ok(boj_page("slow")))
            .delay(&boj_url(1001), Duration::from_secs(30));
        let orch = Orchestrator::from_config(
            Arc::new(mock),
            None,
            ScrapeConfig {
                batch_deadline: Some(Duration::from_millis(200)),
                ..config()
            },
        );
        let result = orch.run(vec![boj_file(1000), boj_file(1001)]).await;
        assert!(result.entries[0].outcome.is_success());
        match &result.entries[1].outcome {
            ScrapeOutcome::Failure { failure } => {
                assert_eq!(failure.reason, FailureReason::NetworkError);
                assert_eq!(failure.detail, DEADLINE_DETAIL);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    /// Scraper that records how many fetches overlap.
    struct GaugeScraper {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Scraper for GaugeScraper {
        fn platform(&self) -> PlatformId {
            PlatformId::Boj
        }

        async fn fetch(&self, reference: &ProblemReference) -> ScrapeOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ScrapeOutcome::Success {
                problem: Problem::new(reference.clone(), reference.problem_id.clone()),
            }
        }
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let gauge = Arc::new(GaugeScraper {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let factory = ScraperFactory::default().with_scraper(gauge.clone());
        let orch = Orchestrator::new(
            factory,
            ScrapeConfig {
                concurrency: 2,
                ..config()
            },
        );
        let files: Vec<ChangedFile> = (1000..1008).map(boj_file).collect();
        let result = orch.run(files).await;
        assert_eq!(result.len(), 8);
        assert!(result.iter().all(|e| e.outcome.is_success()));
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn output_order_matches_input(delays in prop::collection::vec(0u64..30, 1..8)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let mut mock = MockTransport::new();
            let mut files = Vec::new();
            for (i, delay) in delays.iter().enumerate() {
                let id = 2000 + i;
                mock = mock
                    .reply(&boj_url(id), MockReply::ok(boj_page(&format!("P{}", id))))
                    .delay(&boj_url(id), Duration::from_millis(*delay));
                files.push(boj_file(id));
            }
            let orch = orchestrator(&mock);
            let result = rt.block_on(orch.run(files.clone()));

            prop_assert_eq!(result.len(), files.len());
            for (i, entry) in result.iter().enumerate() {
                prop_assert_eq!(&entry.file.path, &files[i].path);
                let title = entry.outcome.problem().map(|p| p.title.clone());
                prop_assert_eq!(title, Some(format!("P{}", 2000 + i)));
            }
        }
    }
}
