//! Local README fallback for BOJ.
//!
//! When the BOJ site refuses us, the solution repository usually carries the
//! statement anyway: BaekjoonHub commits a `README.md` next to every
//! solution. This module reads that file and parses it into a [`Problem`].

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock, RwLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::model::{
    ChangedFile, Example, Failure, FailureReason, PlatformId, Problem, ProblemReference,
    ScrapeOutcome,
};
use crate::parser::blocks::{blocks_to_text, classify_lines, Block};
use crate::parser::sections::{cluster_sections, find_section, Section, SectionKind};
use crate::parser::text::fragment_text;
use crate::platform;

pub const RECOVERED_NOTE: &str = "recovered from local document";

static TIERED_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<tier>[^\]]+)\]\s*(?P<name>.+?)(?:\s+-\s+(?P<id>\d+))?$").unwrap()
});
static HTML_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:p|div|ul|ol|li|br|pre|table|tr|td|img|sup|sub|strong|em|code|span)\b")
        .unwrap()
});

/// Read-only access to documents in the solution repository, addressed by
/// repository-relative path.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn read(&self, path: &str) -> Option<String>;
}

/// Documents on disk under a checkout root.
#[derive(Debug, Clone)]
pub struct FsDocuments {
    root: PathBuf,
}

impl FsDocuments {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentSource for FsDocuments {
    async fn read(&self, path: &str) -> Option<String> {
        let relative = Path::new(path);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            warn!(path, "refusing to read outside the repository root");
            return None;
        }
        match tokio::fs::read_to_string(self.root.join(relative)).await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(path, error = %e, "document not readable");
                None
            }
        }
    }
}

/// Documents held in memory, e.g. from a commit tree already fetched by the
/// caller. Records every read.
#[derive(Default, Clone)]
pub struct MemoryDocuments {
    docs: Arc<RwLock<HashMap<String, String>>>,
    reads: Arc<RwLock<Vec<String>>>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        if let Ok(mut docs) = self.docs.write() {
            docs.insert(path.into(), content.into());
        }
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.read().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentSource for MemoryDocuments {
    async fn read(&self, path: &str) -> Option<String> {
        if let Ok(mut reads) = self.reads.write() {
            reads.push(path.to_string());
        }
        self.docs.read().ok()?.get(path).cloned()
    }
}

/// Recovers BOJ problems from the README committed next to the solution.
#[derive(Clone)]
pub struct FallbackResolver {
    documents: Arc<dyn DocumentSource>,
    readme_name: String,
}

impl FallbackResolver {
    pub fn new(documents: Arc<dyn DocumentSource>, readme_name: impl Into<String>) -> Self {
        Self {
            documents,
            readme_name: readme_name.into(),
        }
    }

    /// Only BOJ network-level failures are worth a local lookup.
    pub fn applies(platform: PlatformId, reason: FailureReason) -> bool {
        platform == PlatformId::Boj
            && matches!(reason, FailureReason::Blocked | FailureReason::NetworkError)
    }

    /// Try the README beside `file`. Returns `Degraded` on success, otherwise
    /// the original failure unchanged.
    pub async fn resolve(
        &self,
        file: &ChangedFile,
        reference: &ProblemReference,
        failure: Failure,
    ) -> ScrapeOutcome {
        if !Self::applies(reference.platform, failure.reason) {
            return ScrapeOutcome::Failure { failure };
        }

        let path = readme_path(&file.path, &self.readme_name);
        let Some(markdown) = self.documents.read(&path).await else {
            debug!(file = %file.path, readme = %path, "no local document");
            return ScrapeOutcome::Failure { failure };
        };

        match parse_readme(&markdown, reference) {
            Some(problem) => {
                info!(file = %file.path, readme = %path, "recovered problem from local document");
                ScrapeOutcome::Degraded {
                    problem,
                    note: RECOVERED_NOTE.to_string(),
                }
            }
            None => {
                warn!(file = %file.path, readme = %path, "local document unusable");
                ScrapeOutcome::Failure { failure }
            }
        }
    }
}

/// `<dir of file>/<readme_name>`, repository-relative.
pub fn readme_path(file_path: &str, readme_name: &str) -> String {
    match file_path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => format!("{}/{}", dir, readme_name),
        _ => readme_name.to_string(),
    }
}

/// Parse a BaekjoonHub-style README (or a plain markdown statement with
/// English section names). `None` when the title or description is missing,
/// or the document names a different problem than `reference`.
pub fn parse_readme(markdown: &str, reference: &ProblemReference) -> Option<Problem> {
    let blocks = classify_lines(markdown);
    let sections = cluster_sections(&blocks);
    let header = sections.first().filter(|s| s.kind == SectionKind::Header)?;

    let heading = header.blocks.iter().find_map(|b| match b {
        Block::Heading { level: 1, text } => Some(text.trim()),
        _ => None,
    })?;
    let (title, tier, title_id) = match TIERED_TITLE_RE.captures(heading) {
        Some(caps) => (
            caps["name"].trim().to_string(),
            Some(caps["tier"].trim().to_string()),
            caps.name("id").map(|m| m.as_str().to_string()),
        ),
        None => (heading.to_string(), None, None),
    };
    if title.is_empty() {
        return None;
    }

    if let Some(id) = title_id.filter(|id| *id != reference.problem_id) {
        debug!(id = %id, expected = %reference.problem_id, "README title names another problem");
        return None;
    }
    let linked = header.blocks.iter().find_map(|b| match b {
        Block::Link { url, .. } => platform::reference(url),
        _ => None,
    });
    if let Some(linked) = linked {
        if linked.platform != reference.platform || linked.problem_id != reference.problem_id {
            debug!(linked = %linked.canonical_url, "README link names another problem");
            return None;
        }
    }

    let description = find_section(&sections, SectionKind::Description)
        .map(section_text)
        .filter(|d| !d.is_empty())?;

    let mut problem = Problem::new(reference.clone(), title);
    problem.description = description;
    problem.input_spec = find_section(&sections, SectionKind::Input)
        .map(section_text)
        .unwrap_or_default();
    problem.output_spec = find_section(&sections, SectionKind::Output)
        .map(section_text)
        .unwrap_or_default();
    problem.constraints = find_section(&sections, SectionKind::Constraints)
        .map(section_text)
        .filter(|c| !c.is_empty());
    problem.tags = find_section(&sections, SectionKind::Tags)
        .map(|s| split_tags(&section_text(s)))
        .unwrap_or_default();
    problem.difficulty = tier;
    problem.examples = examples(&sections);
    Some(problem)
}

/// Section body as text. HTML bodies (BaekjoonHub copies the statement HTML
/// verbatim) go through the same normaliser as scraped pages.
fn section_text(section: &Section) -> String {
    let raw = blocks_to_text(&section.blocks);
    if HTML_RE.is_match(&raw) {
        fragment_text(&raw)
    } else {
        raw
    }
}

fn split_tags(text: &str) -> Vec<String> {
    text.split([',', '\n'])
        .map(|t| t.trim().trim_start_matches(['-', '*']).trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn fence_bodies(section: &Section) -> Vec<String> {
    section
        .blocks
        .iter()
        .filter_map(|b| match b {
            Block::Fence { body, .. } => Some(body.trim_matches('\n').to_string()),
            _ => None,
        })
        .collect()
}

/// Fences in an examples section pair up as input/output. Separate
/// example-input and example-output sections pair up by position.
fn examples(sections: &[Section]) -> Vec<Example> {
    let mut examples = Vec::new();
    for section in sections.iter().filter(|s| s.kind == SectionKind::Examples) {
        let fences = fence_bodies(section);
        examples.extend(fences.chunks_exact(2).map(|pair| Example {
            input: pair[0].clone(),
            output: pair[1].clone(),
        }));
    }

    let inputs: Vec<String> = sections
        .iter()
        .filter(|s| s.kind == SectionKind::ExampleInput)
        .flat_map(fence_bodies)
        .collect();
    let outputs: Vec<String> = sections
        .iter()
        .filter(|s| s.kind == SectionKind::ExampleOutput)
        .flat_map(fence_bodies)
        .collect();
    examples.extend(
        inputs
            .into_iter()
            .zip(outputs)
            .map(|(input, output)| Example { input, output }),
    );
    examples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hanoi() -> ProblemReference {
        platform::reference("https://www.acmicpc.net/problem/11729").unwrap()
    }

    fn baekjoonhub() -> String {
        std::fs::read_to_string("tests/fixtures/readme_11729.md").unwrap()
    }

    fn blocked() -> Failure {
        Failure::new(FailureReason::Blocked, "HTTP 403")
    }

    #[test]
    fn parses_baekjoonhub_readme() {
        let p = parse_readme(&baekjoonhub(), &hanoi()).unwrap();
        assert_eq!(p.title, "하노이 탑 이동 순서");
        assert_eq!(p.difficulty.as_deref(), Some("Gold V"));
        assert_eq!(p.tags, vec!["재귀"]);
        assert!(p.description.starts_with("세 개의 장대가 있고"));
        assert!(p
            .description
            .contains("- 한 번에 한 개의 원판만을 다른 탑으로 옮길 수 있다.\n- 쌓아 놓은"));
        assert!(!p.description.contains("<p>"));
        assert_eq!(
            p.input_spec,
            "첫째 줄에 첫 번째 장대에 쌓인 원판의 개수 N (1 ≤ N ≤ 20)이 주어진다."
        );
        assert!(p.output_spec.starts_with("첫째 줄에 옮긴 횟수 K를 출력한다.\n\n두 번째 줄부터"));
        assert!(p.examples.is_empty());
        assert_eq!(p.source, hanoi());
    }

    #[test]
    fn parses_plain_readme() {
        let md = std::fs::read_to_string("tests/fixtures/readme_plain.md").unwrap();
        let p = parse_readme(&md, &hanoi()).unwrap();
        assert_eq!(p.title, "Two Sum");
        assert!(p.difficulty.is_none());
        assert_eq!(p.input_spec, "An array `nums` and an integer `target`.");
        assert_eq!(
            p.examples,
            vec![
                Example {
                    input: "nums = [2,7,11,15], target = 9".into(),
                    output: "[0,1]".into()
                },
                Example {
                    input: "nums = [3,2,4], target = 6".into(),
                    output: "[1,2]".into()
                },
            ]
        );
        assert_eq!(
            p.constraints.as_deref(),
            Some("- 2 <= nums.length <= 10^4\n- Only one valid answer exists.")
        );
    }

    #[test]
    fn readme_for_another_problem_is_rejected() {
        let other = platform::reference("https://www.acmicpc.net/problem/1000").unwrap();
        assert!(parse_readme(&baekjoonhub(), &other).is_none());
    }

    #[test]
    fn readme_without_description_is_rejected() {
        let md = "# [Bronze V] A+B - 1000\n\n### 입력\n\n두 정수";
        let r = platform::reference("https://www.acmicpc.net/problem/1000").unwrap();
        assert!(parse_readme(md, &r).is_none());
        assert!(parse_readme("", &r).is_none());
        assert!(parse_readme("no heading at all\n\n### 문제 설명\n\ntext", &r).is_none());
    }

    #[test]
    fn example_io_sections_pair_up() {
        let md = "# A+B\n\n## 문제\n\n더하기\n\n## 예제 입력 1\n\n```\n1 2\n```\n\n## 예제 출력 1\n\n```\n3\n```\n";
        let r = platform::reference("https://www.acmicpc.net/problem/1000").unwrap();
        let p = parse_readme(md, &r).unwrap();
        assert_eq!(
            p.examples,
            vec![Example {
                input: "1 2".into(),
                output: "3".into()
            }]
        );
    }

    #[test]
    fn readme_next_to_file() {
        assert_eq!(readme_path("백준/Gold/11729. 하노이/hanoi.py", "README.md"), "백준/Gold/11729. 하노이/README.md");
        assert_eq!(readme_path("main.py", "README.md"), "README.md");
    }

    #[tokio::test]
    async fn resolves_from_memory() {
        let docs = MemoryDocuments::new().with("boj/11729/README.md", baekjoonhub());
        let resolver = FallbackResolver::new(Arc::new(docs.clone()), "README.md");
        let file = ChangedFile::new("boj/11729/hanoi.py", "# https://www.acmicpc.net/problem/11729");

        let outcome = resolver.resolve(&file, &hanoi(), blocked()).await;
        match outcome {
            ScrapeOutcome::Degraded { problem, note } => {
                assert_eq!(problem.title, "하노이 탑 이동 순서");
                assert_eq!(note, RECOVERED_NOTE);
            }
            other => panic!("expected degraded, got {:?}", other),
        }
        assert_eq!(docs.reads(), vec!["boj/11729/README.md"]);
    }

    #[tokio::test]
    async fn missing_readme_keeps_failure() {
        let docs = MemoryDocuments::new();
        let resolver = FallbackResolver::new(Arc::new(docs.clone()), "README.md");
        let file = ChangedFile::new("boj/11729/hanoi.py", "");
        let outcome = resolver.resolve(&file, &hanoi(), blocked()).await;
        assert_eq!(outcome, ScrapeOutcome::Failure { failure: blocked() });
        assert_eq!(docs.read_count(), 1);
    }

    #[tokio::test]
    async fn other_failures_do_not_read() {
        let docs = MemoryDocuments::new().with("boj/11729/README.md", baekjoonhub());
        let resolver = FallbackResolver::new(Arc::new(docs.clone()), "README.md");
        let file = ChangedFile::new("boj/11729/hanoi.py", "");

        let not_found = Failure::new(FailureReason::NotFound, "HTTP 404");
        let outcome = resolver.resolve(&file, &hanoi(), not_found.clone()).await;
        assert_eq!(outcome, ScrapeOutcome::Failure { failure: not_found });

        let lc = platform::reference("https://leetcode.com/problems/two-sum/").unwrap();
        resolver.resolve(&file, &lc, blocked()).await;
        assert_eq!(docs.read_count(), 0);
    }

    #[tokio::test]
    async fn reads_from_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let problem_dir = dir.path().join("boj").join("11729");
        std::fs::create_dir_all(&problem_dir).unwrap();
        std::fs::write(problem_dir.join("README.md"), baekjoonhub()).unwrap();

        let docs = FsDocuments::new(dir.path());
        assert!(docs.read("boj/11729/README.md").await.is_some());
        assert!(docs.read("boj/1000/README.md").await.is_none());
        assert!(docs.read("../etc/passwd").await.is_none());
        assert!(docs.read("/etc/passwd").await.is_none());
    }
}
