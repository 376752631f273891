use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Source language, derived from the file extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Python,
    Java,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Kotlin,
    Swift,
    Ruby,
    Unknown,
}

const EXTENSIONS: &[(&str, Language)] = &[
    ("c", Language::C),
    ("h", Language::C),
    ("cpp", Language::Cpp),
    ("cc", Language::Cpp),
    ("cxx", Language::Cpp),
    ("hpp", Language::Cpp),
    ("py", Language::Python),
    ("java", Language::Java),
    ("js", Language::JavaScript),
    ("mjs", Language::JavaScript),
    ("ts", Language::TypeScript),
    ("go", Language::Go),
    ("rs", Language::Rust),
    ("kt", Language::Kotlin),
    ("swift", Language::Swift),
    ("rb", Language::Ruby),
];

/// Extensions reviewed by the commit pipeline.
const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "cpp", "cc", "cxx", "py", "java", "js", "go", "rs", "kt", "swift", "ts", "rb",
];

impl Language {
    pub fn from_path(path: &str) -> Self {
        let ext = match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some(e) => e.to_ascii_lowercase(),
            None => return Language::Unknown,
        };
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, lang)| *lang)
            .unwrap_or(Language::Unknown)
    }
}

/// One file touched by a commit.
#[derive(Debug, Clone, Serialize)]
pub struct ChangedFile {
    pub path: String,
    #[serde(skip)]
    pub content: String,
    pub language: Language,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let language = Language::from_path(&path);
        ChangedFile {
            path,
            content: content.into(),
            language,
        }
    }

    pub fn is_source_file(&self) -> bool {
        Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlatformId {
    #[serde(rename = "BOJ")]
    Boj,
    LeetCode,
    Programmers,
    Unknown,
}

impl PlatformId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Boj => "BOJ",
            PlatformId::LeetCode => "LeetCode",
            PlatformId::Programmers => "Programmers",
            PlatformId::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified problem URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemReference {
    pub platform: PlatformId,
    pub canonical_url: String,
    pub problem_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Example {
    pub input: String,
    pub output: String,
}

/// Normalized problem statement, identical in shape for every platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub title: String,
    pub description: String,
    pub input_spec: String,
    pub output_spec: String,
    pub examples: Vec<Example>,
    pub constraints: Option<String>,
    pub time_limit: Option<String>,
    pub memory_limit: Option<String>,
    pub difficulty: Option<String>,
    pub tags: Vec<String>,
    pub source: ProblemReference,
}

impl Problem {
    /// Empty problem for `source`; scrapers fill the fields they find.
    pub fn new(source: ProblemReference, title: impl Into<String>) -> Self {
        Problem {
            title: title.into(),
            description: String::new(),
            input_spec: String::new(),
            output_spec: String::new(),
            examples: Vec::new(),
            constraints: None,
            time_limit: None,
            memory_limit: None,
            difficulty: None,
            tags: Vec::new(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    NetworkError,
    Blocked,
    ParseError,
    UnsupportedPlatform,
    NotFound,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NetworkError => "network error",
            FailureReason::Blocked => "blocked by platform",
            FailureReason::ParseError => "parse error",
            FailureReason::UnsupportedPlatform => "unsupported platform",
            FailureReason::NotFound => "problem not found",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub reason: FailureReason,
    pub detail: String,
}

impl Failure {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Failure {
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.reason, self.detail)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScrapeOutcome {
    Success { problem: Problem },
    Degraded { problem: Problem, note: String },
    Failure { failure: Failure },
}

impl ScrapeOutcome {
    pub fn failure(reason: FailureReason, detail: impl Into<String>) -> Self {
        ScrapeOutcome::Failure {
            failure: Failure::new(reason, detail),
        }
    }

    pub fn problem(&self) -> Option<&Problem> {
        match self {
            ScrapeOutcome::Success { problem } | ScrapeOutcome::Degraded { problem, .. } => {
                Some(problem)
            }
            ScrapeOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            ScrapeOutcome::Failure { failure } => Some(failure.reason),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub file: ChangedFile,
    pub outcome: ScrapeOutcome,
}

/// One entry per input file, always in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter()
    }
}
