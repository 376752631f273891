//! Hand-off to the review collaborators.
//!
//! The scraper core stops at [`BatchResult`]. This module turns each entry
//! into a review decision, renders the problem context the review agent
//! reads, and drives the agent and commit commenter through two small
//! traits whose implementations live outside this crate.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ReviewError;
use crate::model::{BatchEntry, BatchResult, FailureReason, Problem, ScrapeOutcome};

pub const DEFAULT_DESCRIPTION_CHARS: usize = 1000;
const TRUNCATED: &str = "... [truncated]";

/// What the review side should do with one file.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    /// Run a full review with `context`. `notice` is set for degraded data.
    Review {
        context: String,
        notice: Option<String>,
    },
    /// Do not review; post `notice` instead.
    Skip { notice: String },
}

impl BatchEntry {
    pub fn decision(&self) -> ReviewDecision {
        match &self.outcome {
            ScrapeOutcome::Success { problem } => ReviewDecision::Review {
                context: problem.to_prompt_context(DEFAULT_DESCRIPTION_CHARS),
                notice: None,
            },
            ScrapeOutcome::Degraded { problem, .. } => ReviewDecision::Review {
                context: problem.to_prompt_context(DEFAULT_DESCRIPTION_CHARS),
                notice: outcome_notice(&self.outcome),
            },
            ScrapeOutcome::Failure { .. } => ReviewDecision::Skip {
                notice: outcome_notice(&self.outcome).unwrap_or_default(),
            },
        }
    }
}

/// Human-readable line for the commit comment. `None` for a clean success.
pub fn outcome_notice(outcome: &ScrapeOutcome) -> Option<String> {
    match outcome {
        ScrapeOutcome::Success { .. } => None,
        ScrapeOutcome::Degraded { problem, note } => Some(format!(
            "Problem \"{}\" was {}; problem data may be incomplete.",
            problem.title, note
        )),
        ScrapeOutcome::Failure { failure } if failure.reason == FailureReason::UnsupportedPlatform => {
            Some(format!(
                "Review skipped: {}. Put the problem URL in a comment on the first line.",
                failure
            ))
        }
        ScrapeOutcome::Failure { failure } => Some(format!("Review skipped: {}.", failure)),
    }
}

impl Problem {
    /// Plain-text context block for the review prompt. The description is
    /// cut at `max_description_chars` characters.
    pub fn to_prompt_context(&self, max_description_chars: usize) -> String {
        let mut lines = vec![
            "PROBLEM INFORMATION".to_string(),
            "=".repeat(40),
            format!("Site: {}", self.source.platform),
            format!("Problem ID: {}", self.source.problem_id),
            format!("Title: {}", self.title),
        ];
        if let Some(difficulty) = &self.difficulty {
            lines.push(format!("Difficulty: {}", difficulty));
        }
        lines.push(format!("URL: {}", self.source.canonical_url));
        lines.push(String::new());

        if self.time_limit.is_some() || self.memory_limit.is_some() {
            lines.push("LIMITS".into());
            if let Some(t) = &self.time_limit {
                lines.push(format!("- Time: {}", t));
            }
            if let Some(m) = &self.memory_limit {
                lines.push(format!("- Memory: {}", m));
            }
            lines.push(String::new());
        }

        if !self.description.is_empty() {
            lines.push("DESCRIPTION".into());
            lines.push(truncate_chars(&self.description, max_description_chars));
            lines.push(String::new());
        }
        for (heading, body) in [("INPUT", &self.input_spec), ("OUTPUT", &self.output_spec)] {
            if !body.is_empty() {
                lines.push(heading.into());
                lines.push(body.clone());
                lines.push(String::new());
            }
        }
        if let Some(constraints) = &self.constraints {
            lines.push("CONSTRAINTS".into());
            lines.push(constraints.clone());
            lines.push(String::new());
        }
        if !self.tags.is_empty() {
            lines.push(format!("Tags: {}", self.tags.join(", ")));
            lines.push(String::new());
        }

        if !self.examples.is_empty() {
            lines.push("EXAMPLES".into());
            for (i, example) in self.examples.iter().enumerate() {
                lines.push(format!("Example {}:", i + 1));
                lines.push("  Input:".into());
                lines.push(indent(&example.input, 4));
                lines.push("  Output:".into());
                lines.push(indent(&example.output, 4));
                lines.push(String::new());
            }
        }

        lines.join("\n").trim_end().to_string()
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATED),
        None => text.to_string(),
    }
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|l| format!("{}{}", pad, l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Review-generation service. Opaque text in, text out.
#[async_trait]
pub trait ReviewAgent: Send + Sync {
    async fn review(&self, problem_context: &str, code: &str) -> Result<String, ReviewError>;
}

/// Posts a comment on a commit, keyed by file path.
#[async_trait]
pub trait CommitCommenter: Send + Sync {
    async fn post(&self, sha: &str, path: &str, body: &str) -> Result<(), ReviewError>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSummary {
    pub reviewed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Review every entry in order and post one comment per file. A failing
/// agent or commenter call only affects its own file.
pub async fn review_batch(
    result: &BatchResult,
    sha: &str,
    agent: &dyn ReviewAgent,
    commenter: &dyn CommitCommenter,
) -> ReviewSummary {
    let mut summary = ReviewSummary::default();

    for entry in result.iter() {
        let path = entry.file.path.as_str();
        let body = match entry.decision() {
            ReviewDecision::Review { context, notice } => {
                match agent.review(&context, &entry.file.content).await {
                    Ok(review) => {
                        summary.reviewed += 1;
                        match notice {
                            Some(n) => format!("> {}\n\n{}", n, review),
                            None => review,
                        }
                    }
                    Err(e) => {
                        warn!(path, error = %e, "review agent failed");
                        summary.failed += 1;
                        format!("Review could not be generated: {}", e)
                    }
                }
            }
            ReviewDecision::Skip { notice } => {
                summary.skipped += 1;
                notice
            }
        };

        if let Err(e) = commenter.post(sha, path, &body).await {
            warn!(path, error = %e, "posting comment failed");
            summary.failed += 1;
        }
    }

    info!(
        sha,
        reviewed = summary.reviewed,
        skipped = summary.skipped,
        failed = summary.failed,
        "review batch done"
    );
    summary
}
