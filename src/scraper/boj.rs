use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::info;

use super::{get_page, into_outcome, Scraper, HTML_HEADERS};
use crate::config::RetryPolicy;
use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{Example, PlatformId, Problem, ProblemReference, ScrapeOutcome};
use crate::parser::text::{element_text, inline_text, preformatted, select_first};
use crate::transport::Transport;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#problem_title").unwrap());
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#problem_description").unwrap());
static INPUT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#problem_input").unwrap());
static OUTPUT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#problem_output").unwrap());
static LIMIT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#problem_limit").unwrap());
static INFO_HEAD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#problem-info thead th").unwrap());
static INFO_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#problem-info tbody td").unwrap());
static TAGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#problem_tags li a").unwrap());

/// Baekjoon Online Judge, scraped from the problem page HTML.
pub struct BojScraper {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl BojScraper {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    async fn scrape(&self, reference: &ProblemReference) -> ScrapeResult<Problem> {
        let page = get_page(
            self.transport.as_ref(),
            &self.retry,
            &reference.canonical_url,
            HTML_HEADERS,
        )
        .await?;
        parse_problem(&page.body, reference)
    }
}

#[async_trait]
impl Scraper for BojScraper {
    fn platform(&self) -> PlatformId {
        PlatformId::Boj
    }

    async fn fetch(&self, reference: &ProblemReference) -> ScrapeOutcome {
        let outcome = into_outcome(self.scrape(reference).await);
        info!(problem = %reference.problem_id, success = outcome.is_success(), "BOJ fetch done");
        outcome
    }
}

/// Parse a BOJ problem page. Fails only when none of the statement anchors
/// are present or the title is missing.
pub fn parse_problem(html: &str, reference: &ProblemReference) -> ScrapeResult<Problem> {
    let doc = Html::parse_document(html);

    let description = section_text(&doc, &DESCRIPTION);
    let input = section_text(&doc, &INPUT);
    let output = section_text(&doc, &OUTPUT);
    let title = select_first(&doc, &TITLE).map(inline_text);

    if title.is_none() && description.is_none() && input.is_none() && output.is_none() {
        return Err(ScrapeError::Parse(format!(
            "no problem anchors found on {}",
            reference.canonical_url
        )));
    }
    let title = title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ScrapeError::Parse("missing #problem_title".into()))?;

    let mut problem = Problem::new(reference.clone(), title);
    problem.description = description.unwrap_or_default();
    problem.input_spec = input.unwrap_or_default();
    problem.output_spec = output.unwrap_or_default();
    problem.constraints = section_text(&doc, &LIMIT).filter(|c| !c.is_empty());
    problem.examples = samples(&doc);
    problem.tags = doc
        .select(&TAGS)
        .map(inline_text)
        .filter(|t| !t.is_empty())
        .collect();

    let (time_limit, memory_limit) = limits(&doc);
    problem.time_limit = time_limit;
    problem.memory_limit = memory_limit;

    Ok(problem)
}

fn section_text(doc: &Html, selector: &Selector) -> Option<String> {
    select_first(doc, selector).map(element_text)
}

/// `#sample-input-N` / `#sample-output-N` pairs from 1 up to the first gap.
fn samples(doc: &Html) -> Vec<Example> {
    let mut examples = Vec::new();
    for n in 1.. {
        let (Ok(in_sel), Ok(out_sel)) = (
            Selector::parse(&format!("#sample-input-{}", n)),
            Selector::parse(&format!("#sample-output-{}", n)),
        ) else {
            break;
        };
        let (Some(input), Some(output)) = (select_first(doc, &in_sel), select_first(doc, &out_sel))
        else {
            break;
        };
        examples.push(Example {
            input: preformatted(input),
            output: preformatted(output),
        });
    }
    examples
}

/// Time and memory limits from the `#problem-info` table, matched by header
/// text and falling back to the first two columns.
fn limits(doc: &Html) -> (Option<String>, Option<String>) {
    let heads: Vec<String> = doc.select(&INFO_HEAD).map(inline_text).collect();
    let cells: Vec<String> = doc.select(&INFO_CELL).map(inline_text).collect();

    let column = |keywords: &[&str], fallback: usize| {
        let idx = heads
            .iter()
            .position(|h| keywords.iter().any(|k| h.contains(k)))
            .unwrap_or(fallback);
        cells.get(idx).filter(|c| !c.is_empty()).cloned()
    };

    (
        column(&["시간", "Time"][..], 0),
        column(&["메모리", "Memory"][..], 1),
    )
}
