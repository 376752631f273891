use std::sync::Arc;

use async_trait::async_trait;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{into_outcome, with_retry, Scraper};
use crate::config::RetryPolicy;
use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{Example, PlatformId, Problem, ProblemReference, ScrapeOutcome};
use crate::parser::text::{element_text, escape, fragment_text, inline_text, preformatted};
use crate::transport::{check_status, Transport};

pub const GRAPHQL_URL: &str = "https://leetcode.com/graphql";

const QUESTION_QUERY: &str = "\
query questionData($titleSlug: String!) {
  question(titleSlug: $titleSlug) {
    title
    content
    isPaidOnly
    difficulty
    topicTags {
      name
    }
  }
}";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<QuestionData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct QuestionData {
    question: Option<Question>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Question {
    title: Option<String>,
    content: Option<String>,
    #[serde(default)]
    is_paid_only: bool,
    difficulty: Option<String>,
    #[serde(default)]
    topic_tags: Vec<TopicTag>,
}

#[derive(Debug, Deserialize)]
struct TopicTag {
    name: String,
}

/// LeetCode, fetched through its public GraphQL endpoint.
pub struct LeetCodeScraper {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl LeetCodeScraper {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    async fn scrape(&self, reference: &ProblemReference) -> ScrapeResult<Problem> {
        let body = json!({
            "operationName": "questionData",
            "variables": { "titleSlug": reference.problem_id },
            "query": QUESTION_QUERY,
        });
        let headers = [
            ("Accept", "application/json"),
            ("Origin", "https://leetcode.com"),
            ("Referer", reference.canonical_url.as_str()),
        ];
        let transport = self.transport.as_ref();
        let (body, headers) = (&body, &headers[..]);
        let response = with_retry(&self.retry, GRAPHQL_URL, || async move {
            let response = transport.post_json(GRAPHQL_URL, body, headers).await?;
            check_status(response)
        })
        .await?;
        parse_response(&response.body, reference)
    }
}

#[async_trait]
impl Scraper for LeetCodeScraper {
    fn platform(&self) -> PlatformId {
        PlatformId::LeetCode
    }

    async fn fetch(&self, reference: &ProblemReference) -> ScrapeOutcome {
        let outcome = into_outcome(self.scrape(reference).await);
        info!(problem = %reference.problem_id, success = outcome.is_success(), "LeetCode fetch done");
        outcome
    }
}

/// Turn a GraphQL `questionData` response into a problem.
pub fn parse_response(body: &str, reference: &ProblemReference) -> ScrapeResult<Problem> {
    let response: GraphqlResponse = serde_json::from_str(body)?;

    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(ScrapeError::Parse(format!(
            "GraphQL errors: {}",
            messages.join("; ")
        )));
    }

    let question = response
        .data
        .and_then(|d| d.question)
        .ok_or_else(|| ScrapeError::NotFound(format!("no question with slug {}", reference.problem_id)))?;

    let title = question
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ScrapeError::Parse("question has no title".into()))?;
    let content = match question.content.filter(|c| !c.trim().is_empty()) {
        Some(c) => c,
        None if question.is_paid_only => {
            return Err(ScrapeError::Blocked(format!(
                "{} is a premium question",
                reference.problem_id
            )))
        }
        None => return Err(ScrapeError::Parse("question content is empty".into())),
    };

    let statement = split_content(&content);
    let mut problem = Problem::new(reference.clone(), title.trim());
    problem.description = statement.description;
    problem.examples = statement.examples;
    problem.constraints = statement.constraints;
    problem.difficulty = question.difficulty;
    problem.tags = question.topic_tags.into_iter().map(|t| t.name).collect();
    Ok(problem)
}

#[derive(Debug, Default)]
struct Statement {
    description: String,
    examples: Vec<Example>,
    constraints: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Part {
    Description,
    Examples,
    Constraints,
    FollowUp,
}

/// Split the question HTML into description, examples and constraints by
/// walking its top-level nodes. `Example N:` and `Constraints:` paragraphs
/// switch sections. Notes between examples and a `Follow-up` go back to the
/// description.
fn split_content(content: &str) -> Statement {
    let fragment = Html::parse_fragment(content);
    let mut part = Part::Description;
    let mut description = String::new();
    let mut constraints = String::new();
    let mut follow_up = String::new();
    let mut examples = Vec::new();

    for node in fragment.root_element().children() {
        let html = match node.value() {
            Node::Text(text) => escape(text),
            Node::Element(_) => {
                let Some(el) = ElementRef::wrap(node) else {
                    continue;
                };
                let label = inline_text(el);
                if is_example_label(&label) {
                    part = Part::Examples;
                    continue;
                }
                if label.trim_end_matches(':') == "Constraints" {
                    part = Part::Constraints;
                    continue;
                }
                if label.starts_with("Follow-up") || label.starts_with("Follow up") {
                    part = Part::FollowUp;
                }
                if part == Part::Examples {
                    if let Some(example) = example_from(el) {
                        examples.push(example);
                        continue;
                    }
                }
                el.html()
            }
            _ => continue,
        };
        match part {
            Part::Description | Part::Examples => description.push_str(&html),
            Part::Constraints => constraints.push_str(&html),
            Part::FollowUp => follow_up.push_str(&html),
        }
    }

    let mut description = fragment_text(&description);
    let follow_up = fragment_text(&follow_up);
    if !follow_up.is_empty() {
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str(&follow_up);
    }
    let constraints = fragment_text(&constraints);

    Statement {
        description,
        examples,
        constraints: (!constraints.is_empty()).then_some(constraints),
    }
}

fn is_example_label(label: &str) -> bool {
    let Some(rest) = label.strip_prefix("Example") else {
        return false;
    };
    rest.trim_end_matches(':')
        .trim()
        .chars()
        .all(|c| c.is_ascii_digit())
}

/// Example from a `<pre>` block or a newer `div.example-block`.
fn example_from(el: ElementRef) -> Option<Example> {
    let text = match el.value().name() {
        "pre" => preformatted(el),
        "div" => element_text(el),
        _ => return None,
    };
    parse_example(&text)
}

/// `Input: ... Output: ... [Explanation: ...]`; the explanation is dropped.
fn parse_example(text: &str) -> Option<Example> {
    let input_at = text.find("Input:")?;
    let output_at = text.find("Output:")?;
    if output_at < input_at {
        return None;
    }
    let input = text[input_at + "Input:".len()..output_at].trim();
    let rest = &text[output_at + "Output:".len()..];
    let output = match rest.find("Explanation:") {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(Example {
        input: input.to_string(),
        output: output.trim().to_string(),
    })
}
