use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use super::{get_page, into_outcome, Scraper, HTML_HEADERS};
use crate::config::RetryPolicy;
use crate::error::{ScrapeError, ScrapeResult};
use crate::model::{Example, PlatformId, Problem, ProblemReference, ScrapeOutcome};
use crate::parser::sections::{kind_for_heading, SectionKind};
use crate::parser::text::{escape, fragment_text, inline_text, select_first};
use crate::transport::Transport;

static TITLES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".lesson-title", ".challenge-title"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static PAGE_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static BODIES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        ".guide-section-description .markdown",
        ".guide-section-description",
        "#tour-main-step",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static LEVEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-challenge-level]").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static HEAD_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

const TITLE_PREFIX: &str = "코딩테스트 연습 - ";

/// Programmers school lessons, scraped from the lesson page HTML.
pub struct ProgrammersScraper {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl ProgrammersScraper {
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
impl Scraper for ProgrammersScraper {
    fn platform(&self) -> PlatformId {
        PlatformId::Programmers
    }

    async fn fetch(&self, reference: &ProblemReference) -> ScrapeOutcome {
        let outcome = into_outcome(self.scrape(reference).await);
        info!(problem = %reference.problem_id, success = outcome.is_success(), "Programmers fetch done");
        outcome
    }
}

pub fn parse_problem(html: &str, reference: &ProblemReference) -> ScrapeResult<Problem> {
    let doc = Html::parse_document(html);

    let body = BODIES
        .iter()
        .find_map(|sel| select_first(&doc, sel))
        .ok_or_else(|| {
            ScrapeError::Parse(format!("no lesson body found on {}", reference.canonical_url))
        })?;
    let title = title(&doc).ok_or_else(|| ScrapeError::Parse("missing lesson title".into()))?;

    let sections = split_sections(body);
    let mut problem = Problem::new(reference.clone(), title);
    problem.description = sections.description;
    problem.input_spec = sections.input;
    problem.output_spec = sections.output;
    problem.constraints = (!sections.constraints.is_empty()).then_some(sections.constraints);
    problem.examples = sections.examples;
    problem.difficulty = select_first(&doc, &LEVEL)
        .and_then(|el| el.value().attr("data-challenge-level"))
        .map(|level| format!("Lv. {}", level.trim()));

    Ok(problem)
}

/// Lesson title element, else `<title>` up to the first `|`.
fn title(doc: &Html) -> Option<String> {
    let from_element = TITLES
        .iter()
        .filter_map(|sel| select_first(doc, sel))
        .map(inline_text)
        .find(|t| !t.is_empty());
    if from_element.is_some() {
        return from_element;
    }

    let page_title = inline_text(select_first(doc, &PAGE_TITLE)?);
    let head = page_title.split('|').next().unwrap_or_default().trim();
    let head = head.strip_prefix(TITLE_PREFIX).unwrap_or(head).trim();
    (!head.is_empty()).then(|| head.to_string())
}

#[derive(Debug, Default)]
struct LessonSections {
    description: String,
    input: String,
    output: String,
    constraints: String,
    examples: Vec<Example>,
}

/// Group the body's top-level nodes under the preceding `<h5>`/`<h6>`
/// heading. The first table under `입출력 예` holds the examples; other
/// tables stay in their section's text. The example explanation is dropped.
fn split_sections(body: ElementRef) -> LessonSections {
    let mut kind = SectionKind::Description;
    let mut html = LessonSections::default();
    let mut examples = None;

    for node in body.children() {
        let chunk = match node.value() {
            Node::Text(text) => escape(text),
            Node::Element(e) => {
                let Some(el) = ElementRef::wrap(node) else {
                    continue;
                };
                match e.name() {
                    "h5" | "h6" => {
                        kind = kind_for_heading(&inline_text(el));
                        continue;
                    }
                    "table" if kind == SectionKind::Examples => {
                        if examples.is_none() {
                            examples = Some(table_examples(el));
                        }
                        continue;
                    }
                    _ => el.html(),
                }
            }
            _ => continue,
        };
        let target = match kind {
            SectionKind::Description | SectionKind::Header => &mut html.description,
            SectionKind::Input => &mut html.input,
            SectionKind::Output => &mut html.output,
            SectionKind::Constraints => &mut html.constraints,
            _ => continue,
        };
        target.push_str(&chunk);
    }

    LessonSections {
        description: fragment_text(&html.description),
        input: fragment_text(&html.input),
        output: fragment_text(&html.output),
        constraints: fragment_text(&html.constraints),
        examples: examples.unwrap_or_default(),
    }
}

/// Every column but the last is a named argument, the last is the expected
/// return value.
fn table_examples(table: ElementRef) -> Vec<Example> {
    let names: Vec<String> = table.select(&HEAD_CELL).map(inline_text).collect();
    table
        .select(&ROW)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&CELL).map(inline_text).collect();
            let (output, args) = cells.split_last()?;
            let input = if names.len() == cells.len() {
                names
                    .iter()
                    .zip(args)
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                args.join(", ")
            };
            Some(Example {
                input,
                output: output.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FailureReason;
    use crate::platform::reference;
    use crate::testing::{MockReply, MockTransport};

    fn lesson() -> ProblemReference {
        reference("https://school.programmers.co.kr/learn/courses/30/lessons/42576").unwrap()
    }

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/programmers_42576.html").unwrap()
    }

    #[test]
    fn parses_lesson() {
        let p = parse_problem(&fixture(), &lesson()).unwrap();
        assert_eq!(p.title, "완주하지 못한 선수");
        assert_eq!(p.difficulty.as_deref(), Some("Lv. 1"));
        assert!(p.description.starts_with("수많은 마라톤 선수들이 마라톤에 참여하였습니다."));
        assert!(p.description.ends_with("solution 함수를 작성해주세요."));
        assert!(!p.description.contains("제한사항"));
        assert_eq!(
            p.constraints.as_deref(),
            Some(
                "- 마라톤 경기에 참여한 선수의 수는 1명 이상 100,000명 이하입니다.\n- completion의 길이는 participant의 길이보다 1 작습니다.\n- 참가자 중에는 동명이인이 있을 수 있습니다."
            )
        );
        assert_eq!(p.examples.len(), 3);
        assert_eq!(
            p.examples[0],
            Example {
                input: r#"participant=["leo", "kiki", "eden"], completion=["eden", "kiki"]"#.into(),
                output: r#""leo""#.into(),
            }
        );
        assert_eq!(p.examples[2].output, r#""mislav""#);
    }

    #[test]
    fn title_falls_back_to_page_title() {
        let html = fixture().replace("challenge-title", "renamed");
        let p = parse_problem(&html, &lesson()).unwrap();
        assert_eq!(p.title, "완주하지 못한 선수");
    }

    #[test]
    fn body_falls_back_to_tour_step() {
        let html = r#"<html><head><title>소수 찾기 | 프로그래머스</title></head>
<body><div id="tour-main-step"><p>1부터 n 사이의 소수 개수를 구하세요.</p></div></body></html>"#;
        let p = parse_problem(html, &lesson()).unwrap();
        assert_eq!(p.title, "소수 찾기");
        assert_eq!(p.description, "1부터 n 사이의 소수 개수를 구하세요.");
        assert!(p.examples.is_empty());
        assert!(p.constraints.is_none());
    }

    #[test]
    fn only_the_example_table_becomes_examples() {
        let html = r#"<html><head><title>거리 | 프로그래머스</title></head><body>
<div class="guide-section-description"><div class="markdown">
<p>두 점 사이의 거리를 구하세요.</p>
<table><tr><th>이름</th><th>뜻</th></tr><tr><td>d</td><td>거리</td></tr></table>
<h5>입출력 예</h5>
<table><thead><tr><th>a</th><th>b</th><th>result</th></tr></thead>
<tbody><tr><td>1</td><td>4</td><td>3</td></tr></tbody></table>
<h5>입출력 예 설명</h5>
<table><tr><th>step</th><th>value</th></tr><tr><td>9</td><td>9</td></tr></table>
</div></div></body></html>"#;
        let p = parse_problem(html, &lesson()).unwrap();
        assert_eq!(p.title, "거리");
        assert_eq!(
            p.examples,
            vec![Example {
                input: "a=1, b=4".into(),
                output: "3".into()
            }]
        );
        assert!(p.description.starts_with("두 점 사이의 거리를 구하세요."));
        assert!(p.description.contains("d | 거리"));
        assert!(!p.description.contains("step"));
    }

    #[test]
    fn missing_body_is_parse_error() {
        let err = parse_problem("<html><body>로그인이 필요합니다</body></html>", &lesson())
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::ParseError);
    }

    #[tokio::test]
    async fn gone_lesson_is_not_found() {
        let r = lesson();
        let mock = MockTransport::new().reply(&r.canonical_url, MockReply::status(410));
        let scraper = ProgrammersScraper::new(Arc::new(mock), RetryPolicy::default());
        let outcome = scraper.fetch(&r).await;
        assert_eq!(outcome.failure_reason(), Some(FailureReason::NotFound));
    }
}
