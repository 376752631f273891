use super::blocks::Block;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Everything before the first sub-heading (title, link line).
    Header,
    Description,
    Input,
    Output,
    Examples,
    ExampleInput,
    ExampleOutput,
    Constraints,
    Tags,
    Performance,
    Other,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    pub heading: Option<String>,
    pub blocks: Vec<Block>,
}

/// Heading keywords in match order; the first keyword contained in the
/// lowercased heading decides. Example headings come before plain
/// input/output so "예제 입력 1" is not taken for the input format.
const HEADING_KEYWORDS: &[(&str, SectionKind)] = &[
    ("예제 입력", SectionKind::ExampleInput),
    ("sample input", SectionKind::ExampleInput),
    ("example input", SectionKind::ExampleInput),
    ("예제 출력", SectionKind::ExampleOutput),
    ("sample output", SectionKind::ExampleOutput),
    ("example output", SectionKind::ExampleOutput),
    ("입출력 예 설명", SectionKind::Other),
    ("입출력 예", SectionKind::Examples),
    ("예제", SectionKind::Examples),
    ("example", SectionKind::Examples),
    ("sample", SectionKind::Examples),
    ("문제 설명", SectionKind::Description),
    ("description", SectionKind::Description),
    ("statement", SectionKind::Description),
    ("제한", SectionKind::Constraints),
    ("constraint", SectionKind::Constraints),
    ("limit", SectionKind::Constraints),
    ("분류", SectionKind::Tags),
    ("tags", SectionKind::Tags),
    ("성능 요약", SectionKind::Performance),
    ("제출 일자", SectionKind::Other),
    ("입력", SectionKind::Input),
    ("input", SectionKind::Input),
    ("출력", SectionKind::Output),
    ("output", SectionKind::Output),
    ("문제", SectionKind::Description),
    ("problem", SectionKind::Description),
];

pub fn kind_for_heading(heading: &str) -> SectionKind {
    let lower = heading.to_lowercase();
    HEADING_KEYWORDS
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, kind)| *kind)
        .unwrap_or(SectionKind::Other)
}

/// Cluster blocks into sections at every heading of level 2 or deeper.
/// The level-1 heading stays in the header section.
pub fn cluster_sections(blocks: &[Block]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current = Section {
        kind: SectionKind::Header,
        heading: None,
        blocks: Vec::new(),
    };

    for block in blocks {
        match block {
            Block::Heading { level, text } if *level >= 2 => {
                let next = Section {
                    kind: kind_for_heading(text),
                    heading: Some(text.clone()),
                    blocks: Vec::new(),
                };
                let done = std::mem::replace(&mut current, next);
                if done.heading.is_some() || !is_blank(&done.blocks) {
                    sections.push(done);
                }
            }
            _ => current.blocks.push(block.clone()),
        }
    }

    if current.heading.is_some() || !is_blank(&current.blocks) {
        sections.push(current);
    }
    sections
}

fn is_blank(blocks: &[Block]) -> bool {
    blocks.iter().all(|b| matches!(b, Block::Empty))
}

pub fn find_section(sections: &[Section], kind: SectionKind) -> Option<&Section> {
    sections.iter().find(|s| s.kind == kind)
}
