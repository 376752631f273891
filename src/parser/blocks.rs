use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*$").unwrap());
static SINGLE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]]*)\]\(([^)\s]+)\)$").unwrap());
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(`{3,}|~{3,})\s*([\w+-]*)\s*$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    Link { text: String, url: String },
    /// Fenced code block; body keeps its original indentation.
    Fence { info: String, body: String },
    Text(String),
    Empty,
}

/// Classify markdown into a flat list of blocks, one per line except fences,
/// which swallow everything up to the matching closer.
pub fn classify_lines(markdown: &str) -> Vec<Block> {
    if markdown.trim().is_empty() {
        return vec![Block::Empty];
    }

    let lines: Vec<&str> = markdown.lines().collect();
    let mut blocks = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if line.is_empty() {
            blocks.push(Block::Empty);
            i += 1;
            continue;
        }

        // ── Fence: ``` or ~~~ up to the same marker ──
        if let Some(caps) = FENCE_RE.captures(line) {
            let marker = caps[1].to_string();
            let info = caps[2].to_string();
            i = consume_fence(&lines, i + 1, &marker, info, &mut blocks);
            continue;
        }

        // ── Heading: ### text ──
        if let Some(caps) = HEADING_RE.captures(line) {
            blocks.push(Block::Heading {
                level: caps[1].len() as u8,
                text: caps[2].to_string(),
            });
            i += 1;
            continue;
        }

        // ── Single link on the line: [text](url) ──
        if let Some(caps) = SINGLE_LINK_RE.captures(line) {
            blocks.push(Block::Link {
                text: caps[1].to_string(),
                url: caps[2].to_string(),
            });
            i += 1;
            continue;
        }

        blocks.push(Block::Text(lines[i].trim_end().to_string()));
        i += 1;
    }

    blocks
}

/// Read fence body lines from `start` until a closing marker. An unclosed
/// fence keeps whatever it collected.
fn consume_fence(
    lines: &[&str],
    start: usize,
    marker: &str,
    info: String,
    blocks: &mut Vec<Block>,
) -> usize {
    let fence_char = if marker.starts_with('~') { '~' } else { '`' };
    let mut body = Vec::new();
    let mut j = start;
    while j < lines.len() {
        let l = lines[j].trim();
        if l.starts_with(marker) && l.chars().all(|c| c == fence_char) {
            blocks.push(Block::Fence {
                info,
                body: body.join("\n"),
            });
            return j + 1;
        }
        body.push(lines[j].trim_end());
        j += 1;
    }
    blocks.push(Block::Fence {
        info,
        body: body.join("\n"),
    });
    j
}

/// Render blocks back to text. Links keep their text only.
pub fn blocks_to_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|b| match b {
            Block::Empty => String::new(),
            Block::Text(t) => t.clone(),
            Block::Heading { text, level } => format!("{} {}", "#".repeat(*level as usize), text),
            Block::Link { text, url } if text.is_empty() => url.clone(),
            Block::Link { text, .. } => text.clone(),
            Block::Fence { body, .. } => format!("```\n{}\n```", body),
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
