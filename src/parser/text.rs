use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

static BLANKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "ul", "ol", "li", "table", "tr", "h1", "h2", "h3", "h4",
    "h5", "h6", "blockquote", "pre", "hr", "dl", "dt", "dd",
];

const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "template", "button"];

/// Render an element's content as plain text with light markdown: paragraph
/// breaks between blocks, `- ` bullets, fenced `<pre>`, `^`/`_` for sup/sub.
pub fn element_text(el: ElementRef) -> String {
    let mut out = String::new();
    render(el, &mut out);
    normalize(&out)
}

/// Same as [`element_text`] but for an HTML fragment string.
pub fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    element_text(fragment.root_element())
}

/// Text of a `<pre>`-like element with whitespace preserved, trailing
/// whitespace on each line and surrounding blank lines removed.
pub fn preformatted(el: ElementRef) -> String {
    let raw: String = el.text().collect();
    raw.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

/// Collapsed single-line text, for titles and table cells.
pub fn inline_text(el: ElementRef) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape a text node so it can be spliced back into an HTML string.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn select_first<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    doc.select(selector).next()
}

fn render(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.replace(['\n', '\r'], " ")),
            Node::Element(e) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = e.name();
                if SKIP_TAGS.contains(&name) {
                    continue;
                }
                match name {
                    "br" => out.push('\n'),
                    "img" => {
                        let alt = e.attr("alt").unwrap_or("").trim();
                        if alt.is_empty() {
                            out.push_str("[image]");
                        } else {
                            out.push_str(&format!("[image: {}]", alt));
                        }
                    }
                    "sup" => {
                        out.push('^');
                        render(child_el, out);
                    }
                    "sub" => {
                        out.push('_');
                        render(child_el, out);
                    }
                    "pre" => {
                        out.push_str("\n\n```\n");
                        out.push_str(&preformatted(child_el));
                        out.push_str("\n```\n\n");
                    }
                    "li" => {
                        out.push_str("\n- ");
                        render(child_el, out);
                    }
                    "td" | "th" => {
                        render(child_el, out);
                        out.push_str(" | ");
                    }
                    _ if BLOCK_TAGS.contains(&name) => {
                        out.push_str("\n\n");
                        render(child_el, out);
                        out.push_str("\n\n");
                    }
                    _ => render(child_el, out),
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of spaces outside fenced blocks, trim each line and cap
/// blank runs at one empty line.
pub fn normalize(text: &str) -> String {
    let mut lines = Vec::new();
    let mut fenced = false;
    for line in text.replace("\r\n", "\n").lines() {
        if line.trim() == "```" {
            fenced = !fenced;
            lines.push("```".to_string());
            continue;
        }
        if fenced {
            lines.push(line.trim_end().to_string());
        } else {
            let collapsed = SPACES_RE.replace_all(line.trim(), " ");
            let cleaned = collapsed.trim_end_matches(" |").trim();
            lines.push(cleaned.to_string());
        }
    }
    let joined = lines.join("\n");
    BLANKS_RE.replace_all(&joined, "\n\n").trim().to_string()
}
