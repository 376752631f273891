use std::sync::LazyLock;

use regex::Regex;

use crate::model::Language;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[A-Za-z0-9.-]+(?::\d+)?(?:/[^\s<>"'`]*)?"#).unwrap());

/// Comment delimiters for one language.
#[derive(Debug, Clone, Copy)]
pub struct CommentSyntax {
    pub line: &'static [&'static str],
    pub block: Option<(&'static str, &'static str)>,
}

const C_LIKE: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
};

pub fn comment_syntax(language: Language) -> Option<CommentSyntax> {
    match language {
        Language::C
        | Language::Cpp
        | Language::Java
        | Language::JavaScript
        | Language::TypeScript
        | Language::Go
        | Language::Rust
        | Language::Kotlin
        | Language::Swift => Some(C_LIKE),
        Language::Python => Some(CommentSyntax {
            line: &["#"],
            block: Some(("\"\"\"", "\"\"\"")),
        }),
        Language::Ruby => Some(CommentSyntax {
            line: &["#"],
            block: Some(("=begin", "=end")),
        }),
        Language::Unknown => None,
    }
}

/// Find the problem URL in the file's first non-empty line, if that line is a
/// comment. Nothing beyond that line is inspected.
pub fn extract(content: &str, filename: &str) -> Option<String> {
    let syntax = comment_syntax(Language::from_path(filename))?;
    let first = content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?;

    let body = strip_comment(first, &syntax)?;
    let found = URL_RE.find(body)?.as_str();
    let url = found.trim_end_matches(['.', ',', ')', '>', '"', '\'', ';']);
    Some(url.to_string())
}

fn strip_comment<'a>(line: &'a str, syntax: &CommentSyntax) -> Option<&'a str> {
    // "///", "//!" and "##" count as plain line comments.
    for marker in syntax.line {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim_start_matches(|c: char| c == '/' || c == '!' || c == '#'));
        }
    }
    if let Some((open, close)) = syntax.block {
        if let Some(rest) = line.strip_prefix(open) {
            let rest = rest.trim_start_matches('*');
            let rest = rest.strip_suffix(close).unwrap_or(rest);
            return Some(rest);
        }
    }
    None
}
