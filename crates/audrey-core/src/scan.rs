//! File scanning: identifier occurrences with line context
//!
//! The scanner is infallible by contract: unreadable files log a warning and
//! contribute zero occurrences, so one bad file never aborts an audit.

use crate::grammar::IdGrammar;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Which part of a repository an occurrence was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Requirement,
    Test,
    Source,
    Doc,
}

impl SourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Requirement => "requirement",
            SourceCategory::Test => "test",
            SourceCategory::Source => "source",
            SourceCategory::Doc => "doc",
        }
    }
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest context line stored per occurrence, in characters.
///
/// Display truncation is the report renderer's job; classification always
/// runs on the stored line. The cap only bounds memory on pathological input.
pub const MAX_SNIPPET_LEN: usize = 500;

/// Marker that makes a test file count as attempting traceability.
pub const STORY_MARKER: &str = "@story";

/// Marker for decorator-style references in implementation sources.
pub const TRACE_MARKER: &str = "@trace";

/// A single identifier occurrence in a scanned file.
///
/// Immutable once produced; the audit only aggregates these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub id: String,
    pub file: PathBuf,
    /// 1-indexed line number.
    pub line: usize,
    pub category: SourceCategory,
    /// The trimmed source line, capped at [`MAX_SNIPPET_LEN`] characters.
    pub snippet: String,
}

static TRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@trace\(\s*["']([^"']+)["']"#).expect("trace pattern is valid"));

/// Read a file leniently: invalid UTF-8 is replaced, read failures become a
/// logged warning and `None`.
pub fn read_lenient(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            tracing::warn!("could not read {}: {}", path.display(), err);
            None
        }
    }
}

/// Scan already-read content for identifier occurrences.
///
/// For the `source` category this also recognizes decorator-style references
/// of the form `@trace("FT-001")`; the captured string is validated against
/// the same grammar before it counts.
pub fn scan_content(
    grammar: &IdGrammar,
    path: &Path,
    content: &str,
    category: SourceCategory,
) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        for m in grammar.find_all(line) {
            occurrences.push(Occurrence {
                id: m.id.to_string(),
                file: path.to_path_buf(),
                line: idx + 1,
                category,
                snippet: clip(line.trim(), MAX_SNIPPET_LEN),
            });
        }
    }

    if category == SourceCategory::Source {
        for captures in TRACE_RE.captures_iter(content) {
            let Some(group) = captures.get(1) else {
                continue;
            };
            if grammar.is_identifier(group.as_str()) {
                occurrences.push(Occurrence {
                    id: group.as_str().to_string(),
                    file: path.to_path_buf(),
                    line: line_of_offset(content, group.start()),
                    category,
                    snippet: "@trace decorator".to_string(),
                });
            }
        }
    }

    occurrences
}

/// Scan a file on disk. Unreadable files yield no occurrences.
pub fn scan_file(grammar: &IdGrammar, path: &Path, category: SourceCategory) -> Vec<Occurrence> {
    match read_lenient(path) {
        Some(content) => scan_content(grammar, path, &content, category),
        None => Vec::new(),
    }
}

fn line_of_offset(content: &str, offset: usize) -> usize {
    content[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

/// Clip to at most `max_chars` characters, on a char boundary.
pub(crate) fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
