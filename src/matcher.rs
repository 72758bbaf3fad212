//! Expected-answer patterns and match highlighting.
//!
//! An expected value such as `The /pitch lake/ in /trinidad/` holds one
//! case-insensitive regex per slash-delimited segment; the text outside the
//! slashes is ignored. A value without any segment is itself the regex. A
//! check passes when every pattern matches somewhere in the target.

use crate::ansi::NORMAL;
use regex::{Regex, RegexBuilder};
use std::fmt;

/// One compiled expectation.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source` case-insensitively.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source).case_insensitive(true).build()?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Match `source` as plain text, case-insensitively.
    pub fn literal(source: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&regex::escape(source))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// First match in `text`.
    pub fn find(&self, text: &str) -> Option<Span> {
        self.regex.find(text).map(|m| Span {
            index: m.start(),
            length: m.len(),
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

/// Byte range of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub index: usize,
    pub length: usize,
}

/// Split an expected value into patterns.
///
/// A segment opens at `/` and closes at the next `/` not preceded by `\`.
/// Scanning stops at the first segment left open. Segments that are not
/// valid regexes are skipped. When no pattern results, the whole value is
/// compiled as one regex, or matched literally if it is not a valid one.
pub fn regexify(expected: &str) -> Vec<Pattern> {
    let bytes = expected.as_bytes();
    let mut patterns = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(open) = bytes[pos..].iter().position(|&b| b == b'/').map(|i| pos + i) else {
            break;
        };
        let close = (open + 1..bytes.len()).find(|&i| bytes[i] == b'/' && bytes[i - 1] != b'\\');
        let Some(close) = close else {
            break;
        };

        let interior = expected[open + 1..close].replace("\\/", "/");
        match Pattern::new(&interior) {
            Ok(pattern) => patterns.push(pattern),
            Err(e) => tracing::warn!(segment = %interior, error = %e, "skipping invalid pattern"),
        }
        pos = close + 1;
    }

    if patterns.is_empty() {
        let whole = Pattern::new(expected).or_else(|e| {
            tracing::warn!(expected, error = %e, "not a regex, matching literally");
            Pattern::literal(expected)
        });
        match whole {
            Ok(pattern) => patterns.push(pattern),
            Err(e) => tracing::warn!(expected, error = %e, "expected value cannot be matched"),
        }
    }

    patterns
}

/// First match of each pattern; patterns that do not match contribute nothing.
pub fn find_spans(text: &str, patterns: &[Pattern]) -> Vec<Span> {
    patterns.iter().filter_map(|p| p.find(text)).collect()
}

/// Outcome of checking one target against an expected value.
#[derive(Debug, Clone)]
pub struct Check {
    pub patterns: Vec<Pattern>,
    pub spans: Vec<Span>,
}

impl Check {
    pub fn run(target: &str, expected: &str) -> Self {
        let patterns = regexify(expected);
        let spans = find_spans(target, &patterns);
        Self { patterns, spans }
    }

    /// Every pattern found a match.
    pub fn passed(&self) -> bool {
        self.spans.len() == self.patterns.len()
    }

    /// Patterns as `/a/,/b/`.
    pub fn expected(&self) -> String {
        self.patterns
            .iter()
            .map(Pattern::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Wrap each span of `text` in `color` ... reset.
///
/// Spans are applied from the rightmost start leftwards so earlier offsets
/// stay valid. A span reaching into one already applied is cut at its start.
pub fn highlight(text: &str, spans: &[Span], color: &str) -> String {
    let mut sorted = spans.to_vec();
    sorted.sort_by(|a, b| b.index.cmp(&a.index));

    let mut result = text.to_string();
    let mut limit = text.len();
    for span in sorted {
        let start = span.index.min(limit);
        let end = (span.index + span.length).min(limit);
        result.insert_str(end, NORMAL);
        result.insert_str(start, color);
        limit = start;
    }
    result
}
