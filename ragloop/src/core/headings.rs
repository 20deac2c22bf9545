//! ATX heading segmentation for markdown documents.
//!
//! A heading is a line starting with 1-6 `#` characters followed by a space or
//! tab. Text before the first heading becomes a level-0 preamble segment.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*$").expect("heading regex should compile")
});

/// One heading-delimited slice of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSegment {
    /// Trimmed heading line including its `#` markers (empty for the preamble).
    pub heading: String,
    /// 0 for the preamble, otherwise the number of leading `#`.
    pub level: u8,
    /// Byte range of the content following the heading line.
    pub span: Range<usize>,
}

impl ParsedSegment {
    pub fn content<'a>(&self, text: &'a str) -> &'a str {
        &text[self.span.clone()]
    }
}

/// Split `text` into heading-delimited segments in document order.
///
/// A document without headings yields one level-0 segment covering all of it.
/// Whitespace-only text before the first heading is not kept as a preamble.
pub fn parse_segments(text: &str) -> Vec<ParsedSegment> {
    let matches: Vec<_> = HEADING_RE.captures_iter(text).collect();
    if matches.is_empty() {
        return vec![ParsedSegment {
            heading: String::new(),
            level: 0,
            span: 0..text.len(),
        }];
    }

    let mut segments = Vec::with_capacity(matches.len() + 1);
    let first_start = matches[0].get(0).map_or(0, |m| m.start());
    if first_start > 0 && !text[..first_start].trim().is_empty() {
        segments.push(ParsedSegment {
            heading: String::new(),
            level: 0,
            span: 0..first_start,
        });
    }

    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(hashes)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        segments.push(ParsedSegment {
            heading: whole.as_str().trim().to_string(),
            level: hashes.as_str().len() as u8,
            span: whole.end()..end,
        });
    }

    segments
}

/// Heading level of a single line, or 0 when it is not an ATX heading.
pub fn heading_level(line: &str) -> u8 {
    HEADING_RE
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map_or(0, |m| m.as_str().len() as u8)
}

/// Heading text with the leading `#` markers removed.
pub fn heading_title(heading: &str) -> &str {
    heading.trim_start_matches('#').trim()
}
