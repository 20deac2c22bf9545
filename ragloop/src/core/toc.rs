//! Paragraph-level table of contents with range folding.
//!
//! The document is a flat list of paragraphs. Sections are recorded as
//! paragraph ranges; a range with `end == -1` has not been seen to its end yet.
//! Covered ranges fold into one line each so the prompt only carries raw text
//! that still needs structure.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PARAGRAPH_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("paragraph regex should compile"));

/// End marker for a section whose last paragraph is not known yet.
pub const UNKNOWN_END: i64 = -1;

/// Split on runs of blank lines; empty paragraphs are dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK_RE
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub name: String,
    pub level: u32,
    pub start: usize,
    pub end: i64,
}

impl TocEntry {
    pub fn known_end(&self) -> Option<usize> {
        usize::try_from(self.end).ok()
    }

    fn range(&self) -> Option<(usize, usize)> {
        self.known_end().map(|end| (self.start, end))
    }
}

/// Summary of an inclusive paragraph range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeSummary {
    pub start: usize,
    pub end: usize,
    pub content: String,
}

/// One line of the heading outline (`id content (line n)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub id: String,
    pub content: String,
    pub line: u64,
}

/// True when the two inclusive ranges intersect without one containing the other.
pub fn partially_overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    let disjoint = a.1 < b.0 || b.1 < a.0;
    let a_in_b = b.0 <= a.0 && a.1 <= b.1;
    let b_in_a = a.0 <= b.0 && b.1 <= a.1;
    !(disjoint || a_in_b || b_in_a)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TocRecorder {
    paragraphs: Vec<String>,
    entries: Vec<TocEntry>,
    summaries: Vec<RangeSummary>,
    outline: Vec<OutlineEntry>,
    /// Paragraphs revealed past the window by `load_paragraphs`.
    extra: usize,
}

enum Fold<'a> {
    Section(&'a TocEntry, usize),
    Summary(&'a RangeSummary),
}

impl Fold<'_> {
    fn range(&self) -> (usize, usize) {
        match self {
            Fold::Section(entry, end) => (entry.start, *end),
            Fold::Summary(summary) => (summary.start, summary.end),
        }
    }
}

impl TocRecorder {
    pub fn new(paragraphs: Vec<String>) -> Self {
        Self {
            paragraphs,
            ..Self::default()
        }
    }

    pub fn from_document(text: &str) -> Self {
        Self::new(split_paragraphs(text))
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn total_paragraphs(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn summaries(&self) -> &[RangeSummary] {
        &self.summaries
    }

    pub fn outline(&self) -> &[OutlineEntry] {
        &self.outline
    }

    fn validate_entry(&self, entry: &TocEntry) -> Result<(), String> {
        let total = self.total_paragraphs();
        if entry.start >= total {
            return Err(format!(
                "section {} start {} out of range [0, {}]",
                entry.name,
                entry.start,
                total.saturating_sub(1)
            ));
        }
        if entry.end == UNKNOWN_END {
            return Ok(());
        }
        match entry.known_end() {
            Some(end) if end >= entry.start && end < total => Ok(()),
            _ => Err(format!(
                "section {} range [{}, {}] is invalid, expected start <= end <= {}",
                entry.name,
                entry.start,
                entry.end,
                total.saturating_sub(1)
            )),
        }
    }

    /// Replace the whole table. Nothing changes when any entry is rejected.
    pub fn record_toc(&mut self, mut entries: Vec<TocEntry>) -> Result<(), String> {
        for entry in &entries {
            self.validate_entry(entry)?;
        }
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if let (Some(ra), Some(rb)) = (a.range(), b.range())
                    && partially_overlaps(ra, rb)
                {
                    return Err(overlap_message(&a.name, ra, &b.name, rb));
                }
            }
            if let Some(range) = a.range() {
                self.check_summaries(&a.name, range)?;
            }
        }
        let before = self.frontier();
        entries.sort_by_key(|entry| entry.start);
        self.entries = entries;
        self.reset_extra_if_advanced(before);
        Ok(())
    }

    /// Add one known-end section to the stored table.
    ///
    /// The level is the nesting depth among stored sections; sections the new
    /// one encloses move one level down.
    pub fn mark_section(&mut self, start: usize, end: usize, name: &str) -> Result<(), String> {
        let end_marker = i64::try_from(end).map_err(|_| format!("end {} is too large", end))?;
        let mut entry = TocEntry {
            name: name.trim().to_string(),
            level: 1,
            start,
            end: end_marker,
        };
        self.validate_entry(&entry)?;
        let range = (start, end);
        for existing in &self.entries {
            if let Some(other) = existing.range()
                && partially_overlaps(range, other)
            {
                return Err(overlap_message(&entry.name, range, &existing.name, other));
            }
        }
        self.check_summaries(&entry.name, range)?;

        let contains = |outer: (usize, usize), inner: (usize, usize)| {
            outer.0 <= inner.0 && inner.1 <= outer.1
        };
        let depth = self
            .entries
            .iter()
            .filter_map(TocEntry::range)
            .filter(|&other| contains(other, range))
            .count();
        entry.level = u32::try_from(depth).unwrap_or(u32::MAX).saturating_add(1);
        for existing in &mut self.entries {
            if let Some(other) = existing.range()
                && other != range
                && contains(range, other)
            {
                existing.level = existing.level.saturating_add(1);
            }
        }

        let before = self.frontier();
        let at = self.entries.partition_point(|other| other.start <= start);
        self.entries.insert(at, entry);
        self.reset_extra_if_advanced(before);
        Ok(())
    }

    /// Reveal up to `min(number, cap)` more paragraphs. Returns how many were added.
    pub fn load_paragraphs(&mut self, number: usize, window: usize, cap: usize) -> usize {
        let visible_end = self.visible_end(window);
        let added = number.min(cap).min(self.total_paragraphs() - visible_end);
        self.extra += added;
        added
    }

    /// Summarize the visible paragraphs from the one starting with `start_words`
    /// to the one starting with `end_words`.
    pub fn summarize_range(
        &mut self,
        start_words: &str,
        end_words: &str,
        content: &str,
        window: usize,
    ) -> Result<(usize, usize), String> {
        let visible = self.visible_ids(window);
        let find = |words: &str, from: usize| {
            visible
                .iter()
                .copied()
                .filter(|&id| id >= from)
                .find(|&id| starts_with_words(&self.paragraphs[id], words))
        };
        let start = find(start_words, 0)
            .ok_or_else(|| format!("no visible paragraph starts with \"{}\"", start_words.trim()))?;
        let end = find(end_words, start).ok_or_else(|| {
            format!(
                "no visible paragraph at or after [{}] starts with \"{}\"",
                start,
                end_words.trim()
            )
        })?;
        for existing in &self.summaries {
            if partially_overlaps((start, end), (existing.start, existing.end)) {
                return Err(format!(
                    "summary range [{}-{}] overlaps summary [{}-{}]",
                    start, end, existing.start, existing.end
                ));
            }
        }
        for entry in &self.entries {
            if let Some(other) = entry.range()
                && partially_overlaps((start, end), other)
            {
                return Err(format!(
                    "summary range [{}-{}] overlaps section {} [{}-{}]",
                    start, end, entry.name, other.0, other.1
                ));
            }
        }

        let before = self.frontier();
        let at = self.summaries.partition_point(|other| other.start <= start);
        self.summaries.insert(
            at,
            RangeSummary {
                start,
                end,
                content: content.trim().to_string(),
            },
        );
        self.reset_extra_if_advanced(before);
        Ok((start, end))
    }

    /// A section may nest with a range summary but never straddle one.
    fn check_summaries(&self, name: &str, range: (usize, usize)) -> Result<(), String> {
        match self
            .summaries
            .iter()
            .map(|summary| (summary.start, summary.end))
            .find(|&other| partially_overlaps(range, other))
        {
            Some(other) => Err(overlap_message(name, range, "summary", other)),
            None => Ok(()),
        }
    }

    pub fn update_outline(&mut self, outline: Vec<OutlineEntry>) {
        self.outline = outline;
    }

    /// One past the highest paragraph covered by a known-end section or summary.
    pub fn frontier(&self) -> usize {
        self.entries
            .iter()
            .filter_map(TocEntry::known_end)
            .chain(self.summaries.iter().map(|summary| summary.end))
            .map(|end| end + 1)
            .max()
            .unwrap_or(0)
    }

    fn visible_end(&self, window: usize) -> usize {
        (self.frontier() + window + self.extra).min(self.total_paragraphs())
    }

    fn reset_extra_if_advanced(&mut self, before: usize) {
        if self.frontier() > before {
            self.extra = 0;
        }
    }

    /// Outermost covered ranges, in document order.
    fn outer_folds(&self) -> Vec<Fold<'_>> {
        let mut folds: Vec<Fold<'_>> = self
            .entries
            .iter()
            .filter_map(|entry| entry.known_end().map(|end| Fold::Section(entry, end)))
            .chain(self.summaries.iter().map(Fold::Summary))
            .collect();
        // Wider ranges first so an enclosing section wins over what it contains.
        folds.sort_by_key(|fold| {
            let (start, end) = fold.range();
            (start, std::cmp::Reverse(end))
        });
        let mut outer: Vec<Fold<'_>> = Vec::new();
        for fold in folds {
            let covered = outer
                .last()
                .is_some_and(|last| fold.range().0 <= last.range().1);
            if !covered {
                outer.push(fold);
            }
        }
        outer
    }

    /// Paragraph ids rendered as raw text: gaps between folds plus the window.
    pub fn visible_ids(&self, window: usize) -> Vec<usize> {
        let mut ids = Vec::new();
        let mut next = 0;
        for fold in self.outer_folds() {
            let (start, end) = fold.range();
            ids.extend(next..start);
            next = end + 1;
        }
        ids.extend(next..self.visible_end(window).max(next));
        ids
    }

    /// Render folded ranges, gap paragraphs, then the raw window.
    pub fn render_window(&self, window: usize) -> String {
        let mut out = String::new();
        let mut next = 0;
        for fold in self.outer_folds() {
            let (start, end) = fold.range();
            for id in next..start {
                let _ = writeln!(out, "[{}]: {}", id, self.paragraphs[id]);
            }
            match fold {
                Fold::Section(entry, _) => {
                    let _ = writeln!(
                        out,
                        "[{}-{}]: section: {} (level {}) <FOLDED>",
                        start, end, entry.name, entry.level
                    );
                    for summary in self.summaries.iter().filter(|summary| {
                        start <= summary.start && summary.end <= end
                    }) {
                        let _ = writeln!(
                            out,
                            "  [{}-{}]: summary: {}",
                            summary.start, summary.end, summary.content
                        );
                    }
                }
                Fold::Summary(summary) => {
                    let _ = writeln!(out, "[{}-{}]: summary: {} <FOLDED>", start, end, summary.content);
                }
            }
            out.push('\n');
            next = end + 1;
        }
        let end = self.visible_end(window).max(next);
        for id in next..end {
            let _ = writeln!(out, "[{}]: {}", id, self.paragraphs[id]);
        }
        let _ = write!(
            out,
            "\n** {} paragraphs remaining **\n",
            self.total_paragraphs() - end
        );
        out
    }

    /// Recorded sections, indented by level.
    pub fn render_entries(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{}{} (start: {}, end: {})",
                "  ".repeat(entry.level.saturating_sub(1) as usize),
                entry.name,
                entry.start,
                entry.end
            );
        }
        out
    }

    pub fn render_outline(&self) -> String {
        let mut out = String::new();
        for entry in &self.outline {
            let _ = writeln!(out, "{} {} (line {})", entry.id, entry.content, entry.line);
        }
        out
    }

    /// Every paragraph lies in a known-end section or a range summary.
    pub fn is_complete(&self) -> bool {
        let mut covered = vec![false; self.total_paragraphs()];
        let ranges = self
            .entries
            .iter()
            .filter_map(TocEntry::range)
            .chain(self.summaries.iter().map(|summary| (summary.start, summary.end)));
        for (start, end) in ranges {
            for slot in covered.iter_mut().take(end + 1).skip(start) {
                *slot = true;
            }
        }
        covered.iter().all(|&slot| slot)
    }
}

fn overlap_message(a: &str, ra: (usize, usize), b: &str, rb: (usize, usize)) -> String {
    format!(
        "section range is invalid, section {} [{}-{}] and {} [{}-{}] partially overlap",
        a, ra.0, ra.1, b, rb.0, rb.1
    )
}

fn starts_with_words(paragraph: &str, words: &str) -> bool {
    let wanted: Vec<&str> = words.split_whitespace().collect();
    if wanted.is_empty() {
        return false;
    }
    let mut actual = paragraph.split_whitespace();
    wanted.iter().all(|word| actual.next() == Some(*word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(count: usize) -> TocRecorder {
        TocRecorder::new((0..count).map(|i| format!("paragraph {i} text")).collect())
    }

    fn entry(name: &str, start: usize, end: i64) -> TocEntry {
        TocEntry {
            name: name.to_string(),
            level: 1,
            start,
            end,
        }
    }

    #[test]
    fn split_drops_blank_runs() {
        let paragraphs = split_paragraphs("# Title\n\nfirst line\nsecond line\n\n\n\nlast\n\n");
        assert_eq!(paragraphs, vec!["# Title", "first line\nsecond line", "last"]);
    }

    #[test]
    fn record_rejects_partial_overlap_and_keeps_previous_table() {
        let mut toc = recorder(60);
        toc.record_toc(vec![entry("Intro", 0, 5)]).expect("valid table");
        let err = toc
            .record_toc(vec![entry("A", 10, 20), entry("B", 15, 25)])
            .unwrap_err();
        assert!(err.contains("A [10-20]"), "{err}");
        assert!(err.contains("B [15-25]"), "{err}");
        assert_eq!(toc.entries(), &[entry("Intro", 0, 5)]);
    }

    #[test]
    fn record_accepts_nested_and_replaces_wholesale() {
        let mut toc = recorder(60);
        toc.record_toc(vec![entry("Old", 0, 3)]).expect("first");
        toc.record_toc(vec![entry("Inner", 10, 20), entry("Outer", 0, 50)])
            .expect("nested is fine");
        let names: Vec<&str> = toc.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Outer", "Inner"]);
    }

    #[test]
    fn unknown_end_skips_overlap_check() {
        let mut toc = recorder(30);
        toc.record_toc(vec![entry("Open", 5, UNKNOWN_END), entry("A", 0, 10)])
            .expect("unknown end never overlaps");
        assert_eq!(toc.frontier(), 11);
    }

    #[test]
    fn record_validates_bounds() {
        let mut toc = recorder(10);
        assert!(toc.record_toc(vec![entry("Late", 12, UNKNOWN_END)]).is_err());
        assert!(toc.record_toc(vec![entry("Reversed", 5, 3)]).is_err());
        assert!(toc.record_toc(vec![entry("Past", 5, 10)]).is_err());
        assert!(toc.record_toc(vec![entry("Bad", 2, -5)]).is_err());
        assert!(toc.record_toc(vec![entry("Last", 5, 9)]).is_ok());
    }

    #[test]
    fn mark_section_derives_levels_from_nesting() {
        let mut toc = recorder(60);
        toc.mark_section(10, 20, "Child").expect("child");
        toc.mark_section(0, 50, "Parent").expect("parent");
        toc.mark_section(12, 14, "Grandchild").expect("grandchild");
        let levels: Vec<(&str, u32)> = toc
            .entries()
            .iter()
            .map(|e| (e.name.as_str(), e.level))
            .collect();
        assert_eq!(levels, vec![("Parent", 1), ("Child", 2), ("Grandchild", 3)]);

        let err = toc.mark_section(15, 25, "Straddle").unwrap_err();
        assert!(err.contains("Straddle [15-25]") && err.contains("Child [10-20]"), "{err}");
    }

    #[test]
    fn window_folds_outermost_ranges_and_counts_remaining() {
        let mut toc = recorder(12);
        toc.record_toc(vec![entry("A", 0, 3), entry("A.1", 1, 2), entry("B", 5, 6)])
            .expect("table");
        let rendered = toc.render_window(2);
        assert!(rendered.contains("[0-3]: section: A (level 1) <FOLDED>"));
        assert!(!rendered.contains("A.1"));
        assert!(rendered.contains("[4]: paragraph 4 text"));
        assert!(rendered.contains("[5-6]: section: B (level 1) <FOLDED>"));
        assert!(rendered.contains("[7]: paragraph 7 text"));
        assert!(rendered.contains("[8]: paragraph 8 text"));
        assert!(!rendered.contains("[9]:"));
        assert!(rendered.ends_with("** 3 paragraphs remaining **\n"));
    }

    #[test]
    fn load_paragraphs_is_capped_and_resets_when_frontier_moves() {
        let mut toc = recorder(40);
        assert_eq!(toc.load_paragraphs(9, 10, 5), 5);
        assert_eq!(toc.visible_ids(10).len(), 15);
        toc.mark_section(0, 2, "Head").expect("mark");
        assert_eq!(toc.visible_ids(10), (3..13).collect::<Vec<_>>());
        let mut short = recorder(4);
        assert_eq!(short.load_paragraphs(5, 3, 5), 1);
    }

    #[test]
    fn summarize_matches_visible_paragraphs_by_leading_words() {
        let mut toc = TocRecorder::from_document(
            "Alpha beta gamma delta\n\nSecond one here\n\nThird paragraph ends\n\nFar away",
        );
        let range = toc
            .summarize_range("Alpha beta", "Third paragraph", "first three", 3)
            .expect("visible range");
        assert_eq!(range, (0, 2));
        let rendered = toc.render_window(3);
        assert!(rendered.contains("[0-2]: summary: first three <FOLDED>"));
        assert!(rendered.contains("[3]: Far away"));

        let err = toc.summarize_range("Nowhere", "Far", "x", 3).unwrap_err();
        assert!(err.contains("Nowhere"));
    }

    #[test]
    fn sections_and_summaries_never_straddle_each_other() {
        let mut toc = recorder(8);
        toc.summarize_range("paragraph 0", "paragraph 2", "opening", 8)
            .expect("summary");

        let err = toc.mark_section(1, 4, "Straddle").unwrap_err();
        assert!(err.contains("Straddle [1-4] and summary [0-2]"), "{err}");
        let err = toc.record_toc(vec![entry("Straddle", 2, 5)]).unwrap_err();
        assert!(err.contains("summary [0-2]"), "{err}");
        assert!(toc.entries().is_empty());

        toc.mark_section(0, 4, "Opening").expect("encloses the summary");
        let rendered = toc.render_window(2);
        assert!(rendered.contains("[0-4]: section: Opening (level 1) <FOLDED>"), "{rendered}");
        assert!(rendered.contains("  [0-2]: summary: opening"));
        assert!(!rendered.contains("[3]:"));

        toc.summarize_range("paragraph 5", "paragraph 6", "closing", 2)
            .expect("after the section");
        let err = toc
            .record_toc(vec![entry("Opening", 0, 4), entry("Tail", 6, 7)])
            .unwrap_err();
        assert!(err.contains("Tail [6-7] and summary [5-6]"), "{err}");
        assert_eq!(toc.entries().len(), 1);
    }

    #[test]
    fn completion_requires_full_coverage() {
        let mut toc = recorder(6);
        toc.record_toc(vec![entry("A", 0, 2)]).expect("a");
        assert!(!toc.is_complete());
        toc.mark_section(3, 5, "B").expect("b");
        assert!(toc.is_complete());
        assert!(TocRecorder::from_document("").is_complete());
    }

    #[test]
    fn outline_renders_id_content_and_line() {
        let mut toc = recorder(1);
        toc.update_outline(vec![OutlineEntry {
            id: "1.2".to_string(),
            content: "Results".to_string(),
            line: 42,
        }]);
        assert_eq!(toc.render_outline(), "1.2 Results (line 42)\n");
    }
}
