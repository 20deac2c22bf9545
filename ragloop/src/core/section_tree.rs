//! Parent/child hierarchy over heading segments.
//!
//! Segments are stored in document order in a fixed `Vec`. Children and skip
//! indices are plain indices into that vector, computed once after parsing.

use serde::Serialize;

use crate::core::headings::{heading_title, parse_segments};

/// A heading-delimited unit of the document plus its summarization state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub heading: String,
    pub level: u8,
    pub content: String,
    /// Indices of direct children, ascending.
    pub children: Vec<usize>,
    /// Index of the first following segment not nested under this one.
    pub skip: usize,
    pub summarized: bool,
    pub summary: String,
}

impl Segment {
    pub fn new(heading: impl Into<String>, level: u8, content: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            level,
            content: content.into(),
            children: Vec::new(),
            skip: 0,
            summarized: false,
            summary: String::new(),
        }
    }

    /// Heading shown in prompts; the preamble has no heading line.
    pub fn display_heading(&self) -> &str {
        if self.heading.is_empty() {
            "(preamble)"
        } else {
            &self.heading
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionTree {
    segments: Vec<Segment>,
}

impl SectionTree {
    /// Parse `text` and link the resulting segments.
    pub fn from_document(text: &str) -> Self {
        let segments = parse_segments(text)
            .into_iter()
            .map(|parsed| {
                let content = parsed.content(text).trim_matches('\n').to_string();
                Segment::new(parsed.heading, parsed.level, content)
            })
            .collect();
        Self::build(segments)
    }

    /// Compute children and skip indices for already-ordered segments.
    ///
    /// A segment `j` is a direct child of `i` when `level[j] == level[i] + 1` and
    /// no segment between them has a level at or above `level[i]`. The first
    /// such terminating segment (or the length) is `i`'s skip index.
    pub fn build(mut segments: Vec<Segment>) -> Self {
        let len = segments.len();
        for i in 0..len {
            let level = segments[i].level;
            let mut children = Vec::new();
            let mut j = i + 1;
            while j < len {
                let next_level = segments[j].level;
                if next_level <= level {
                    break;
                }
                if next_level == level + 1 {
                    children.push(j);
                }
                j += 1;
            }
            segments[i].children = children;
            segments[i].skip = j;
        }
        Self { segments }
    }

    /// Wrap segments as given, without relinking.
    #[cfg(any(test, feature = "test-support"))]
    pub(crate) fn from_raw(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, id: usize) -> Option<&Segment> {
        self.segments.get(id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True iff every direct child of `id` is summarized.
    pub fn can_summarize(&self, id: usize) -> bool {
        self.segments.get(id).is_some_and(|segment| {
            segment
                .children
                .iter()
                .all(|&child| self.segments[child].summarized)
        })
    }

    /// Unsummarized segments in `id+1..skip`, in document order.
    ///
    /// After a level jump (`# T` then `### D`) these include segments that are
    /// nested under `id` without being its direct children.
    pub fn pending_descendants(&self, id: usize) -> Vec<usize> {
        let Some(segment) = self.segments.get(id) else {
            return Vec::new();
        };
        let end = segment.skip.min(self.segments.len());
        (id + 1..end)
            .filter(|&j| !self.segments[j].summarized)
            .collect()
    }

    /// True iff `id` exists and everything nested under it is summarized.
    pub fn subtree_summarized(&self, id: usize) -> bool {
        id < self.segments.len() && self.pending_descendants(id).is_empty()
    }

    /// Segments that are not summarized yet but whose whole subtree is.
    pub fn eligible(&self) -> Vec<usize> {
        (0..self.segments.len())
            .filter(|&id| !self.segments[id].summarized && self.subtree_summarized(id))
            .collect()
    }

    pub fn all_summarized(&self) -> bool {
        self.segments.iter().all(|segment| segment.summarized)
    }

    /// Record a summary for `id`.
    ///
    /// Rejects unknown ids, segments already summarized, and segments with any
    /// nested segment still lacking a summary.
    pub fn mark_summarized(&mut self, id: usize, summary: &str) -> Result<(), String> {
        let Some(segment) = self.segments.get(id) else {
            return Err(format!(
                "id {} out of range [0, {}]",
                id,
                self.segments.len().saturating_sub(1)
            ));
        };
        if segment.summarized {
            return Err(format!("id {} is already summarized", id));
        }
        let pending = self.pending_descendants(id);
        if !pending.is_empty() {
            let pending: Vec<String> = pending
                .into_iter()
                .map(|j| format!("{} ({})", j, self.segments[j].display_heading()))
                .collect();
            return Err(format!(
                "id {} can not be summarized before its sub sections: {}",
                id,
                pending.join(", ")
            ));
        }
        let segment = &mut self.segments[id];
        segment.summarized = true;
        segment.summary = summary.trim().to_string();
        Ok(())
    }

    /// Titles of the headings enclosing `id`, outermost first, ending with `id`.
    pub fn heading_path(&self, id: usize) -> Vec<String> {
        let Some(target) = self.segments.get(id) else {
            return Vec::new();
        };
        let mut path = vec![target.heading.clone()];
        let mut level = target.level;
        for segment in self.segments[..id].iter().rev() {
            if level == 0 {
                break;
            }
            if segment.level < level && segment.level > 0 {
                path.push(segment.heading.clone());
                level = segment.level;
            }
        }
        path.reverse();
        path.retain(|heading| !heading.is_empty());
        path
    }

    /// Summaries of all summarized headed segments, for indexing.
    pub fn summaries(&self) -> Vec<SectionSummaryRecord> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.summarized)
            .map(|(id, segment)| SectionSummaryRecord {
                headings: self.heading_path(id),
                summary: segment.summary.clone(),
                subsections: segment
                    .children
                    .iter()
                    .map(|&child| heading_title(&self.segments[child].heading).to_string())
                    .collect(),
            })
            .collect()
    }
}

/// A finished section summary with its place in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummaryRecord {
    pub headings: Vec<String>,
    pub summary: String,
    pub subsections: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{levels_tree, summarize_all};

    #[test]
    fn title_document_builds_expected_hierarchy() {
        let tree = SectionTree::from_document("# Title\nintro\n## A\na\n## B\nb\n### B.1\nb1\n");
        let headings: Vec<&str> = tree.segments().iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["# Title", "## A", "## B", "### B.1"]);
        assert_eq!(tree.get(0).map(|s| s.children.clone()), Some(vec![1, 2]));
        assert_eq!(tree.get(1).map(|s| s.children.clone()), Some(vec![]));
        assert_eq!(tree.get(2).map(|s| s.children.clone()), Some(vec![3]));
        assert_eq!(tree.get(3).map(|s| s.children.clone()), Some(vec![]));
        assert_eq!(tree.get(0).map(|s| s.content.as_str()), Some("intro"));
    }

    #[test]
    fn skip_index_spans_exact_descendants() {
        let tree = levels_tree(&[1, 2, 3, 3, 2, 1, 2]);
        let skips: Vec<usize> = tree.segments().iter().map(|s| s.skip).collect();
        assert_eq!(skips, vec![5, 4, 3, 4, 5, 7, 7]);
    }

    /// Every level sequence of length `len` over `1..=max_level`.
    fn level_sequences(len: usize, max_level: u8) -> Vec<Vec<u8>> {
        let mut sequences = vec![Vec::new()];
        for _ in 0..len {
            sequences = sequences
                .into_iter()
                .flat_map(|prefix| {
                    (1..=max_level).map(move |level| {
                        let mut next = prefix.clone();
                        next.push(level);
                        next
                    })
                })
                .collect();
        }
        sequences
    }

    /// Descendants found by walking parent links: the parent of `j` is the
    /// nearest earlier segment with a lower level.
    fn descendants_by_parent_chain(levels: &[u8], ancestor: usize) -> Vec<usize> {
        let parent = |j: usize| (0..j).rev().find(|&k| levels[k] < levels[j]);
        (ancestor + 1..levels.len())
            .filter(|&j| {
                let mut current = parent(j);
                while let Some(k) = current {
                    if k == ancestor {
                        return true;
                    }
                    current = parent(k);
                }
                false
            })
            .collect()
    }

    #[test]
    fn skip_index_matches_transitive_descendants_for_all_small_sequences() {
        for len in 0..=6 {
            for levels in level_sequences(len, 4) {
                let mut with_preamble = vec![0];
                with_preamble.extend_from_slice(&levels);
                for levels in [levels, with_preamble] {
                    let tree = levels_tree(&levels);
                    for (i, segment) in tree.segments().iter().enumerate() {
                        let range: Vec<usize> = (i + 1..segment.skip).collect();
                        assert_eq!(
                            range,
                            descendants_by_parent_chain(&levels, i),
                            "levels {levels:?}, segment {i}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn level_jump_is_descendant_but_not_child() {
        // A level-3 segment directly under a level-1 one is nested (skip covers it)
        // but is not a direct child.
        let tree = levels_tree(&[1, 3, 2]);
        assert_eq!(tree.get(0).map(|s| s.children.clone()), Some(vec![2]));
        assert_eq!(tree.get(0).map(|s| s.skip), Some(3));
    }

    #[test]
    fn can_summarize_only_looks_at_direct_children() {
        let mut tree = levels_tree(&[1, 2, 3, 2]);
        // Grandchild (index 2) stays unsummarized; direct children 1 and 3 are marked
        // by hand to isolate the gate.
        tree.segments[1].summarized = true;
        tree.segments[3].summarized = true;
        assert!(tree.can_summarize(0));
        tree.segments[3].summarized = false;
        assert!(!tree.can_summarize(0));
    }

    #[test]
    fn level_jump_descendant_gates_its_ancestor() {
        let mut tree = SectionTree::from_document("# T\nbody\n### Deep\nhidden text\n");
        assert!(tree.can_summarize(0), "no direct children");
        assert_eq!(tree.eligible(), vec![1]);
        let err = tree.mark_summarized(0, "t").unwrap_err();
        assert!(err.contains("before its sub sections: 1 (### Deep)"), "{err}");

        tree.mark_summarized(1, "deep").expect("leaf");
        assert_eq!(tree.eligible(), vec![0]);
        tree.mark_summarized(0, "t").expect("subtree done");
        assert!(tree.all_summarized());
    }

    #[test]
    fn title_requires_every_child_before_summary() {
        let mut tree = SectionTree::from_document("# Title\n## A\n## B\n### B.1\n");
        tree.mark_summarized(3, "b1").expect("leaf");
        tree.mark_summarized(2, "b").expect("b after b1");
        assert!(!tree.can_summarize(0));
        tree.mark_summarized(1, "a").expect("a");
        assert!(tree.can_summarize(0));
    }

    #[test]
    fn mark_summarized_rejects_invalid_requests() {
        let mut tree = SectionTree::from_document("# Title\n## A\n");
        assert_eq!(
            tree.mark_summarized(9, "x"),
            Err("id 9 out of range [0, 1]".to_string())
        );
        let err = tree.mark_summarized(0, "x").unwrap_err();
        assert!(err.contains("before its sub sections: 1 (## A)"), "{err}");
        tree.mark_summarized(1, "a").expect("leaf");
        assert_eq!(
            tree.mark_summarized(1, "again"),
            Err("id 1 is already summarized".to_string())
        );
    }

    #[test]
    fn eligible_tracks_bottom_up_progress() {
        let mut tree = levels_tree(&[1, 2, 2]);
        assert_eq!(tree.eligible(), vec![1, 2]);
        summarize_all(&mut tree, &[1, 2]);
        assert_eq!(tree.eligible(), vec![0]);
        summarize_all(&mut tree, &[0]);
        assert!(tree.all_summarized());
        assert!(tree.eligible().is_empty());
    }

    #[test]
    fn heading_path_walks_up_enclosing_levels() {
        let tree = SectionTree::from_document("# T\n## A\n### A.1\n## B\n### B.1\n");
        assert_eq!(tree.heading_path(4), vec!["# T", "## B", "### B.1"]);
        assert_eq!(tree.heading_path(0), vec!["# T"]);
    }

    #[test]
    fn summaries_include_subsection_titles() {
        let mut tree = SectionTree::from_document("# T\n## A\n## B\n");
        summarize_all(&mut tree, &[1, 2, 0]);
        let records = tree.summaries();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].headings, vec!["# T"]);
        assert_eq!(records[0].subsections, vec!["A", "B"]);
    }
}
