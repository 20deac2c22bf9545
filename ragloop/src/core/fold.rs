//! Window folding over a section tree.
//!
//! Summarized subtrees collapse into one line and are free; only segments that
//! still need work count against the window.

use serde::Serialize;

use crate::core::section_tree::SectionTree;

/// How a segment appears in a folded view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldMode {
    /// Heading followed by the raw content.
    Full,
    /// Heading followed by the summary; stands in for `id..skip`.
    Collapsed { skip: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FoldedItem {
    pub id: usize,
    pub mode: FoldMode,
}

/// Read-only projection of the prefix of a tree that fits the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoldedView {
    pub items: Vec<FoldedItem>,
    /// Index one past the last segment covered by the view.
    pub end: usize,
    /// Number of `Full` items (never more than the window).
    pub open_count: usize,
}

impl FoldedView {
    /// Segment ids in the view that may be summarized this round.
    pub fn eligible(&self, tree: &SectionTree) -> Vec<usize> {
        self.items
            .iter()
            .filter(|item| matches!(item.mode, FoldMode::Full) && tree.subtree_summarized(item.id))
            .map(|item| item.id)
            .collect()
    }

    /// Segments past the end of the view.
    pub fn remaining(&self, tree: &SectionTree) -> usize {
        tree.len().saturating_sub(self.end)
    }
}

/// Walk the tree left to right and stop once `window` unsummarized segments
/// have been counted.
///
/// A summarized segment is not counted. It jumps to its skip index only when
/// its whole subtree is summarized; otherwise it collapses alone and the walk
/// continues into its nested segments.
pub fn fold(tree: &SectionTree, window: usize) -> FoldedView {
    let segments = tree.segments();
    let mut items = Vec::new();
    let mut open_count = 0;
    let mut i = 0;
    while i < segments.len() && open_count < window {
        let segment = &segments[i];
        if segment.summarized {
            let skip = if tree.subtree_summarized(i) {
                segment.skip.max(i + 1)
            } else {
                i + 1
            };
            items.push(FoldedItem {
                id: i,
                mode: FoldMode::Collapsed { skip },
            });
            i = skip;
        } else {
            items.push(FoldedItem {
                id: i,
                mode: FoldMode::Full,
            });
            open_count += 1;
            i += 1;
        }
    }
    FoldedView {
        items,
        end: i,
        open_count,
    }
}

/// Render the view as document text: heading plus content or summary.
pub fn render_view(tree: &SectionTree, view: &FoldedView) -> String {
    let mut out = String::new();
    for item in &view.items {
        let Some(segment) = tree.get(item.id) else {
            continue;
        };
        if !segment.heading.is_empty() {
            out.push_str(&segment.heading);
            out.push('\n');
        }
        match item.mode {
            FoldMode::Full => out.push_str(&segment.content),
            FoldMode::Collapsed { skip } => {
                if skip > item.id + 1 {
                    out.push_str(&format!("[sections {}-{} folded] ", item.id, skip - 1));
                }
                out.push_str(&segment.summary);
            }
        }
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::section_tree::Segment;
    use crate::test_support::{levels_tree, raw_tree, summarize_all};

    #[test]
    fn fold_counts_only_unsummarized_segments() {
        let mut tree = levels_tree(&[1, 2, 3, 3, 2, 1, 2, 2]);
        summarize_all(&mut tree, &[2, 3, 1]);
        let view = fold(&tree, 2);
        // 0 full, 1 collapsed (jumps to 4), 4 full -> window reached.
        assert_eq!(
            view.items,
            vec![
                FoldedItem { id: 0, mode: FoldMode::Full },
                FoldedItem { id: 1, mode: FoldMode::Collapsed { skip: 4 } },
                FoldedItem { id: 4, mode: FoldMode::Full },
            ]
        );
        assert_eq!(view.open_count, 2);
        assert_eq!(view.end, 5);
        assert_eq!(view.remaining(&tree), 3);
    }

    #[test]
    fn fold_never_exceeds_window_regardless_of_collapsed_items() {
        let mut tree = levels_tree(&[1, 1, 1, 1, 1, 1, 1, 1, 1]);
        summarize_all(&mut tree, &[0, 2, 4, 6]);
        for window in 0..6 {
            let view = fold(&tree, window);
            let full = view
                .items
                .iter()
                .filter(|item| item.mode == FoldMode::Full)
                .count();
            assert!(full <= window, "window {window} produced {full} full items");
            assert_eq!(full, view.open_count);
        }
    }

    #[test]
    fn fully_summarized_tree_collapses_to_roots() {
        let mut tree = levels_tree(&[1, 2, 2, 1]);
        summarize_all(&mut tree, &[1, 2, 0, 3]);
        let view = fold(&tree, 7);
        let ids: Vec<usize> = view.items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![0, 3]);
        assert_eq!(view.open_count, 0);
        assert_eq!(view.end, 4);
    }

    #[test]
    fn eligible_excludes_segments_with_pending_children() {
        let tree = levels_tree(&[1, 2, 2]);
        let view = fold(&tree, 7);
        assert_eq!(view.eligible(&tree), vec![1, 2]);
    }

    #[test]
    fn summarized_parent_never_hides_pending_descendant() {
        let mut segments = vec![
            Segment::new("# T", 1, "body"),
            Segment::new("### Deep", 3, "hidden text"),
        ];
        segments[0].skip = 2;
        segments[0].summarized = true;
        segments[0].summary = "t".to_string();
        segments[1].skip = 2;
        let tree = raw_tree(segments);

        let view = fold(&tree, 7);
        assert_eq!(
            view.items,
            vec![
                FoldedItem { id: 0, mode: FoldMode::Collapsed { skip: 1 } },
                FoldedItem { id: 1, mode: FoldMode::Full },
            ]
        );
        assert_eq!(view.eligible(&tree), vec![1]);
        assert!(render_view(&tree, &view).contains("### Deep\nhidden text"));
    }

    #[test]
    fn render_shows_summary_for_collapsed_subtree() {
        let mut tree = SectionTree::from_document("# T\nintro\n## A\nalpha\n### A.1\ndeep\n## B\nbeta\n");
        summarize_all(&mut tree, &[2, 1]);
        let rendered = render_view(&tree, &fold(&tree, 7));
        assert!(rendered.contains("# T\nintro"));
        assert!(rendered.contains("## A\n[sections 1-2 folded] summary 1"));
        assert!(!rendered.contains("deep"));
        assert!(rendered.contains("## B\nbeta"));
    }
}
