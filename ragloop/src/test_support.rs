//! Test-only helpers for building section trees and scripted model turns.

use crate::core::section_tree::{SectionTree, Segment};
use crate::io::model::ModelTurn;
use crate::tools::ToolCall;

/// Build a linked tree with one segment per level; headings are `# s0`, `## s1`, ...
///
/// Level 0 yields a preamble segment with an empty heading.
pub fn levels_tree(levels: &[u8]) -> SectionTree {
    let segments = levels
        .iter()
        .enumerate()
        .map(|(id, &level)| {
            let heading = if level == 0 {
                String::new()
            } else {
                format!("{} s{}", "#".repeat(usize::from(level)), id)
            };
            Segment::new(heading, level, format!("body {}", id))
        })
        .collect();
    SectionTree::build(segments)
}

/// Summarize `ids` in order with the text `summary {id}`; panics on rejection.
pub fn summarize_all(tree: &mut SectionTree, ids: &[usize]) {
    for &id in ids {
        if let Err(err) = tree.mark_summarized(id, &format!("summary {}", id)) {
            panic!("summarize {}: {}", id, err);
        }
    }
}

/// Wrap segments without recomputing children or skip indices.
pub fn raw_tree(segments: Vec<Segment>) -> SectionTree {
    SectionTree::from_raw(segments)
}

/// A turn with one tool call per `(name, arguments)` pair, ids `call-0`, `call-1`, ...
pub fn tool_turn(calls: &[(&str, &str)]) -> ModelTurn {
    ModelTurn::calls(
        calls
            .iter()
            .enumerate()
            .map(|(index, (name, arguments))| {
                ToolCall::new(&format!("call-{}", index), name, arguments)
            })
            .collect(),
    )
}
