//! Structural invariants of a section tree.

use crate::core::section_tree::SectionTree;

/// Check invariants that the builder and the summarization gate must uphold:
/// - skip index lies in `(i, len]`
/// - every segment in `i+1..skip` is deeper than `i`, and `skip` (if in range) is not
/// - children are exactly the `level + 1` segments inside `i+1..skip`
/// - a summarized segment has nothing unsummarized in `i+1..skip`
pub fn validate_tree_invariants(tree: &SectionTree) -> Vec<String> {
    let mut errors = Vec::new();
    let segments = tree.segments();
    let len = segments.len();

    for (i, segment) in segments.iter().enumerate() {
        let label = format!("segment {} ({})", i, segment.display_heading());

        if segment.skip <= i || segment.skip > len {
            errors.push(format!(
                "{}: skip index {} outside ({}, {}]",
                label, segment.skip, i, len
            ));
            continue;
        }

        let nested = &segments[i + 1..segment.skip];
        if nested.iter().any(|other| other.level <= segment.level) {
            errors.push(format!(
                "{}: range {}..{} contains a segment at or above level {}",
                label,
                i + 1,
                segment.skip,
                segment.level
            ));
        }
        if let Some(next) = segments.get(segment.skip)
            && next.level > segment.level
        {
            errors.push(format!(
                "{}: skip index {} stops inside its own subtree",
                label, segment.skip
            ));
        }

        let expected: Vec<usize> = (i + 1..segment.skip)
            .filter(|&j| segments[j].level == segment.level + 1)
            .collect();
        if expected != segment.children {
            errors.push(format!(
                "{}: children {:?} differ from expected {:?}",
                label, segment.children, expected
            ));
        }

        if segment.summarized && nested.iter().any(|other| !other.summarized) {
            errors.push(format!("{}: summarized before its sub sections", label));
        }
    }

    errors
}
