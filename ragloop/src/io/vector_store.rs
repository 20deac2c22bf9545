//! Vector-database abstraction.
//!
//! Sessions receive a [`VectorStore`] handle explicitly; there is no global
//! connection. [`InMemoryStore`] ranks by query-term overlap, which is enough
//! for offline runs and tests.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::debug;

use crate::core::headings::heading_title;
use crate::core::retrieval::ActionResult;
use crate::core::section_tree::{SectionSummaryRecord, SectionTree};
use crate::core::toc::split_paragraphs;

pub trait VectorStore {
    /// Document chunks under `heading` (any heading when empty), best first.
    fn search_text(&self, query: &str, heading: &str, k: usize) -> Result<Vec<ActionResult>>;

    /// Section summaries, best first.
    fn search_summaries(&self, query: &str, k: usize) -> Result<Vec<ActionResult>>;

    /// Summaries whose heading matches exactly (`## Intro` or `Intro`).
    fn summaries_by_heading(&self, heading: &str) -> Result<Vec<ActionResult>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChunkRecord {
    text: String,
    headings: Vec<String>,
    sequence: usize,
    terms: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SummaryRecord {
    heading: String,
    summary: String,
    parent: Option<String>,
    subsections: Vec<String>,
    terms: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    chunks: Vec<ChunkRecord>,
    summaries: Vec<SummaryRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every paragraph of `text` with its enclosing headings.
    pub fn from_document(text: &str) -> Self {
        let tree = SectionTree::from_document(text);
        let mut store = Self::new();
        for (id, segment) in tree.segments().iter().enumerate() {
            let headings = tree.heading_path(id);
            for paragraph in split_paragraphs(&segment.content) {
                store.add_chunk(&paragraph, headings.clone());
            }
        }
        debug!(chunks = store.chunks.len(), "indexed document");
        store
    }

    pub fn add_chunk(&mut self, text: &str, headings: Vec<String>) {
        let sequence = self.chunks.len();
        self.chunks.push(ChunkRecord {
            terms: terms(text),
            text: text.to_string(),
            headings,
            sequence,
        });
    }

    /// Index finished section summaries.
    pub fn add_summaries(&mut self, records: &[SectionSummaryRecord]) {
        for record in records {
            let Some(heading) = record.headings.last() else {
                continue;
            };
            let parent = record
                .headings
                .len()
                .checked_sub(2)
                .map(|index| record.headings[index].clone());
            self.summaries.push(SummaryRecord {
                terms: terms(&format!("{} {}", heading, record.summary)),
                heading: heading.clone(),
                summary: record.summary.clone(),
                parent,
                subsections: record.subsections.clone(),
            });
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn summary_count(&self) -> usize {
        self.summaries.len()
    }
}

impl SummaryRecord {
    fn to_result(&self) -> ActionResult {
        ActionResult::SectionSummary {
            heading: self.heading.clone(),
            summary: self.summary.clone(),
            parent: self.parent.clone(),
            subsections: self.subsections.clone(),
        }
    }
}

impl VectorStore for InMemoryStore {
    fn search_text(&self, query: &str, heading: &str, k: usize) -> Result<Vec<ActionResult>> {
        let query_terms = terms(query);
        let candidates = self
            .chunks
            .iter()
            .filter(|chunk| {
                heading.trim().is_empty()
                    || chunk
                        .headings
                        .iter()
                        .any(|candidate| heading_matches(candidate, heading))
            })
            .map(|chunk| (overlap(&query_terms, &chunk.terms), chunk));
        Ok(top_k(candidates, k)
            .into_iter()
            .map(|chunk| ActionResult::DocumentChunk {
                text: chunk.text.clone(),
                headings: chunk.headings.clone(),
                sequence: chunk.sequence,
            })
            .collect())
    }

    fn search_summaries(&self, query: &str, k: usize) -> Result<Vec<ActionResult>> {
        let query_terms = terms(query);
        let candidates = self
            .summaries
            .iter()
            .map(|summary| (overlap(&query_terms, &summary.terms), summary));
        Ok(top_k(candidates, k)
            .into_iter()
            .map(SummaryRecord::to_result)
            .collect())
    }

    fn summaries_by_heading(&self, heading: &str) -> Result<Vec<ActionResult>> {
        Ok(self
            .summaries
            .iter()
            .filter(|summary| heading_matches(&summary.heading, heading))
            .map(SummaryRecord::to_result)
            .collect())
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn overlap(query: &BTreeSet<String>, document: &BTreeSet<String>) -> usize {
    query.intersection(document).count()
}

/// Keep positive scores, best first; ties keep index order.
fn top_k<'a, T>(candidates: impl Iterator<Item = (usize, &'a T)>, k: usize) -> Vec<&'a T> {
    let mut scored: Vec<(usize, &'a T)> = candidates.filter(|(score, _)| *score > 0).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(k).map(|(_, item)| item).collect()
}

fn heading_matches(candidate: &str, wanted: &str) -> bool {
    let wanted = wanted.trim();
    candidate.trim().eq_ignore_ascii_case(wanted)
        || heading_title(candidate).eq_ignore_ascii_case(heading_title(wanted))
}
