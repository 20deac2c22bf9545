//! Deterministic, pure state and algorithms.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.
//! Semantic rejections are `Err(String)` messages meant to be shown to the model.

pub mod budget;
pub mod fold;
pub mod headings;
pub mod history;
pub mod invariants;
pub mod retrieval;
pub mod section_tree;
pub mod tasks;
pub mod toc;
