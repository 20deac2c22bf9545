//! Tool-driven conversations grounded in a markdown document.
//!
//! A language model works through a document by calling tools against an
//! explicit state machine: summarizing sections bottom-up, recording a table
//! of contents, retrieving evidence with ReAct thoughts, or decomposing a goal
//! into tasks. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic state and algorithms (section trees,
//!   folding, TOC ranges, retrieval and task state machines). No I/O.
//! - **[`io`]**: Side effects and collaborator boundaries (config, prompt
//!   templates, chat model, vector store, session logs).
//!
//! [`sessions`] bind one state machine to its tools and prompt, and
//! [`looping`] drives a session against a [`io::model::ChatModel`].

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod sessions;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
