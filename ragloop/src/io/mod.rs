//! Side-effecting helpers: config, prompts, collaborators, and logs.

pub mod config;
pub mod document;
pub mod history;
pub mod model;
pub mod prompt;
pub mod session_log;
pub mod vector_store;
