//! Conversation kinds driven by the loop.
//!
//! A session owns one state machine. Each round the loop asks it for a system
//! prompt, sends that to the model together with the session's tools, and
//! hands every returned tool call back to [`Session::dispatch`].
//!
//! `dispatch` returns `Ok(text)` for anything the model can read and correct,
//! including rejected requests. It fails only with a
//! [`ToolDecodeError`](crate::tools::ToolDecodeError) for a malformed call, or
//! with another error when a collaborator breaks down.

use std::fmt;

use anyhow::Result;
use clap::ValueEnum;

use crate::io::prompt::PromptBuilder;
use crate::tools::{ToolCall, ToolSpec};

pub mod retrieval;
pub mod summarize;
pub mod tasks;
pub mod toc;

pub use retrieval::RetrievalSession;
pub use summarize::SummarizeSession;
pub use tasks::TaskSession;
pub use toc::TocSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SessionKind {
    Summarize,
    Toc,
    Retrieval,
    Tasks,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Summarize => "summarize",
            SessionKind::Toc => "toc",
            SessionKind::Retrieval => "retrieval",
            SessionKind::Tasks => "tasks",
        }
    }

    /// Tool definitions advertised by sessions of this kind.
    pub fn tools(self) -> Vec<ToolSpec> {
        match self {
            SessionKind::Summarize => summarize::TOOLS.clone(),
            SessionKind::Toc => toc::TOOLS.clone(),
            SessionKind::Retrieval => retrieval::TOOLS.clone(),
            SessionKind::Tasks => tasks::TOOLS.clone(),
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Session {
    fn kind(&self) -> SessionKind;

    /// First user message of the conversation.
    fn goal(&self) -> String;

    fn tools(&self) -> Vec<ToolSpec> {
        self.kind().tools()
    }

    /// System prompt describing the current state.
    fn render(&self, prompts: &PromptBuilder) -> Result<String>;

    fn dispatch(&mut self, call: &ToolCall) -> Result<String>;

    /// The state machine has nothing left to do.
    fn is_finished(&self) -> bool;

    /// Whether a reply without tool calls ends the conversation.
    fn accepts_final(&self, text: &str) -> bool;
}
