//! Bottom-up section summarization over a folded section tree.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::context;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::fold::{fold, render_view};
use crate::core::section_tree::{SectionSummaryRecord, SectionTree};
use crate::io::prompt::{PromptBuilder, PromptTemplate};
use crate::sessions::{Session, SessionKind};
use crate::tools::{ToolCall, ToolDecodeError, ToolSpec, decode_args, find_spec};

pub(crate) static TOOLS: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
    vec![ToolSpec::new(
        "summarize",
        "Summarize one section of the document. Every sub section must be summarized first; \
         keep the summary short and in plain text.",
        json!({
            "id": { "type": "integer", "minimum": 0, "description": "the ID of the section" },
            "content": { "type": "string", "description": "the summary of the section" },
        }),
    )]
});

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SummarizeArgs {
    id: usize,
    content: String,
}

/// A section offered for summarization this round.
#[derive(Debug, Clone, Serialize)]
struct EligiblePart {
    id: usize,
    heading: String,
    subsections: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SummarizeSession {
    tree: SectionTree,
    window: usize,
}

impl SummarizeSession {
    pub fn new(document: &str, window: usize) -> Self {
        Self {
            tree: SectionTree::from_document(document),
            window,
        }
    }

    pub fn tree(&self) -> &SectionTree {
        &self.tree
    }

    /// Finished summaries, ready to index into a vector store.
    pub fn summaries(&self) -> Vec<SectionSummaryRecord> {
        self.tree.summaries()
    }

    fn summarize(&mut self, args: SummarizeArgs) -> String {
        match self.tree.mark_summarized(args.id, &args.content) {
            Ok(()) => format!("summarize id {} success", args.id),
            Err(message) => message,
        }
    }
}

impl Session for SummarizeSession {
    fn kind(&self) -> SessionKind {
        SessionKind::Summarize
    }

    fn goal(&self) -> String {
        "Summarize the document section by section, starting from the deepest sections.".to_string()
    }

    fn render(&self, prompts: &PromptBuilder) -> Result<String> {
        let view = fold(&self.tree, self.window);
        let eligible: Vec<EligiblePart> = view
            .eligible(&self.tree)
            .into_iter()
            .filter_map(|id| {
                let segment = self.tree.get(id)?;
                Some(EligiblePart {
                    id,
                    heading: segment.display_heading().to_string(),
                    subsections: segment
                        .children
                        .iter()
                        .filter_map(|&child| self.tree.get(child))
                        .map(|child| child.display_heading().to_string())
                        .collect(),
                })
            })
            .collect();
        prompts.render(
            PromptTemplate::Summarize,
            context! {
                eligible => eligible,
                document => render_view(&self.tree, &view).trim_end(),
                remaining => view.remaining(&self.tree),
            },
        )
    }

    fn dispatch(&mut self, call: &ToolCall) -> Result<String> {
        let spec = find_spec(&TOOLS, call)?;
        match call.name.as_str() {
            "summarize" => Ok(self.summarize(decode_args(spec, &call.arguments)?)),
            _ => Err(ToolDecodeError::unknown_tool(&call.name).into()),
        }
    }

    fn is_finished(&self) -> bool {
        self.tree.all_summarized()
    }

    fn accepts_final(&self, _text: &str) -> bool {
        false
    }
}
