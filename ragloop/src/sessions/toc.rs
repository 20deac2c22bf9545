//! Table-of-contents discovery over paragraph windows.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::context;
use serde::Deserialize;
use serde_json::json;

use crate::core::toc::{OutlineEntry, TocEntry, TocRecorder};
use crate::io::prompt::{PromptBuilder, PromptTemplate};
use crate::sessions::{Session, SessionKind};
use crate::tools::{ToolCall, ToolDecodeError, ToolSpec, decode_args, find_spec, strict_object};

pub(crate) static TOOLS: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
    vec![
        ToolSpec::new(
            "doc_toc",
            "Record the complete section hierarchy seen so far. Replaces the previous table; \
             use end -1 for a section whose end is not visible yet.",
            json!({
                "toc": {
                    "type": "array",
                    "items": strict_object(json!({
                        "level": { "type": "integer", "minimum": 0, "description": "section level, 0 for the document itself" },
                        "name": { "type": "string", "description": "section name" },
                        "start": { "type": "integer", "minimum": 0, "description": "first paragraph id" },
                        "end": { "type": "integer", "minimum": -1, "description": "last paragraph id, or -1 if unknown" },
                    })),
                },
            }),
        ),
        ToolSpec::new(
            "mark_section",
            "Mark one section with its name and complete paragraph range.",
            json!({
                "start": { "type": "integer", "minimum": 0, "description": "first paragraph id of the section" },
                "end": { "type": "integer", "minimum": 0, "description": "last paragraph id of the section" },
                "name": { "type": "string", "description": "the name of the section" },
            }),
        ),
        ToolSpec::new(
            "load_paragraph",
            "Show more paragraphs of the document.",
            json!({
                "number": { "type": "integer", "minimum": 1, "description": "how many paragraphs to load" },
            }),
        ),
        ToolSpec::new(
            "summarize",
            "Summarize a run of visible paragraphs, identified by the first words of the first \
             and last paragraph.",
            json!({
                "start": { "type": "string", "description": "first 8 words of the first paragraph" },
                "end": { "type": "string", "description": "first 8 words of the last paragraph" },
                "content": { "type": "string", "description": "the summary" },
            }),
        ),
        ToolSpec::new(
            "update_toc",
            "Replace the heading outline of the document.",
            json!({
                "toc": {
                    "type": "array",
                    "items": strict_object(json!({
                        "id": { "type": "string", "description": "outline id, e.g. 1.2" },
                        "content": { "type": "string", "description": "heading text" },
                        "line": { "type": "integer", "minimum": 0, "description": "line number of the heading" },
                    })),
                },
            }),
        ),
    ]
});

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocTocArgs {
    toc: Vec<TocEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MarkSectionArgs {
    start: usize,
    end: usize,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoadParagraphArgs {
    number: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SummarizeRangeArgs {
    start: String,
    end: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateTocArgs {
    toc: Vec<OutlineEntry>,
}

#[derive(Debug, Clone)]
pub struct TocSession {
    toc: TocRecorder,
    window: usize,
    load_cap: usize,
}

impl TocSession {
    pub fn new(document: &str, window: usize, load_cap: usize) -> Self {
        Self {
            toc: TocRecorder::from_document(document),
            window,
            load_cap,
        }
    }

    pub fn recorder(&self) -> &TocRecorder {
        &self.toc
    }
}

impl Session for TocSession {
    fn kind(&self) -> SessionKind {
        SessionKind::Toc
    }

    fn goal(&self) -> String {
        "Identify each section's range and level, and record the document hierarchy.".to_string()
    }

    fn render(&self, prompts: &PromptBuilder) -> Result<String> {
        prompts.render(
            PromptTemplate::Toc,
            context! {
                entries => self.toc.render_entries().trim_end(),
                outline => self.toc.render_outline().trim_end(),
                window => self.toc.render_window(self.window).trim_end(),
            },
        )
    }

    fn dispatch(&mut self, call: &ToolCall) -> Result<String> {
        let spec = find_spec(&TOOLS, call)?;
        let reply = match call.name.as_str() {
            "doc_toc" => {
                let args: DocTocArgs = decode_args(spec, &call.arguments)?;
                let count = args.toc.len();
                self.toc
                    .record_toc(args.toc)
                    .map(|()| format!("record {} sections success", count))
            }
            "mark_section" => {
                let args: MarkSectionArgs = decode_args(spec, &call.arguments)?;
                self.toc
                    .mark_section(args.start, args.end, &args.name)
                    .map(|()| format!("add section {} success", args.name.trim()))
            }
            "load_paragraph" => {
                let args: LoadParagraphArgs = decode_args(spec, &call.arguments)?;
                let loaded = self.toc.load_paragraphs(args.number, self.window, self.load_cap);
                Ok(format!("load {} paragraphs success", loaded))
            }
            "summarize" => {
                let args: SummarizeRangeArgs = decode_args(spec, &call.arguments)?;
                self.toc
                    .summarize_range(&args.start, &args.end, &args.content, self.window)
                    .map(|(start, end)| format!("summarize paragraphs [{}-{}] success", start, end))
            }
            "update_toc" => {
                let args: UpdateTocArgs = decode_args(spec, &call.arguments)?;
                let count = args.toc.len();
                self.toc.update_outline(args.toc);
                Ok(format!("update toc with {} entries success", count))
            }
            _ => return Err(ToolDecodeError::unknown_tool(&call.name).into()),
        };
        Ok(reply.unwrap_or_else(|message| message))
    }

    fn is_finished(&self) -> bool {
        self.toc.is_complete()
    }

    fn accepts_final(&self, _text: &str) -> bool {
        false
    }
}
