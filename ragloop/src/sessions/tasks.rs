//! Goal decomposition into a task hierarchy with recorded conclusions.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::context;
use serde::Deserialize;
use serde_json::json;

use crate::core::history::TaskHistory;
use crate::core::tasks::{Conclusion, ConclusionKind, FinishStatus, TaskHierarchy};
use crate::io::prompt::{PromptBuilder, PromptTemplate};
use crate::sessions::{Session, SessionKind};
use crate::tools::{ToolCall, ToolDecodeError, ToolSpec, decode_args, find_spec};

/// Prefix that marks the model's answer to the user.
pub const FINAL_MARKER: &str = "FINAL RESPONSE";

pub(crate) static TOOLS: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
    vec![
        ToolSpec::new(
            "create_task",
            "Create a sub task of the task you are currently working on and start working on it.",
            json!({
                "content": { "type": "string", "description": "what the task should achieve" },
                "parenttask": {
                    "type": "string",
                    "description": "id of the current task, empty for tasks under the overall goal",
                },
            }),
        ),
        ToolSpec::new(
            "finish_task",
            "Finish the task you are currently working on.",
            json!({
                "id": { "type": "string", "description": "id of the current task" },
                "status": {
                    "type": "string",
                    "enum": ["completed", "failed"],
                    "description": "how the task ended",
                },
            }),
        ),
        ToolSpec::new(
            "record_conclusion",
            "Record one conclusion or result as soon as you have it.",
            json!({
                "type": {
                    "type": "string",
                    "enum": ["Analyze", "Build", "Plain Text"],
                    "description": "the kind of conclusion",
                },
                "statement": { "type": "string", "description": "the conclusion itself" },
                "references": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "sources backing the conclusion",
                },
            }),
        ),
        ToolSpec::new(
            "review_history",
            "Review earlier conversations: each user prompt, its final response and the \
             conclusions reached. Review the history at the start of a conversation.",
            json!({}),
        ),
        ToolSpec::new(
            "review_conclusion_detail",
            "Show the full statement and references of conclusions from the history.",
            json!({
                "ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "conclusion ids, e.g. 1.2, 2.1",
                },
            }),
        ),
    ]
});

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateTaskArgs {
    content: String,
    parenttask: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FinishTaskArgs {
    id: String,
    status: FinishStatus,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConclusionArgs {
    #[serde(rename = "type")]
    kind: ConclusionKind,
    statement: String,
    references: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReviewHistoryArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReviewConclusionArgs {
    ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TaskSession {
    tasks: TaskHierarchy,
    history: TaskHistory,
}

impl TaskSession {
    pub fn new(goal: &str, resume_parent_on_finish: bool) -> Self {
        Self {
            tasks: TaskHierarchy::new(goal).with_resume_parent(resume_parent_on_finish),
            history: TaskHistory::default(),
        }
    }

    /// Start with the finished conversations the model may review.
    pub fn with_history(mut self, history: TaskHistory) -> Self {
        self.history = history;
        self
    }

    pub fn history(&self) -> &TaskHistory {
        &self.history
    }

    /// Append this conversation, answered with `response`, to the history.
    pub fn record_answer(&mut self, response: &str) {
        self.history
            .record(self.tasks.goal(), response, self.tasks.conclusions().to_vec());
    }

    pub fn into_history(self) -> TaskHistory {
        self.history
    }

    pub fn hierarchy(&self) -> &TaskHierarchy {
        &self.tasks
    }

    pub fn conclusions(&self) -> &[Conclusion] {
        self.tasks.conclusions()
    }
}

impl Session for TaskSession {
    fn kind(&self) -> SessionKind {
        SessionKind::Tasks
    }

    fn goal(&self) -> String {
        self.tasks.goal().to_string()
    }

    fn render(&self, prompts: &PromptBuilder) -> Result<String> {
        prompts.render(
            PromptTemplate::Tasks,
            context! {
                goal => self.tasks.goal(),
                conclusions => self.tasks.render_conclusions().trim_end(),
                task_list => self.tasks.render_task_list().trim_end(),
                current => self.tasks.render_current().trim_end(),
            },
        )
    }

    fn dispatch(&mut self, call: &ToolCall) -> Result<String> {
        let spec = find_spec(&TOOLS, call)?;
        let reply = match call.name.as_str() {
            "create_task" => {
                let args: CreateTaskArgs = decode_args(spec, &call.arguments)?;
                self.tasks
                    .create_task(&args.content, &args.parenttask)
                    .map(|id| format!("create new Task {}: {} success", id, args.content.trim()))
            }
            "finish_task" => {
                let args: FinishTaskArgs = decode_args(spec, &call.arguments)?;
                self.tasks
                    .finish_task(&args.id, args.status)
                    .map(|()| format!("finish Task {} success", args.id.trim()))
            }
            "record_conclusion" => {
                let args: ConclusionArgs = decode_args(spec, &call.arguments)?;
                self.tasks
                    .record_conclusion(args.kind, &args.statement, args.references);
                Ok(format!("Record conclusion: {} success", args.statement.trim()))
            }
            "review_history" => {
                let ReviewHistoryArgs {} = decode_args(spec, &call.arguments)?;
                Ok(self.history.render())
            }
            "review_conclusion_detail" => {
                let args: ReviewConclusionArgs = decode_args(spec, &call.arguments)?;
                self.history.review_conclusions(&args.ids)
            }
            _ => return Err(ToolDecodeError::unknown_tool(&call.name).into()),
        };
        Ok(reply.unwrap_or_else(|message| message))
    }

    fn is_finished(&self) -> bool {
        self.tasks.current().is_none()
    }

    fn accepts_final(&self, text: &str) -> bool {
        text.trim_start().starts_with(FINAL_MARKER)
    }
}
