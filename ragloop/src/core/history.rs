//! Finished task conversations kept for later conversations to review.
//!
//! Entry `n` is the `n`th recorded conversation, counting from 1. Conclusion
//! ids are dotted: `2.1` is the first conclusion of entry 2.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::tasks::Conclusion;

/// Characters of a final response shown in the history overview.
pub const RESPONSE_PREVIEW_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTask {
    pub prompt: String,
    pub response: String,
    pub conclusions: Vec<Conclusion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHistory {
    entries: Vec<UserTask>,
}

impl TaskHistory {
    pub fn entries(&self) -> &[UserTask] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, prompt: &str, response: &str, conclusions: Vec<Conclusion>) {
        self.entries.push(UserTask {
            prompt: prompt.trim().to_string(),
            response: response.trim().to_string(),
            conclusions,
        });
    }

    /// Overview, newest first: prompt, conclusion statements and a response preview.
    pub fn render(&self) -> String {
        let mut out = String::from("# Chat History\n\n");
        if self.entries.is_empty() {
            out.push_str("NO chat history\n");
        }
        for (index, task) in self.entries.iter().enumerate().rev() {
            let id = index + 1;
            let _ = writeln!(out, "User Prompt: {}", task.prompt);
            if !task.conclusions.is_empty() {
                out.push_str("<conclusions>\n");
                for (n, conclusion) in task.conclusions.iter().enumerate() {
                    let _ = writeln!(out, "{}.{} {}", id, n + 1, conclusion.statement);
                }
                out.push_str("</conclusions>\n");
            }
            out.push_str("<final response>\n");
            out.push_str(&preview(&task.response));
            out.push_str("\n</final response>\n\n");
        }
        out.push_str(
            "Use 'review_conclusion_detail' to read the references of a conclusion that helps with the task.\n",
        );
        out
    }

    pub fn conclusion(&self, id: &str) -> Option<&Conclusion> {
        let (task, conclusion) = id.trim().split_once('.')?;
        let task: usize = task.parse().ok()?;
        let conclusion: usize = conclusion.parse().ok()?;
        self.entries
            .get(task.checked_sub(1)?)?
            .conclusions
            .get(conclusion.checked_sub(1)?)
    }

    /// Full detail of each conclusion, in request order.
    ///
    /// Nothing is rendered when any id does not resolve.
    pub fn review_conclusions(&self, ids: &[String]) -> Result<String, String> {
        if ids.is_empty() {
            return Err("no conclusion ids given".to_string());
        }
        let unknown: Vec<&str> = ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| self.conclusion(id).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(format!("unknown conclusion ids: {}", unknown.join(", ")));
        }
        let mut out = String::new();
        for conclusion in ids.iter().filter_map(|id| self.conclusion(id)) {
            let _ = writeln!(
                out,
                "Type: {}, Statement: {}",
                conclusion.kind, conclusion.statement
            );
            if !conclusion.references.is_empty() {
                out.push_str("References:\n");
                for reference in &conclusion.references {
                    let _ = writeln!(out, "- {}", reference);
                }
            }
            out.push('\n');
        }
        Ok(out)
    }
}

fn preview(response: &str) -> String {
    let mut chars = response.chars();
    let head: String = chars.by_ref().take(RESPONSE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
