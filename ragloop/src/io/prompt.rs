//! System prompt builder: minijinja templates plus a byte budget.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, Value};
use regex::Regex;
use tracing::debug;

const SUMMARIZE_TEMPLATE: &str = include_str!("prompts/summarize.md");
const TOC_TEMPLATE: &str = include_str!("prompts/toc.md");
const RETRIEVAL_TEMPLATE: &str = include_str!("prompts/retrieval.md");
const TASKS_TEMPLATE: &str = include_str!("prompts/tasks.md");

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section marker regex should compile")
});

/// Droppable sections, least important first.
const DROP_ORDER: [&str; 3] = ["outline", "thoughts", "conclusions"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Summarize,
    Toc,
    Retrieval,
    Tasks,
}

impl PromptTemplate {
    fn name(self) -> &'static str {
        match self {
            PromptTemplate::Summarize => "summarize",
            PromptTemplate::Toc => "toc",
            PromptTemplate::Retrieval => "retrieval",
            PromptTemplate::Tasks => "tasks",
        }
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    /// Section identifier (e.g., "contract", "document").
    key: String,
    /// Whether this section is required (cannot be dropped).
    required: bool,
    /// Section content after its marker.
    content: String,
}

/// Parse sections from rendered template output using HTML comment markers.
///
/// Markers follow format: `<!-- section:KEY required|droppable -->`
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::new();

    for (i, caps) in matches.iter().enumerate() {
        let (Some(marker), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let required = kind.as_str() == "required";
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());

        let content = rendered[marker.end()..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }

    sections
}

/// Apply budget to parsed sections, dropping droppable sections as needed.
///
/// Drop order follows `DROP_ORDER`; if still over budget the last section is truncated.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    // Rendered length, counting the blank-line separators.
    let total_len = |secs: &[ParsedSection]| -> usize {
        secs.iter().map(|s| s.content.len()).sum::<usize>() + 2 * secs.len().saturating_sub(1)
    };

    if total_len(sections) <= budget {
        return;
    }

    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            let dropped_len = sections[idx].content.len();
            debug!(
                section = key,
                bytes_dropped = dropped_len,
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    if total_len(sections) <= budget {
        return;
    }
    let other_len = total_len(sections) - sections.last().map_or(0, |s| s.content.len());
    let allowed = budget.saturating_sub(other_len);
    if let Some(last) = sections.last_mut()
        && last.content.len() > allowed
    {
        let before_len = last.content.len();
        let keep = if allowed > 12 { allowed - 12 } else { allowed };
        let cut = floor_char_boundary(&last.content, keep);
        last.content.truncate(cut);
        if allowed > 12 {
            last.content.push_str("\n[truncated]");
        }
        debug!(
            section = last.key,
            before_len,
            after_len = last.content.len(),
            "truncated section for budget"
        );
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Render sections back to a single string.
fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renders session prompts within a byte budget, dropping less critical sections first.
#[derive(Debug)]
pub struct PromptBuilder {
    budget_bytes: usize,
    env: Environment<'static>,
}

impl PromptBuilder {
    /// Create a builder with the given byte budget.
    pub fn new(budget_bytes: usize) -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("summarize", SUMMARIZE_TEMPLATE)
            .expect("summarize template should be valid");
        env.add_template("toc", TOC_TEMPLATE)
            .expect("toc template should be valid");
        env.add_template("retrieval", RETRIEVAL_TEMPLATE)
            .expect("retrieval template should be valid");
        env.add_template("tasks", TASKS_TEMPLATE)
            .expect("tasks template should be valid");
        Self { budget_bytes, env }
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    /// Render `template` with `ctx` and fit the result into the budget.
    pub fn render(&self, template: PromptTemplate, ctx: Value) -> Result<String> {
        let rendered = self
            .env
            .get_template(template.name())
            .and_then(|tmpl| tmpl.render(ctx))
            .with_context(|| format!("render {} prompt", template.name()))?;

        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        Ok(render_sections(&sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    fn tasks_context(conclusions: &str) -> Value {
        context! {
            goal => "ship the release",
            conclusions => conclusions,
            task_list => "(in_progress) Task 1: build",
            current => "Current Working on: Task 1: build",
        }
    }

    /// Verifies prompt sections appear in template order without markers.
    #[test]
    fn prompt_ordering_is_stable() {
        let content = PromptBuilder::new(10_000)
            .render(PromptTemplate::Tasks, tasks_context("NO conclusions"))
            .expect("render");

        let contract_pos = content.find("### Task Management Contract").expect("contract");
        let goal_pos = content.find("### Goal").expect("goal");
        let conclusions_pos = content.find("### Conclusions & Results").expect("conclusions");
        let tasks_pos = content.find("### Task List").expect("tasks");
        assert!(contract_pos < goal_pos);
        assert!(goal_pos < conclusions_pos);
        assert!(conclusions_pos < tasks_pos);
        assert!(!content.contains("<!--"), "markers are stripped");
    }

    /// Verifies budget enforcement drops droppable sections before required ones.
    #[test]
    fn budget_drops_less_critical_sections_first() {
        let content = PromptBuilder::new(1_500)
            .render(PromptTemplate::Tasks, tasks_context(&"conclusion ".repeat(200)))
            .expect("render");

        assert!(!content.contains("### Conclusions"), "conclusions dropped");
        assert!(content.contains("### Goal"), "goal should remain");
        assert!(content.contains("### Task List"), "task list should remain");
    }

    /// Verifies the last section is truncated when required content alone is too large.
    #[test]
    fn oversized_required_content_is_truncated() {
        let builder = PromptBuilder::new(2_000);
        let content = builder
            .render(
                PromptTemplate::Summarize,
                context! {
                    eligible => Vec::<Value>::new(),
                    document => "word ".repeat(2_000),
                    remaining => 0,
                },
            )
            .expect("render");
        assert!(content.len() <= builder.budget_bytes());
        assert!(content.ends_with("[truncated]"));
    }

    #[test]
    fn empty_droppable_sections_disappear() {
        let content = PromptBuilder::new(10_000)
            .render(
                PromptTemplate::Retrieval,
                context! {
                    thoughts => "",
                    observations => "",
                    in_progress => "There is no current thought",
                },
            )
            .expect("render");
        assert!(!content.contains("### Previous Thoughts"));
        assert!(content.contains("No observations yet."));
        assert!(content.contains("There is no current thought"));
    }

    #[test]
    fn parse_sections_keeps_empty_required_sections() {
        let sections = parse_sections(
            "<!-- section:a required -->\n<!-- section:b droppable -->\n\n<!-- section:c droppable -->x",
        );
        let keys: Vec<&str> = sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }
}
