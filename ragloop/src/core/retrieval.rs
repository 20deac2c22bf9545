//! ReAct retrieval state: thoughts, actions, round-scoped results, observations.
//!
//! Result ids are positions in the concatenation of the open thought's action
//! results. They are recomputed from the actions every time, and the pool is
//! emptied when the thought closes.

use std::fmt;
use std::fmt::Write as _;

use serde::Serialize;
use serde_json::json;

/// A single hit returned by a search action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionResult {
    DocumentChunk {
        text: String,
        /// Enclosing headings, outermost first.
        headings: Vec<String>,
        /// Paragraph position in the source document.
        sequence: usize,
    },
    SectionSummary {
        heading: String,
        summary: String,
        parent: Option<String>,
        subsections: Vec<String>,
    },
}

impl ActionResult {
    pub fn render_content(&self) -> String {
        match self {
            ActionResult::DocumentChunk { text, .. } => text.clone(),
            ActionResult::SectionSummary {
                heading, summary, ..
            } => format!("Section ** {} ** summary:\n{}", heading, summary),
        }
    }

    pub fn metadata(&self) -> serde_json::Value {
        match self {
            ActionResult::DocumentChunk {
                headings, sequence, ..
            } => json!({ "sequence": sequence, "headings": headings }),
            ActionResult::SectionSummary {
                heading,
                parent,
                subsections,
                ..
            } => json!({
                "summary": true,
                "heading": heading,
                "parent": parent,
                "subsections": subsections,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtStatus {
    InProgress,
    Completed,
}

impl fmt::Display for ThoughtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThoughtStatus::InProgress => f.write_str("In Progress"),
            ThoughtStatus::Completed => f.write_str("Completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thought {
    pub content: String,
    pub status: ThoughtStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub argument: String,
    pub results: Vec<ActionResult>,
}

/// A statement with copies of the results it cites, taken when it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub statement: String,
    pub refs: Vec<ActionResult>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReActRetrievalState {
    current: Option<Thought>,
    actions: Vec<Action>,
    thoughts: Vec<Thought>,
    observations: Vec<Observation>,
}

impl ReActRetrievalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_thought(&self) -> Option<&Thought> {
        self.current.as_ref()
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn create_thought(&mut self, content: &str) -> Result<(), String> {
        if let Some(current) = &self.current {
            return Err(format!(
                "Current thought: {} not finished, can not create new thought, please first finish the current thought",
                current.content
            ));
        }
        self.current = Some(Thought {
            content: content.trim().to_string(),
            status: ThoughtStatus::InProgress,
        });
        Ok(())
    }

    /// Close the open thought and drop its actions and result pool.
    pub fn finish_thought(&mut self) -> Result<&Thought, String> {
        let Some(mut thought) = self.current.take() else {
            return Err("There is no current thought, can not finish empty thought".to_string());
        };
        thought.status = ThoughtStatus::Completed;
        self.actions.clear();
        self.thoughts.push(thought);
        Ok(&self.thoughts[self.thoughts.len() - 1])
    }

    /// Append an action under the open thought. Returns the number of results.
    pub fn record_action(
        &mut self,
        argument: impl Into<String>,
        results: Vec<ActionResult>,
    ) -> Result<usize, String> {
        let argument = argument.into();
        if self.current.is_none() {
            return Err(format!(
                "There is no current thought, create a thought before running: {}",
                argument
            ));
        }
        let count = results.len();
        self.actions.push(Action { argument, results });
        Ok(count)
    }

    /// Results of every action under the open thought, in id order.
    pub fn result_pool(&self) -> Vec<&ActionResult> {
        self.actions
            .iter()
            .flat_map(|action| action.results.iter())
            .collect()
    }

    fn resolve(&self, id: i64) -> Result<&ActionResult, String> {
        let pool = self.result_pool();
        usize::try_from(id)
            .ok()
            .and_then(|index| pool.get(index).copied())
            .ok_or_else(|| {
                if pool.is_empty() {
                    format!("id {} out of bound, there are no action results", id)
                } else {
                    format!("id {} out of bound [0, {}]", id, pool.len() - 1)
                }
            })
    }

    /// Record an observation citing results of the current pool.
    ///
    /// Nothing is recorded unless every id resolves.
    pub fn record_observation(&mut self, statement: &str, refs: &[i64]) -> Result<(), String> {
        if self.result_pool().is_empty() {
            return Err(
                "There are no action results to observe, run a search under a thought first"
                    .to_string(),
            );
        }
        let refs = refs
            .iter()
            .map(|&id| self.resolve(id).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        self.observations.push(Observation {
            statement: statement.trim().to_string(),
            refs,
        });
        Ok(())
    }

    pub fn metadata(&self, id: i64) -> Result<String, String> {
        let result = self.resolve(id)?;
        Ok(format!(
            "Metadata for result {}:\n{}\n",
            id,
            result.metadata()
        ))
    }

    pub fn render_thoughts(&self) -> String {
        let mut out = String::new();
        for thought in &self.thoughts {
            let _ = writeln!(out, "- {} ({})", thought.content, thought.status);
        }
        out
    }

    pub fn render_observations(&self) -> String {
        let mut out = String::new();
        for observation in &self.observations {
            let _ = writeln!(out, "- {}", observation.statement);
            for result in &observation.refs {
                for line in result.render_content().lines() {
                    let _ = writeln!(out, "  > {}", line);
                }
            }
        }
        out
    }

    /// Open thought with its actions and freshly numbered results.
    pub fn render_in_progress(&self) -> String {
        let Some(current) = &self.current else {
            return "There is no current thought\n".to_string();
        };
        let mut out = format!("Current thought: {}\n\n** Action & Result **\n", current.content);
        let mut id = 0;
        for action in &self.actions {
            let _ = writeln!(out, "Action: {}", action.argument);
            if action.results.is_empty() {
                out.push_str("NO Results\n");
            } else {
                out.push_str("Results:\n");
                for result in &action.results {
                    let _ = writeln!(out, "=== Result {} ===\n{}", id, result.render_content());
                    id += 1;
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, sequence: usize) -> ActionResult {
        ActionResult::DocumentChunk {
            text: text.to_string(),
            headings: vec!["# Doc".to_string()],
            sequence,
        }
    }

    #[test]
    fn thought_lifecycle_rejects_double_open_and_empty_finish() {
        let mut state = ReActRetrievalState::new();
        assert!(state.finish_thought().is_err());
        state.create_thought("find the budget").expect("open");
        let err = state.create_thought("another").unwrap_err();
        assert!(err.contains("find the budget"), "{err}");
        let finished = state.finish_thought().expect("close");
        assert_eq!(finished.status, ThoughtStatus::Completed);
        assert!(state.current_thought().is_none());
        state.create_thought("second").expect("reopen after finish");
    }

    #[test]
    fn pool_ids_span_all_actions_of_open_thought() {
        let mut state = ReActRetrievalState::new();
        state.create_thought("t").expect("open");
        state
            .record_action("search a", vec![chunk("a0", 0), chunk("a1", 1)])
            .expect("action");
        state.record_action("search b", vec![chunk("b0", 2)]).expect("action");
        assert_eq!(state.result_pool().len(), 3);

        let rendered = state.render_in_progress();
        assert!(rendered.contains("=== Result 2 ===\nb0"));
        assert_eq!(state.result_pool().len(), 3, "rendering must not grow the pool");
    }

    #[test]
    fn observation_after_finish_cannot_reach_old_results() {
        let mut state = ReActRetrievalState::new();
        state.create_thought("t").expect("open");
        state.record_action("search", vec![chunk("fact", 0)]).expect("action");
        state.record_observation("fact holds", &[0]).expect("observe");
        state.finish_thought().expect("close");

        assert!(state.record_observation("stale", &[0]).is_err());
        assert_eq!(state.observations().len(), 1);
        assert_eq!(state.observations()[0].refs, vec![chunk("fact", 0)]);
    }

    #[test]
    fn observation_with_any_bad_id_records_nothing() {
        let mut state = ReActRetrievalState::new();
        state.create_thought("t").expect("open");
        state.record_action("search", vec![chunk("x", 0)]).expect("action");
        let err = state.record_observation("mixed", &[0, 4]).unwrap_err();
        assert_eq!(err, "id 4 out of bound [0, 0]");
        assert!(state.record_observation("negative", &[-1]).is_err());
        assert!(state.observations().is_empty());
    }

    #[test]
    fn actions_require_open_thought() {
        let mut state = ReActRetrievalState::new();
        assert!(state.record_action("search", vec![chunk("x", 0)]).is_err());
        assert!(state.actions().is_empty());
    }

    #[test]
    fn summary_results_render_heading_and_metadata() {
        let result = ActionResult::SectionSummary {
            heading: "## Results".to_string(),
            summary: "Numbers went up.".to_string(),
            parent: Some("# Paper".to_string()),
            subsections: vec!["Ablation".to_string()],
        };
        assert_eq!(
            result.render_content(),
            "Section ** ## Results ** summary:\nNumbers went up."
        );
        assert_eq!(result.metadata()["parent"], "# Paper");

        let mut state = ReActRetrievalState::new();
        state.create_thought("t").expect("open");
        state.record_action("", vec![result]).expect("action");
        let metadata = state.metadata(0).expect("in range");
        assert!(metadata.starts_with("Metadata for result 0:\n"));
        assert!(metadata.contains("Ablation"));
    }

    #[test]
    fn empty_action_renders_no_results() {
        let mut state = ReActRetrievalState::new();
        assert_eq!(state.render_in_progress(), "There is no current thought\n");
        state.create_thought("look").expect("open");
        state.record_action("vector search", Vec::new()).expect("action");
        assert!(state.render_in_progress().contains("Action: vector search\nNO Results\n"));
    }
}
