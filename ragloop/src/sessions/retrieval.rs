//! ReAct retrieval conversation backed by an explicit vector-store handle.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::context;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::core::retrieval::{ActionResult, ReActRetrievalState};
use crate::io::prompt::{PromptBuilder, PromptTemplate};
use crate::io::vector_store::VectorStore;
use crate::sessions::{Session, SessionKind};
use crate::tools::{ToolCall, ToolDecodeError, ToolSpec, decode_args, find_spec};

pub(crate) static TOOLS: LazyLock<Vec<ToolSpec>> = LazyLock::new(|| {
    vec![
        ToolSpec::new(
            "create_thought",
            "Reason about the question and the context so far, then open the next step.",
            json!({
                "content": { "type": "string", "description": "the content of the thought" },
            }),
        ),
        ToolSpec::new("finish_thought", "Finish the thought in progress.", json!({})),
        ToolSpec::new(
            "record_observation",
            "Record one short factual statement supported by action results, citing their ids. \
             Record explicitly when a result is not useful.",
            json!({
                "statement": { "type": "string", "description": "a single factual statement" },
                "refs": {
                    "type": "array",
                    "items": { "type": "integer", "description": "an action result id" },
                    "description": "ids of the supporting action results",
                },
            }),
        ),
        ToolSpec::new(
            "get_metadata",
            "Get where an action result comes from: the chunk position and headings, or the \
             parent and sub section headings of a summary.",
            json!({
                "id": { "type": "integer", "description": "the id of the action result" },
            }),
        ),
        ToolSpec::new(
            "get_summary_by_heading",
            "Look up a section summary by its heading.",
            json!({
                "heading": { "type": "string", "description": "the section heading, e.g. '## Introduction'" },
            }),
        ),
        ToolSpec::new(
            "vector_search_summary",
            "Search the section summaries with a query.",
            json!({
                "query": { "type": "string", "description": "the query for vector search" },
            }),
        ),
        ToolSpec::new(
            "vector_search_text",
            "Search the document chunks under a section heading with a query.",
            json!({
                "query": { "type": "string", "description": "the query for vector search" },
                "heading": { "type": "string", "description": "the section heading that scopes the search" },
            }),
        ),
    ]
});

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContentArgs {
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObservationArgs {
    statement: String,
    refs: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataArgs {
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HeadingArgs {
    heading: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScopedQueryArgs {
    query: String,
    heading: String,
}

pub struct RetrievalSession<S: VectorStore> {
    question: String,
    state: ReActRetrievalState,
    store: S,
    top_k: usize,
}

impl<S: VectorStore> RetrievalSession<S> {
    pub fn new(question: &str, store: S, top_k: usize) -> Self {
        Self {
            question: question.trim().to_string(),
            state: ReActRetrievalState::new(),
            store,
            top_k,
        }
    }

    pub fn state(&self) -> &ReActRetrievalState {
        &self.state
    }

    /// Run a store query under the open thought and record it as an action.
    fn search(
        &mut self,
        argument: String,
        query: impl FnOnce(&S) -> Result<Vec<ActionResult>>,
    ) -> String {
        if self.state.current_thought().is_none() {
            return format!(
                "There is no current thought, create a thought before running: {}",
                argument
            );
        }
        let (results, reply) = match query(&self.store) {
            Ok(results) => (results, "run vector search success".to_string()),
            Err(err) => {
                warn!(error = %format!("{:#}", err), "vector store query failed");
                (Vec::new(), format!("run vector search failed: {:#}", err))
            }
        };
        match self.state.record_action(argument, results) {
            Ok(_) => reply,
            Err(message) => message,
        }
    }
}

impl<S: VectorStore> Session for RetrievalSession<S> {
    fn kind(&self) -> SessionKind {
        SessionKind::Retrieval
    }

    fn goal(&self) -> String {
        self.question.clone()
    }

    fn render(&self, prompts: &PromptBuilder) -> Result<String> {
        prompts.render(
            PromptTemplate::Retrieval,
            context! {
                thoughts => self.state.render_thoughts().trim_end(),
                observations => self.state.render_observations().trim_end(),
                in_progress => self.state.render_in_progress().trim_end(),
            },
        )
    }

    fn dispatch(&mut self, call: &ToolCall) -> Result<String> {
        let spec = find_spec(&TOOLS, call)?;
        let top_k = self.top_k;
        let reply = match call.name.as_str() {
            "create_thought" => {
                let args: ContentArgs = decode_args(spec, &call.arguments)?;
                match self.state.create_thought(&args.content) {
                    Ok(()) => format!("Create new thought: {} success", args.content.trim()),
                    Err(message) => message,
                }
            }
            "finish_thought" => {
                let NoArgs {} = decode_args(spec, &call.arguments)?;
                match self.state.finish_thought() {
                    Ok(thought) => format!("Finish current thought: {}", thought.content),
                    Err(message) => message,
                }
            }
            "record_observation" => {
                let args: ObservationArgs = decode_args(spec, &call.arguments)?;
                match self.state.record_observation(&args.statement, &args.refs) {
                    Ok(()) => format!("Record observation: {} success", args.statement.trim()),
                    Err(message) => message,
                }
            }
            "get_metadata" => {
                let args: MetadataArgs = decode_args(spec, &call.arguments)?;
                self.state.metadata(args.id).unwrap_or_else(|message| message)
            }
            "get_summary_by_heading" => {
                let args: HeadingArgs = decode_args(spec, &call.arguments)?;
                self.search(
                    format!("get summary by heading: {}", args.heading),
                    |store| store.summaries_by_heading(&args.heading),
                )
            }
            "vector_search_summary" => {
                let args: QueryArgs = decode_args(spec, &call.arguments)?;
                self.search(
                    format!("vector search summary with query: {}", args.query),
                    |store| store.search_summaries(&args.query, top_k),
                )
            }
            "vector_search_text" => {
                let args: ScopedQueryArgs = decode_args(spec, &call.arguments)?;
                self.search(
                    format!(
                        "vector search doc chunks with query: {} under heading: {}",
                        args.query, args.heading
                    ),
                    |store| store.search_text(&args.query, &args.heading, top_k),
                )
            }
            _ => return Err(ToolDecodeError::unknown_tool(&call.name).into()),
        };
        Ok(reply)
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn accepts_final(&self, text: &str) -> bool {
        !text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::vector_store::InMemoryStore;
    use anyhow::anyhow;

    const DOC: &str = "# Paper\n## Method\nWe train llamas on wool data.\n\nThe optimizer is Adam.\n## Results\nLlamas improved by ten points.\n";

    fn session() -> RetrievalSession<InMemoryStore> {
        RetrievalSession::new("How were llamas trained?", InMemoryStore::from_document(DOC), 5)
    }

    fn call(session: &mut RetrievalSession<InMemoryStore>, name: &str, args: &str) -> String {
        session
            .dispatch(&ToolCall::new("c", name, args))
            .expect("well-formed call")
    }

    #[test]
    fn search_without_thought_records_nothing() {
        let mut session = session();
        let reply = call(&mut session, "vector_search_text", r#"{"query":"llamas","heading":""}"#);
        assert!(reply.starts_with("There is no current thought"), "{reply}");
        assert!(session.state().actions().is_empty());
    }

    #[test]
    fn thought_search_observe_finish_cycle() {
        let mut session = session();
        assert_eq!(
            call(&mut session, "create_thought", r#"{"content":"find training data"}"#),
            "Create new thought: find training data success"
        );
        assert_eq!(
            call(&mut session, "vector_search_text", r#"{"query":"train wool","heading":"Method"}"#),
            "run vector search success"
        );
        let prompt = session.render(&PromptBuilder::new(60_000)).expect("render");
        assert!(prompt.contains("Current thought: find training data"));
        assert!(prompt.contains("=== Result 0 ===\nWe train llamas on wool data."), "{prompt}");

        assert_eq!(
            call(&mut session, "record_observation", r#"{"statement":"Trained on wool","refs":[0]}"#),
            "Record observation: Trained on wool success"
        );
        assert!(call(&mut session, "get_metadata", r#"{"id":0}"#).contains("## Method"));
        assert_eq!(
            call(&mut session, "finish_thought", "{}"),
            "Finish current thought: find training data"
        );

        let stale = call(&mut session, "record_observation", r#"{"statement":"again","refs":[0]}"#);
        assert!(stale.contains("no action results"), "{stale}");
        let prompt = session.render(&PromptBuilder::new(60_000)).expect("render");
        assert!(prompt.contains("- find training data (Completed)"));
        assert!(prompt.contains("- Trained on wool\n  > We train llamas on wool data."));
        assert!(prompt.contains("There is no current thought"));
    }

    #[test]
    fn store_failure_is_reported_as_empty_action() {
        struct BrokenStore;
        impl VectorStore for BrokenStore {
            fn search_text(&self, _: &str, _: &str, _: usize) -> Result<Vec<ActionResult>> {
                Err(anyhow!("connection refused"))
            }
            fn search_summaries(&self, _: &str, _: usize) -> Result<Vec<ActionResult>> {
                Err(anyhow!("connection refused"))
            }
            fn summaries_by_heading(&self, _: &str) -> Result<Vec<ActionResult>> {
                Err(anyhow!("connection refused"))
            }
        }

        let mut session = RetrievalSession::new("q", BrokenStore, 5);
        session
            .dispatch(&ToolCall::new("c", "create_thought", r#"{"content":"t"}"#))
            .expect("thought");
        let reply = session
            .dispatch(&ToolCall::new("c", "vector_search_summary", r#"{"query":"x"}"#))
            .expect("search");
        assert!(reply.contains("connection refused"));
        assert_eq!(session.state().actions().len(), 1);
        assert!(session.state().result_pool().is_empty());
    }

    #[test]
    fn final_answer_needs_text() {
        let session = session();
        assert!(session.accepts_final("Llamas were trained on wool."));
        assert!(!session.accepts_final("   "));
    }
}
