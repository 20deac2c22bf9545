//! Chat-model abstraction.
//!
//! The [`ChatModel`] trait decouples the conversation loop from the service
//! that streams completions. Tests and the `replay` command use
//! [`ScriptedModel`], which returns predetermined turns without any network.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::tools::{ToolCall, ToolSpec};

/// One message of the replayed transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// Everything the model sees for one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// System prompt rendered from the session state.
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// What the model produced in one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl ModelTurn {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: String::new(),
            tool_calls,
        }
    }
}

/// Abstraction over chat-completion backends.
pub trait ChatModel {
    /// Produce the next turn. Implementations must give up once `timeout` elapses.
    fn complete(&self, request: &ChatRequest, timeout: Duration) -> Result<ModelTurn>;
}

/// One scripted step: a turn, or a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScriptedTurn {
    Failure { error: String },
    Turn(ModelTurn),
}

/// Model that replays a fixed list of turns and records every request.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_turns(turns: Vec<ModelTurn>) -> Self {
        Self::new(turns.into_iter().map(ScriptedTurn::Turn).collect())
    }

    /// Load a JSON array of turns, e.g. `[{"tool_calls": [...]}, {"text": "..."}]`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read script {}", path.display()))?;
        let turns: Vec<ScriptedTurn> = serde_json::from_str(&contents)
            .with_context(|| format!("parse script {}", path.display()))?;
        Ok(Self::new(turns))
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.turns.lock().map(|turns| turns.len()).unwrap_or(0)
    }
}

impl ChatModel for ScriptedModel {
    #[instrument(skip_all, fields(messages = request.messages.len(), timeout_ms = timeout.as_millis() as u64))]
    fn complete(&self, request: &ChatRequest, timeout: Duration) -> Result<ModelTurn> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("scripted model request log poisoned"))?
            .push(request.clone());
        let next = self
            .turns
            .lock()
            .map_err(|_| anyhow!("scripted model turns poisoned"))?
            .pop_front();
        match next {
            Some(ScriptedTurn::Turn(turn)) => {
                debug!(tool_calls = turn.tool_calls.len(), "scripted turn");
                Ok(turn)
            }
            Some(ScriptedTurn::Failure { error }) => bail!("model call failed: {}", error),
            None => bail!("scripted model has no turns left"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            system: "system".to_string(),
            messages: vec![ChatMessage::User {
                content: "goal".to_string(),
            }],
            tools: Vec::new(),
        }
    }

    #[test]
    fn replays_turns_in_order_and_records_requests() {
        let model = ScriptedModel::from_turns(vec![ModelTurn::text("one"), ModelTurn::text("two")]);
        let timeout = Duration::from_secs(1);
        assert_eq!(model.complete(&request(), timeout).expect("first").text, "one");
        assert_eq!(model.complete(&request(), timeout).expect("second").text, "two");
        assert!(model.complete(&request(), timeout).is_err());
        assert_eq!(model.requests().len(), 3);
    }

    #[test]
    fn script_file_parses_failures_and_inline_arguments() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("turns.json");
        fs::write(
            &path,
            r#"[
                {"error": "connection reset"},
                {"tool_calls": [{"id": "c1", "name": "create_thought", "arguments": {"content": "look"}}]},
                {"text": "done"}
            ]"#,
        )
        .expect("write script");
        let model = ScriptedModel::from_path(&path).expect("load");
        assert_eq!(model.remaining(), 3);
        let timeout = Duration::from_secs(1);
        let err = model.complete(&request(), timeout).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        let turn = model.complete(&request(), timeout).expect("calls");
        assert_eq!(turn.tool_calls[0].arguments, r#"{"content":"look"}"#);
    }

    #[test]
    fn messages_serialize_with_role_tags() {
        let message = ChatMessage::Tool {
            tool_call_id: "c1".to_string(),
            content: "ok".to_string(),
        };
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "c1");
    }
}
