//! Per-round conversation artifacts under `<log_dir>/<conversation>/<round>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::io::model::ModelTurn;

/// How one tool call was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// Handler ran; the result may still describe a rejected request.
    Handled,
    /// Arguments or tool name were malformed; the round was aborted here.
    ProtocolError,
    /// Not dispatched because an earlier call in the round failed to decode.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResultRecord {
    pub call_id: String,
    pub name: String,
    pub outcome: CallOutcome,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundMeta {
    pub conversation: String,
    pub session: String,
    pub round: u32,
    pub attempts: u32,
    pub duration_ms: u64,
    pub tool_calls: usize,
    pub protocol_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoundPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub prompt_path: PathBuf,
    pub turn_path: PathBuf,
    pub results_path: PathBuf,
}

impl RoundPaths {
    pub fn new(log_dir: &Path, conversation: &str, round: u32) -> Self {
        let dir = log_dir.join(conversation).join(round.to_string());
        Self {
            dir: dir.clone(),
            meta_path: dir.join("meta.json"),
            prompt_path: dir.join("system.md"),
            turn_path: dir.join("turn.json"),
            results_path: dir.join("results.json"),
        }
    }
}

pub struct RoundWriteRequest<'a> {
    pub log_dir: &'a Path,
    pub meta: &'a RoundMeta,
    pub system_prompt: &'a str,
    pub turn: &'a ModelTurn,
    pub results: &'a [ToolResultRecord],
}

pub fn write_round(request: &RoundWriteRequest<'_>) -> Result<RoundPaths> {
    let paths = RoundPaths::new(request.log_dir, &request.meta.conversation, request.meta.round);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create round dir {}", paths.dir.display()))?;

    // Write in deterministic order to keep logs stable.
    write_json(&paths.meta_path, request.meta)?;
    write_text(&paths.prompt_path, request.system_prompt)?;
    write_json(&paths.turn_path, request.turn)?;
    write_json(&paths.results_path, &request.results)?;

    Ok(paths)
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_text(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCall;

    #[test]
    fn round_paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RoundPaths::new(temp.path(), "retrieval-1", 3);

        assert!(paths.dir.ends_with(Path::new("retrieval-1/3")));
        assert!(paths.meta_path.ends_with("meta.json"));
        assert!(paths.prompt_path.ends_with("system.md"));
        assert!(paths.turn_path.ends_with("turn.json"));
        assert!(paths.results_path.ends_with("results.json"));
    }

    #[test]
    fn writes_round_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = RoundMeta {
            conversation: "tasks-7".to_string(),
            session: "tasks".to_string(),
            round: 1,
            attempts: 1,
            duration_ms: 5,
            tool_calls: 2,
            protocol_error: Some("tool finish_task: unknown".to_string()),
        };
        let turn = ModelTurn::calls(vec![ToolCall::new("c1", "create_task", "{}")]);
        let results = vec![
            ToolResultRecord {
                call_id: "c1".to_string(),
                name: "create_task".to_string(),
                outcome: CallOutcome::ProtocolError,
                content: "bad".to_string(),
            },
            ToolResultRecord {
                call_id: "c2".to_string(),
                name: "finish_task".to_string(),
                outcome: CallOutcome::Skipped,
                content: "skipped".to_string(),
            },
        ];

        let paths = write_round(&RoundWriteRequest {
            log_dir: temp.path(),
            meta: &meta,
            system_prompt: "### Goal",
            turn: &turn,
            results: &results,
        })
        .expect("write round");

        assert_eq!(fs::read_to_string(&paths.prompt_path).expect("prompt"), "### Goal");
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.results_path).expect("results"))
                .expect("json");
        assert_eq!(written[1]["outcome"], "skipped");
        let meta_json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.meta_path).expect("meta"))
                .expect("json");
        assert_eq!(meta_json["round"], 1);
    }
}
