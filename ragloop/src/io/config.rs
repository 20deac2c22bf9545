//! Conversation configuration stored as TOML (default `ragloop.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Ragloop configuration (TOML).
///
/// Missing fields take the defaults below, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RagloopConfig {
    /// Non-summarized segments shown per summarization prompt.
    pub fold_window: usize,

    /// Raw paragraphs shown per table-of-contents prompt.
    pub paragraph_window: usize,

    /// Most paragraphs a single `load_paragraph` call may reveal.
    pub load_paragraph_cap: usize,

    /// Results returned by each vector search.
    pub search_top_k: usize,

    pub max_rounds: u32,

    /// Wall-clock budget for a whole conversation, shared by every model call.
    pub conversation_timeout_secs: u64,

    /// Extra attempts after a failed model call.
    pub model_retries: u32,

    pub retry_backoff_ms: u64,

    /// Previous rounds of assistant/tool messages replayed to the model.
    pub transcript_rounds: usize,

    /// Byte budget for the rendered system prompt.
    pub prompt_budget_bytes: usize,

    /// Directory for per-round JSON artifacts. Nothing is written when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    pub tasks: TaskConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaskConfig {
    /// Return a `decompose` parent to `in_progress` when its child finishes.
    pub resume_parent_on_finish: bool,

    /// JSON file of finished task conversations, reviewed by later ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,
}

impl Default for RagloopConfig {
    fn default() -> Self {
        Self {
            fold_window: 7,
            paragraph_window: 20,
            load_paragraph_cap: 5,
            search_top_k: 5,
            max_rounds: 50,
            conversation_timeout_secs: 30 * 60,
            model_retries: 2,
            retry_backoff_ms: 500,
            transcript_rounds: 4,
            prompt_budget_bytes: 60_000,
            log_dir: None,
            tasks: TaskConfig::default(),
        }
    }
}

impl RagloopConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("fold_window", self.fold_window as u64),
            ("paragraph_window", self.paragraph_window as u64),
            ("load_paragraph_cap", self.load_paragraph_cap as u64),
            ("search_top_k", self.search_top_k as u64),
            ("max_rounds", u64::from(self.max_rounds)),
            ("conversation_timeout_secs", self.conversation_timeout_secs),
            ("prompt_budget_bytes", self.prompt_budget_bytes as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(anyhow!("{} must be > 0", name));
            }
        }
        Ok(())
    }

    pub fn conversation_timeout(&self) -> Duration {
        Duration::from_secs(self.conversation_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RagloopConfig::default()`.
pub fn load_config(path: &Path) -> Result<RagloopConfig> {
    if !path.exists() {
        let cfg = RagloopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RagloopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RagloopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
