//! Task history persisted as JSON between conversations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::history::TaskHistory;

/// Load history from `path`; a missing file is an empty history.
pub fn load_history(path: &Path) -> Result<TaskHistory> {
    if !path.exists() {
        return Ok(TaskHistory::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read history {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse history {}", path.display()))
}

/// Atomically write history (temp file + rename).
pub fn save_history(path: &Path, history: &TaskHistory) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(history).context("serialize history")?;
    buf.push('\n');
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp history {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace history {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tasks::{Conclusion, ConclusionKind};

    #[test]
    fn missing_file_is_empty_history() {
        let temp = tempfile::tempdir().expect("tempdir");
        let history = load_history(&temp.path().join("history.json")).expect("load");
        assert!(history.is_empty());
    }

    #[test]
    fn saved_history_loads_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state").join("history.json");
        let mut history = TaskHistory::default();
        history.record(
            "Plan a trip",
            "FINAL RESPONSE: May",
            vec![Conclusion {
                kind: ConclusionKind::PlainText,
                statement: "May is free".to_string(),
                references: vec!["calendar".to_string()],
            }],
        );

        save_history(&path, &history).expect("save");

        assert_eq!(load_history(&path).expect("load"), history);
        assert!(!path.with_extension("json.tmp").exists());
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"kind\": \"Plain Text\""), "{raw}");
    }

    #[test]
    fn corrupt_file_names_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.json");
        fs::write(&path, "{not json").expect("write");
        let err = load_history(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse history"));
    }
}
