//! Reading source documents.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Read a document as UTF-8 text with Windows line endings normalized.
pub fn read_document(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).with_context(|| format!("read document {}", path.display()))?;
    Ok(if raw.contains("\r\n") {
        raw.replace("\r\n", "\n")
    } else {
        raw
    })
}
