// ABOUTME: Shared output helpers for CLI commands (JSON serialization, path display)

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use super::OutputFormat;

/// Print `value` as JSON, or hand it to `text` for the human-readable form
pub fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => output_json(value)?,
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Output any serializable value as pretty JSON
pub fn output_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// `path` relative to `base` when it lies inside it, for shorter output
#[must_use]
pub fn display_path(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}
