//! Records files: one 120-byte data record per line.

use std::path::Path;

use anyhow::{Context, Result};
use zengin_core::DataRecord;

/// Parse a records file. Blank lines are skipped and a trailing `\r` is
/// dropped; every other line must be exactly one record wide.
pub fn parse(contents: &[u8]) -> Result<Vec<DataRecord>> {
    contents
        .split(|&b| b == b'\n')
        .enumerate()
        .map(|(i, line)| (i + 1, line.strip_suffix(b"\r").unwrap_or(line)))
        .filter(|(_, line)| !line.is_empty())
        .map(|(n, line)| DataRecord::try_from(line).with_context(|| format!("line {n}")))
        .collect()
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<DataRecord>> {
    let path = path.as_ref();
    let contents =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let records = parse(&contents)
        .with_context(|| format!("invalid records file {}", path.display()))?;
    tracing::debug!(path = %path.display(), records = records.len(), "records file loaded");
    Ok(records)
}
