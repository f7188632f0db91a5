//! Glob expansion inside a working copy.

use crate::error::{Error, Result};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};

/// List files under `working_copy` whose relative path matches `pattern`.
///
/// The `.git` directory is never matched. Results are sorted so that
/// operations touch files in a stable order.
pub fn matching_files(working_copy: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
    let mut matches = Vec::new();

    for entry in walkdir::WalkDir::new(working_copy)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Ok(relative) = entry.path().strip_prefix(working_copy) else {
            continue;
        };
        if let Some(relative) = relative.to_str() {
            if pattern.matches(relative) {
                matches.push(entry.path().to_path_buf());
            }
        }
    }

    matches.sort();
    Ok(matches)
}

/// Like [`matching_files`] but an empty match is an error for `updater`.
pub fn require_matches(
    working_copy: &Path,
    pattern: &str,
    updater: &str,
) -> Result<Vec<PathBuf>> {
    let files = matching_files(working_copy, pattern)?;
    if files.is_empty() {
        return Err(Error::updater(updater, format!("no files match {}", pattern)));
    }
    Ok(files)
}

/// Write `new` to `path` when it differs from `old`. Returns whether it wrote.
pub fn write_if_changed(path: &Path, old: &str, new: &str) -> Result<bool> {
    if old == new {
        return Ok(false);
    }
    fs::write(path, new)?;
    Ok(true)
}
