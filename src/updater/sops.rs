//! `sops` updater: set a value inside a sops-encrypted file.
//!
//! Encryption stays with the `sops` binary. We read the current value with
//! `sops --decrypt --extract` and only call `sops --set` when it differs, so
//! an unchanged secret never produces a re-encrypted (and therefore
//! different) file.

use super::yaml::{parse_path, PathSegment};
use super::{files, Description};
use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::params::{self, Params};
use crate::valuer::ValueSource;
use log::debug;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone)]
pub struct SopsUpdater {
    file: String,
    path: String,
    selector: String,
    binary: String,
    value: ValueSource,
}

impl SopsUpdater {
    pub fn new(params: &Params, value: ValueSource) -> Result<Self> {
        let file = params::required(params, "file")?.to_string();
        let path = params::required(params, "path")?.to_string();
        let selector = selector(&parse_path(&path)?)?;
        let binary = params
            .get("binary")
            .filter(|b| !b.is_empty())
            .cloned()
            .unwrap_or_else(|| "sops".to_string());
        Ok(Self {
            file,
            path,
            selector,
            binary,
            value,
        })
    }

    pub fn apply(&self, working_copy: &Path, cancel: &Cancellation) -> Result<bool> {
        let value = self
            .value
            .resolve(working_copy)
            .map_err(|e| Error::updater("sops", e.to_string()))?;
        let mut changed = false;

        for file in files::require_matches(working_copy, &self.file, "sops")? {
            let current = self.run(
                working_copy,
                &["--decrypt", "--extract", &self.selector],
                &file,
                cancel,
            );
            match current {
                Ok(current) if current.trim_end_matches('\n') == value => continue,
                Ok(_) => {}
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => debug!("{}: current value unavailable: {}", file.display(), e),
            }
            let assignment = format!("{} {}", self.selector, serde_json::to_string(&value)?);
            self.run(working_copy, &["--set", &assignment], &file, cancel)?;
            changed = true;
        }
        Ok(changed)
    }

    pub fn describe(&self) -> Description {
        Description {
            title: format!("Update secret {}", self.path),
            body: format!(
                "Set `{}` in sops-encrypted files matching `{}`.",
                self.path, self.file
            ),
        }
    }

    fn run(
        &self,
        working_copy: &Path,
        args: &[&str],
        file: &Path,
        cancel: &Cancellation,
    ) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).arg(file).current_dir(working_copy);
        let output = cancel.output(&mut cmd).map_err(|e| match e {
            Error::Io(e) => {
                Error::updater("sops", format!("failed to run {}: {}", self.binary, e))
            }
            other => other,
        })?;
        if !output.status.success() {
            return Err(Error::updater(
                "sops",
                format!(
                    "{} {} failed: {}",
                    self.binary,
                    args.first().copied().unwrap_or_default(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Render a path in the `["key"][0]` form sops expects.
fn selector(segments: &[PathSegment]) -> Result<String> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => out.push_str(&format!("[{}]", serde_json::to_string(key)?)),
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
            PathSegment::Each => {
                return Err(Error::InvalidParam {
                    param: "path".to_string(),
                    message: "[] iteration is not supported for sops files".to_string(),
                })
            }
        }
    }
    Ok(out)
}
