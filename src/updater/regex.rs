//! `regex` updater: replace the capture group of a pattern in matching files.

use super::{files, Description};
use crate::error::{Error, Result};
use crate::params::{self, Params};
use crate::valuer::ValueSource;
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

/// Replaces the single capturing group of `pattern` with the resolved value
/// in every file matching `file`. Text outside the group is preserved.
#[derive(Debug, Clone)]
pub struct RegexUpdater {
    file: String,
    pattern: Regex,
    value: ValueSource,
}

impl RegexUpdater {
    pub fn new(params: &Params, value: ValueSource) -> Result<Self> {
        let file = params::required(params, "file")?.to_string();
        let pattern = Regex::new(params::required(params, "pattern")?)?;
        let groups = pattern.captures_len() - 1;
        if groups != 1 {
            return Err(Error::InvalidParam {
                param: "pattern".to_string(),
                message: format!("must contain exactly one capturing group, found {}", groups),
            });
        }
        Ok(Self {
            file,
            pattern,
            value,
        })
    }

    pub fn apply(&self, working_copy: &Path) -> Result<bool> {
        let value = self
            .value
            .resolve(working_copy)
            .map_err(|e| Error::updater("regex", e.to_string()))?;
        let mut changed = false;
        for path in files::require_matches(working_copy, &self.file, "regex")? {
            let content = fs::read_to_string(&path)?;
            let updated = replace_group(&self.pattern, &content, &value);
            changed |= files::write_if_changed(&path, &content, &updated)?;
        }
        Ok(changed)
    }

    pub fn describe(&self) -> Description {
        Description {
            title: format!("Update {} to {}", self.file, self.value.describe()),
            body: format!(
                "Replaced `{}` in files matching `{}` with `{}`.",
                self.pattern.as_str(),
                self.file,
                self.value.describe()
            ),
        }
    }
}

/// Replace the first capture group of every match of `pattern` with `value`.
pub fn replace_group(pattern: &Regex, content: &str, value: &str) -> String {
    pattern
        .replace_all(content, |caps: &Captures| match (caps.get(0), caps.get(1)) {
            (Some(whole), Some(group)) => {
                let text = whole.as_str();
                let start = group.start() - whole.start();
                let end = group.end() - whole.start();
                format!("{}{}{}", &text[..start], value, &text[end..])
            }
            (Some(whole), None) => whole.as_str().to_string(),
            _ => String::new(),
        })
        .into_owned()
}
