//! # Value Sources
//!
//! The right-hand side of an update spec is either a literal string or a
//! valuer call such as `file(path=VERSION)`. Valuers are resolved lazily,
//! once per repository, because a file-backed value may only exist after the
//! repository has been cloned.

use crate::error::{Error, Result};
use crate::params::{self, Params};
use std::fs;
use std::path::{Path, PathBuf};

/// Where an update operation gets the value it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// The text itself, verbatim.
    Literal(String),
    /// The contents of a file, relative to the working copy unless absolute.
    File { path: PathBuf, trim: bool },
    /// The value of an environment variable at resolution time.
    Env { name: String },
}

impl Default for ValueSource {
    fn default() -> Self {
        ValueSource::Literal(String::new())
    }
}

type Constructor = fn(&Params) -> Result<ValueSource>;

/// Registered valuer kinds.
const VALUERS: &[(&str, Constructor)] = &[("file", file_valuer), ("env", env_valuer)];

impl ValueSource {
    /// Parse the value mini-language.
    ///
    /// `name(params)` dispatches to a registered valuer; anything else,
    /// including the empty string, is a literal.
    pub fn parse(text: &str) -> Result<Self> {
        if !params::is_call(text) {
            return Ok(ValueSource::Literal(text.to_string()));
        }
        let expr = params::parse_expression(text, "valuer")?;
        if expr.value.is_some() {
            return Err(Error::syntax(text, "a valuer takes no value"));
        }
        let constructor = VALUERS
            .iter()
            .find(|(name, _)| *name == expr.name)
            .map(|(_, constructor)| *constructor)
            .ok_or_else(|| Error::UnknownValuer {
                name: expr.name.clone(),
            })?;
        constructor(&expr.params).map_err(|e| Error::Valuer {
            valuer: expr.name.clone(),
            message: e.to_string(),
        })
    }

    /// Produce the value for one repository.
    pub fn resolve(&self, working_copy: &Path) -> Result<String> {
        match self {
            ValueSource::Literal(value) => Ok(value.clone()),
            ValueSource::File { path, trim } => {
                let full = if path.is_absolute() {
                    path.clone()
                } else {
                    working_copy.join(path)
                };
                let content = fs::read_to_string(&full).map_err(|e| Error::Valuer {
                    valuer: "file".to_string(),
                    message: format!("failed to read {}: {}", full.display(), e),
                })?;
                if *trim {
                    Ok(content.trim_end().to_string())
                } else {
                    Ok(content)
                }
            }
            ValueSource::Env { name } => std::env::var(name).map_err(|_| Error::Valuer {
                valuer: "env".to_string(),
                message: format!("environment variable {} is not set", name),
            }),
        }
    }

    /// Short human-readable form used in titles.
    pub fn describe(&self) -> String {
        match self {
            ValueSource::Literal(value) => value.clone(),
            ValueSource::File { path, .. } => format!("contents of {}", path.display()),
            ValueSource::Env { name } => format!("${}", name),
        }
    }
}

fn file_valuer(params: &Params) -> Result<ValueSource> {
    let path = params::required(params, "path")?;
    let trim = params
        .get("trim")
        .and_then(|v| params::parse_bool(v))
        .unwrap_or(true);
    Ok(ValueSource::File {
        path: PathBuf::from(path),
        trim,
    })
}

fn env_valuer(params: &Params) -> Result<ValueSource> {
    Ok(ValueSource::Env {
        name: params::required(params, "name")?.to_string(),
    })
}
