//! # Update Operations
//!
//! An update spec such as `regex(file=go.mod,pattern='go (\S+)')=1.22` is
//! parsed once at startup into an [`Updater`]. The parsed list is shared
//! read-only by every repository task, so updaters hold only immutable
//! configuration (compiled patterns, parsed paths, value sources).
//!
//! ## Kinds
//!
//! | name    | value | effect                                            |
//! |---------|-------|---------------------------------------------------|
//! | `exec`  | no    | run a command in the working copy                 |
//! | `regex` | yes   | replace the capture group of a pattern            |
//! | `yaml`  | yes   | set the value at a dot/bracket path               |
//! | `yq`    | yes   | set every node matched by a `.a[].b` expression   |
//! | `helm`  | yes   | bump a chart dependency version                   |
//! | `sops`  | yes   | set a value in a sops-encrypted file              |

pub mod exec;
pub mod files;
pub mod helm;
pub mod regex;
pub mod sops;
pub mod yaml;
pub mod yaml_edit;

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::params::{self, Params};
use crate::valuer::ValueSource;
use std::path::Path;

pub use self::exec::ExecUpdater;
pub use self::helm::HelmUpdater;
pub use self::regex::RegexUpdater;
pub use self::sops::SopsUpdater;
pub use self::yaml::{YamlPathUpdater, YqUpdater};

/// Human-readable title and body for one update operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    pub title: String,
    pub body: String,
}

/// A configured update operation.
#[derive(Debug, Clone)]
pub enum Updater {
    Exec(ExecUpdater),
    Regex(RegexUpdater),
    YamlPath(YamlPathUpdater),
    Yq(YqUpdater),
    Helm(HelmUpdater),
    Sops(SopsUpdater),
}

impl Updater {
    /// Apply to a working copy, returning whether anything changed.
    ///
    /// External processes started by `exec` and `sops` are killed when
    /// `cancel` fires.
    pub fn apply(&self, working_copy: &Path, cancel: &Cancellation) -> Result<bool> {
        match self {
            Updater::Exec(u) => u.apply(working_copy, cancel),
            Updater::Regex(u) => u.apply(working_copy),
            Updater::YamlPath(u) => u.apply(working_copy),
            Updater::Yq(u) => u.apply(working_copy),
            Updater::Helm(u) => u.apply(working_copy),
            Updater::Sops(u) => u.apply(working_copy, cancel),
        }
    }

    pub fn describe(&self) -> Description {
        match self {
            Updater::Exec(u) => u.describe(),
            Updater::Regex(u) => u.describe(),
            Updater::YamlPath(u) => u.describe(),
            Updater::Yq(u) => u.describe(),
            Updater::Helm(u) => u.describe(),
            Updater::Sops(u) => u.describe(),
        }
    }

    /// The registered kind name.
    pub fn label(&self) -> &'static str {
        match self {
            Updater::Exec(_) => "exec",
            Updater::Regex(_) => "regex",
            Updater::YamlPath(_) => "yaml",
            Updater::Yq(_) => "yq",
            Updater::Helm(_) => "helm",
            Updater::Sops(_) => "sops",
        }
    }
}

type Constructor = fn(&Params, Option<ValueSource>) -> Result<Updater>;

struct Kind {
    name: &'static str,
    takes_value: bool,
    build: Constructor,
}

const UPDATERS: &[Kind] = &[
    Kind {
        name: "exec",
        takes_value: false,
        build: |p, _| ExecUpdater::from_params(p).map(Updater::Exec),
    },
    Kind {
        name: "regex",
        takes_value: true,
        build: |p, v| RegexUpdater::new(p, v.unwrap_or_default()).map(Updater::Regex),
    },
    Kind {
        name: "yaml",
        takes_value: true,
        build: |p, v| YamlPathUpdater::new(p, v.unwrap_or_default()).map(Updater::YamlPath),
    },
    Kind {
        name: "yq",
        takes_value: true,
        build: |p, v| YqUpdater::new(p, v.unwrap_or_default()).map(Updater::Yq),
    },
    Kind {
        name: "helm",
        takes_value: true,
        build: |p, v| HelmUpdater::new(p, v.unwrap_or_default()).map(Updater::Helm),
    },
    Kind {
        name: "sops",
        takes_value: true,
        build: |p, v| SopsUpdater::new(p, v.unwrap_or_default()).map(Updater::Sops),
    },
];

/// Names of every registered updater kind.
pub fn kinds() -> impl Iterator<Item = &'static str> {
    UPDATERS.iter().map(|k| k.name)
}

/// Parse one update spec.
pub fn parse_updater(spec: &str) -> Result<Updater> {
    let expr = params::parse_expression(spec, "updater")?;
    let kind = UPDATERS
        .iter()
        .find(|k| k.name == expr.name)
        .ok_or_else(|| Error::UnknownUpdater {
            name: expr.name.clone(),
        })?;

    let value = match (&expr.value, kind.takes_value) {
        (Some(_), false) => {
            return Err(Error::syntax(
                spec,
                format!("updater {} does not take a value", kind.name),
            ))
        }
        (None, true) => {
            return Err(Error::syntax(
                spec,
                format!("updater {} requires a value", kind.name),
            ))
        }
        (Some(text), true) => Some(
            ValueSource::parse(text).map_err(|e| Error::updater(kind.name, e.to_string()))?,
        ),
        (None, false) => None,
    };

    (kind.build)(&expr.params, value).map_err(|e| match e {
        e @ Error::Updater { .. } => e,
        other => Error::updater(kind.name, other.to_string()),
    })
}

/// Parse every spec in order, skipping blank entries.
///
/// Any failure rejects the whole batch.
pub fn parse_updaters<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Updater>> {
    specs
        .iter()
        .map(AsRef::as_ref)
        .filter(|spec| !spec.trim().is_empty())
        .map(|spec| parse_updater(spec.trim()))
        .collect()
}
