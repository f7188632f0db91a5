//! # Error Handling
//!
//! This module defines the centralized error type for `repo-scribe`. It uses
//! the `thiserror` library to create a single `Error` enum that covers every
//! anticipated failure mode, with enough context in each variant that a log
//! line is actionable without re-running at a higher verbosity.
//!
//! The variants fall into three groups:
//!
//! - **Spec errors** (`SpecSyntax`, `UnknownUpdater`, `UnknownValuer`,
//!   `UnknownRepoSource`, `InvalidParam`): produced while parsing the
//!   `--update` and `--repo` mini-languages. These abort the whole run before
//!   any repository is touched.
//! - **Operational errors** (`Updater`, `Valuer`, `GitClone`, `GitCommand`,
//!   `GitHub`, `NotMergeable`, `MergeTimeout`, `Cancelled`): produced while
//!   working on a single repository.
//! - **`Repository`**: the wrapper every operational error receives when it
//!   leaves the strategy engine, naming the repository and the step.

use thiserror::Error;

/// Main error type for repo-scribe operations
#[derive(Error, Debug)]
pub enum Error {
    /// A specification string could not be parsed.
    #[error("Syntax error in {input:?}: {message}")]
    SpecSyntax { input: String, message: String },

    /// The updater name is not registered.
    #[error("unknown updater {name}")]
    UnknownUpdater { name: String },

    /// The valuer name is not registered.
    #[error("unknown valuer {name}")]
    UnknownValuer { name: String },

    /// The repository source name (e.g. `env`, `search`) is not registered.
    #[error("unknown repository source {name}")]
    UnknownRepoSource { name: String },

    /// A parameter is missing or has an invalid value.
    #[error("invalid parameter {param}: {message}")]
    InvalidParam { param: String, message: String },

    /// An update operation failed to construct or apply.
    #[error("updater {updater}: {message}")]
    Updater { updater: String, message: String },

    /// A value source failed to resolve.
    #[error("valuer {valuer}: {message}")]
    Valuer { valuer: String, message: String },

    /// Cloning a repository failed.
    #[error("Git clone error for {url}: {message}")]
    GitClone { url: String, message: String },

    /// A git command exited unsuccessfully.
    #[error("Git command failed in {dir}: {command} - {stderr}")]
    GitCommand {
        command: String,
        dir: String,
        stderr: String,
    },

    /// The GitHub API returned an error or an unexpected payload.
    #[error("GitHub API error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    GitHub {
        status: Option<u16>,
        message: String,
    },

    /// GitHub reported the pull request as not mergeable.
    #[error("pull request #{number} is not mergeable")]
    NotMergeable { number: u64 },

    /// Mergeability did not settle before the poll timeout.
    #[error("timed out after {timeout} waiting for pull request #{number} to become mergeable")]
    MergeTimeout { number: u64, timeout: String },

    /// The run was cancelled or its deadline passed.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration (flags, identities, options).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Failure while processing one repository, with the step it failed in.
    #[error("{repo}: {step} failed: {source}")]
    Repository {
        repo: String,
        step: String,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// An HTTP transport error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Wrap this error with the repository and step it happened in.
    pub fn in_repository(self, repo: impl Into<String>, step: impl Into<String>) -> Self {
        Error::Repository {
            repo: repo.into(),
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Convenience constructor for `SpecSyntax`.
    pub fn syntax(input: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SpecSyntax {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for `Updater`.
    pub fn updater(updater: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Updater {
            updater: updater.into(),
            message: message.into(),
        }
    }

    /// True for the error produced by a fired cancellation token.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Repository { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
