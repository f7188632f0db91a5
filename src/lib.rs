//! # Repo Scribe Library
//!
//! This library provides the core functionality for applying the same set of
//! declarative file updates to many repositories and delivering each change
//! as a pull request. It is designed to be used by the `scribe`
//! command-line tool but can also be embedded in other automation.
//!
//! ## Quick Example
//!
//! ```
//! use repo_scribe::target::parse_literal;
//! use repo_scribe::updater::parse_updater;
//!
//! // An update operation: rewrite the capture group in every matching file
//! let updater = parse_updater(r"regex(file=VERSION,pattern='version=(\S+)')=2.0").unwrap();
//! assert_eq!(updater.label(), "regex");
//!
//! // A repository target with per-repository parameters
//! let target = parse_literal("acme/widgets(draft=true)").unwrap();
//! assert_eq!(target.full_name(), "acme/widgets");
//! assert_eq!(target.param_bool("draft"), Some(true));
//! ```
//!
//! ## Core Concepts
//!
//! - **Update operations (`updater`, `valuer`, `params`)**: the
//!   `name(key=value,...)=value` mini-language is parsed once at startup into
//!   immutable [`updater::Updater`] values (exec, regex, yaml, yq, helm,
//!   sops). Values are literals or valuer calls such as `file(path=VERSION)`.
//! - **Repository targets (`target`)**: literal `owner/name(params)` specs,
//!   lists read from environment variables, or GitHub search queries.
//! - **Strategy engine (`strategy`)**: the per-repository state machine and
//!   the three strategies (`reset`, `append`, `recreate`) deciding how pull
//!   requests are reused across runs.
//! - **Orchestrator (`orchestrator`)**: runs the engine for every target
//!   concurrently and aggregates the results.
//! - **Collaborators (`git`, `repository`, `github`)**: git plumbing through
//!   the system `git` binary behind the `GitOperations` trait, and the GitHub
//!   REST client behind the `Forge` trait.
//!
//! ## Execution Flow
//!
//! For each repository, the engine executes:
//!
//! 1.  **Clone**: shallow clone of the base branch into a private directory.
//! 2.  **Branch**: reuse the branch of a matching pull request, or create a
//!     fresh one.
//! 3.  **Update**: apply every operation in order.
//! 4.  **Commit**: commit with a resolved author and committer identity.
//! 5.  **Push**: push the branch, forced when the strategy resets it.
//! 6.  **Pull request**: create or update it, converge labels, add comments.
//! 7.  **Merge**: optionally wait for mergeability and merge.

pub mod cancel;
pub mod defaults;
pub mod error;
pub mod git;
pub mod gitconfig;
pub mod github;
pub mod message;
pub mod options;
pub mod orchestrator;
pub mod output;
pub mod params;
pub mod repository;
pub mod strategy;
pub mod target;
pub mod updater;
pub mod valuer;

#[cfg(test)]
mod params_proptest;
