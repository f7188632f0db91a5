//! # Forge Abstraction
//!
//! The strategy engine talks to the code host only through the [`Forge`]
//! trait. [`client::GitHubClient`] implements it against the GitHub REST API;
//! tests substitute an in-memory implementation.

pub mod client;
pub mod retry;

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

pub use client::GitHubClient;

/// An open pull request as the engine needs to see it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub node_id: String,
    pub title: String,
    pub body: String,
    pub head_ref: String,
    pub head_sha: String,
    pub labels: Vec<String>,
    pub draft: bool,
    /// `None` while GitHub is still computing mergeability.
    pub mergeable: Option<bool>,
}

impl PullRequest {
    /// True when every label in `required` is present. Extra labels are
    /// ignored.
    pub fn has_labels(&self, required: &[String]) -> bool {
        required.iter().all(|l| self.labels.contains(l))
    }

    /// Required labels not yet on this pull request, in `required` order.
    pub fn missing_labels(&self, required: &[String]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for label in required {
            if !self.labels.contains(label) && !missing.contains(label) {
                missing.push(label.clone());
            }
        }
        missing
    }

    pub fn reference(&self) -> PullRequestRef {
        PullRequestRef {
            number: self.number,
            url: self.url.clone(),
            node_id: self.node_id.clone(),
        }
    }
}

/// Identity of a pull request reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
    pub node_id: String,
}

/// Fields for creating a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    pub draft: bool,
}

/// Fields to change on an existing pull request. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestEdit {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PullRequestEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }
}

/// How a pull request is merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "merge" => Ok(MergeMethod::Merge),
            "squash" => Ok(MergeMethod::Squash),
            "rebase" => Ok(MergeMethod::Rebase),
            other => Err(Error::Config {
                message: format!("unknown merge method {:?} (merge, squash, rebase)", other),
            }),
        }
    }
}

/// Parameters of the merge call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequest {
    pub method: MergeMethod,
    pub commit_title: Option<String>,
    pub commit_message: Option<String>,
    /// Head SHA the merge is pinned to.
    pub sha: Option<String>,
}

/// Which GitHub search endpoint a repository query uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchKind {
    #[default]
    Repositories,
    Code,
}

impl FromStr for SearchKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "repositories" => Ok(SearchKind::Repositories),
            "code" => Ok(SearchKind::Code),
            other => Err(Error::InvalidParam {
                param: "type".to_string(),
                message: format!("expected repositories or code, got {:?}", other),
            }),
        }
    }
}

/// Pull-request primitives of a code host.
///
/// Implementations must be shareable across threads: one instance serves
/// every concurrent repository task.
pub trait Forge: Send + Sync {
    /// Open pull requests whose base is `base`.
    fn find_pull_requests(&self, owner: &str, repo: &str, base: &str) -> Result<Vec<PullRequest>>;

    fn create_pull_request(&self, owner: &str, repo: &str, new: &NewPullRequest)
        -> Result<PullRequest>;

    fn edit_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        edit: &PullRequestEdit,
    ) -> Result<PullRequest>;

    fn add_labels(&self, owner: &str, repo: &str, number: u64, labels: &[String]) -> Result<()>;

    fn add_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<()>;

    fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest>;

    fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        merge: &MergeRequest,
    ) -> Result<()>;

    /// `(owner, name)` of every repository matched by a search query.
    fn search_repositories(&self, query: &str, kind: SearchKind) -> Result<Vec<(String, String)>>;
}
