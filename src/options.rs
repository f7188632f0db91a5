//! # Update Options
//!
//! [`UpdateOptions`] is the configuration snapshot built once from the
//! command line. Each repository task works on its own copy produced by
//! [`UpdateOptions::for_target`], which overlays that repository's
//! `draft`/`merge` parameters; overrides therefore never leak between
//! concurrently processed repositories.

use crate::defaults;
use crate::github::MergeMethod;
use crate::gitconfig::PartialIdentity;
use crate::strategy::StrategyKind;
use crate::target::RepositoryTarget;
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

/// Git identity and commit settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOptions {
    pub author: PartialIdentity,
    pub committer: PartialIdentity,
    pub commit_title: Option<String>,
    pub commit_body: Option<String>,
    /// Footer block after a `-- ` line. `None` disables it.
    pub commit_footer: Option<String>,
    pub branch_prefix: String,
    pub clone_dir: PathBuf,
    /// Base URL repositories are cloned from (`<git_url>/<owner>/<name>.git`).
    pub git_url: String,
}

/// Pull request settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestOptions {
    pub token: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub comments: Vec<String>,
    pub labels: Vec<String>,
    pub base_branch: String,
    pub draft: bool,
    pub comment_pause: Duration,
}

/// Merge policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub enabled: bool,
    pub method: MergeMethod,
    pub commit_title: Option<String>,
    pub commit_message: Option<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    pub git: GitOptions,
    pub pull_request: PullRequestOptions,
    pub merge: MergeOptions,
    pub strategy: StrategyKind,
    pub dry_run: bool,
    pub keep_files: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            git: GitOptions {
                author: PartialIdentity::default(),
                committer: PartialIdentity::default(),
                commit_title: None,
                commit_body: None,
                commit_footer: Some(defaults::FOOTER.to_string()),
                branch_prefix: defaults::BRANCH_PREFIX.to_string(),
                clone_dir: defaults::default_clone_dir(),
                git_url: defaults::GIT_URL.to_string(),
            },
            pull_request: PullRequestOptions {
                token: String::new(),
                title: None,
                body: None,
                comments: Vec::new(),
                labels: vec![defaults::PR_LABEL.to_string()],
                base_branch: defaults::BASE_BRANCH.to_string(),
                draft: false,
                comment_pause: defaults::COMMENT_PAUSE,
            },
            merge: MergeOptions {
                enabled: false,
                method: MergeMethod::default(),
                commit_title: None,
                commit_message: None,
                poll_interval: defaults::MERGE_POLL_INTERVAL,
                poll_timeout: defaults::MERGE_POLL_TIMEOUT,
            },
            strategy: StrategyKind::default(),
            dry_run: false,
            keep_files: false,
        }
    }
}

impl UpdateOptions {
    /// A private copy with `target`'s parameters applied.
    ///
    /// `draft` and `merge` take precedence over the global flags when they
    /// parse as booleans; unparseable values are ignored.
    pub fn for_target(&self, target: &RepositoryTarget) -> UpdateOptions {
        let mut options = self.clone();
        if let Some(draft) = target.param_bool("draft") {
            debug!("{}: draft={} from repository parameters", target, draft);
            options.pull_request.draft = draft;
        }
        if let Some(merge) = target.param_bool("merge") {
            debug!("{}: merge={} from repository parameters", target, merge);
            options.merge.enabled = merge;
        }
        options
    }
}
