//! # Strategy Engine
//!
//! Runs one repository through
//! `clone → branch → update → commit → push → pull request → merge`.
//!
//! The three strategies differ only in the five fields of [`Strategy`]; the
//! code path is the same for all of them.
//!
//! | strategy   | find PR | reused PR text | reset to base | force push | new branch |
//! |------------|---------|----------------|---------------|------------|------------|
//! | `reset`    | yes     | replace        | yes           | yes        | no         |
//! | `append`   | yes     | append         | no            | no         | no         |
//! | `recreate` | no      | ignore         | no            | no         | always     |
//!
//! `reset` is idempotent: the reused branch is rebuilt from the base branch
//! on every run, and when the resulting tree equals what is already on the
//! remote branch the run reports `updated=false` without pushing or touching
//! the pull request.

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::git;
use crate::github::{Forge, MergeRequest, NewPullRequest, PullRequest, PullRequestEdit, PullRequestRef};
use crate::gitconfig::IdentityResolver;
use crate::message::{self, Placeholders, TextMode, Texts};
use crate::options::UpdateOptions;
use crate::repository::{GitOperations, WorkingCopy};
use crate::target::RepositoryTarget;
use crate::updater::Updater;
use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use uuid::Uuid;

/// Selectable strategy names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StrategyKind {
    #[default]
    Reset,
    Append,
    Recreate,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Reset => "reset",
            StrategyKind::Append => "append",
            StrategyKind::Recreate => "recreate",
        }
    }

    /// The descriptor this name binds.
    pub fn strategy(self) -> Strategy {
        match self {
            StrategyKind::Reset => Strategy {
                find_matching_pull_request: true,
                default_update_operation: TextMode::Replace,
                reset_branch_from_base: true,
                force_push: true,
                force_branch_creation: false,
            },
            StrategyKind::Append => Strategy {
                find_matching_pull_request: true,
                default_update_operation: TextMode::Append,
                reset_branch_from_base: false,
                force_push: false,
                force_branch_creation: false,
            },
            StrategyKind::Recreate => Strategy {
                find_matching_pull_request: false,
                default_update_operation: TextMode::Ignore,
                reset_branch_from_base: false,
                force_push: false,
                force_branch_creation: true,
            },
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reset" => Ok(StrategyKind::Reset),
            "append" => Ok(StrategyKind::Append),
            "recreate" => Ok(StrategyKind::Recreate),
            other => Err(Error::Config {
                message: format!("unknown strategy {:?} (reset, append, recreate)", other),
            }),
        }
    }
}

/// The five fields that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub find_matching_pull_request: bool,
    /// How a reused pull request's title and body are updated.
    pub default_update_operation: TextMode,
    pub reset_branch_from_base: bool,
    pub force_push: bool,
    pub force_branch_creation: bool,
}

/// Result of one repository run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub updated: bool,
    pub merged: bool,
    pub pull_request: Option<PullRequestRef>,
    pub branch: Option<String>,
}

/// Runs the state machine for one repository at a time. Shared read-only
/// by every repository task.
pub struct Engine<'a> {
    git: &'a dyn GitOperations,
    forge: &'a dyn Forge,
    updaters: &'a [Updater],
    cancel: &'a Cancellation,
}

/// A fresh, globally unique and time-sortable branch name.
pub fn new_branch_name(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::now_v7().simple())
}

impl<'a> Engine<'a> {
    pub fn new(
        git: &'a dyn GitOperations,
        forge: &'a dyn Forge,
        updaters: &'a [Updater],
        cancel: &'a Cancellation,
    ) -> Self {
        Self {
            git,
            forge,
            updaters,
            cancel,
        }
    }

    /// Process `target` with its own `options` (already overlaid with the
    /// repository's parameters). Every error names the repository and step.
    pub fn run(&self, target: &RepositoryTarget, options: &UpdateOptions) -> Result<RunOutcome> {
        let repo = target.full_name();
        let step = |name: &'static str| {
            let repo = repo.clone();
            move |e: Error| e.in_repository(repo, name)
        };
        let strategy = options.strategy.strategy();
        let base = options.pull_request.base_branch.as_str();

        // Clone
        self.cancel.check().map_err(step("clone"))?;
        let wc = WorkingCopy::new(
            &options.git.clone_dir,
            &target.owner,
            &target.name,
            options.keep_files,
        );
        let url = git::remote_url(
            &options.git.git_url,
            &target.owner,
            &target.name,
            &options.pull_request.token,
        )
        .map_err(step("clone"))?;
        info!("{}: cloning {} into {}", repo, git::redact(&url), wc.path().display());
        self.git
            .clone_shallow(&url, base, wc.path(), self.cancel)
            .map_err(step("clone"))?;

        // Branch selection
        self.cancel.check().map_err(step("branch"))?;
        let existing = if strategy.find_matching_pull_request {
            self.find_pull_request(target, options)
                .map_err(step("branch"))?
        } else {
            None
        };
        let branch = match &existing {
            Some(pr) if !strategy.force_branch_creation => {
                info!("{}: reusing branch {} of #{}", repo, pr.head_ref, pr.number);
                self.git
                    .switch_branch(wc.path(), &pr.head_ref, false, self.cancel)
                    .map_err(step("branch"))?;
                if strategy.reset_branch_from_base {
                    self.git
                        .reset_hard(wc.path(), &format!("origin/{}", base), self.cancel)
                        .map_err(step("branch"))?;
                }
                pr.head_ref.clone()
            }
            _ => {
                let name = new_branch_name(&options.git.branch_prefix);
                info!("{}: creating branch {}", repo, name);
                self.git
                    .switch_branch(wc.path(), &name, true, self.cancel)
                    .map_err(step("branch"))?;
                name
            }
        };
        let reused = existing.is_some() && !strategy.force_branch_creation;
        let unchanged = |pull_request: Option<PullRequestRef>| RunOutcome {
            updated: false,
            merged: false,
            pull_request,
            branch: Some(branch.clone()),
        };

        // Apply updates, in order, stopping at the first failure
        let mut descriptions = Vec::new();
        for updater in self.updaters {
            self.cancel.check().map_err(step("update"))?;
            let changed = updater
                .apply(wc.path(), self.cancel)
                .map_err(step("update"))?;
            debug!("{}: {} changed={}", repo, updater.label(), changed);
            if changed {
                descriptions.push(updater.describe());
            }
        }
        if descriptions.is_empty() {
            info!("{}: no changes", repo);
            return Ok(unchanged(existing.as_ref().map(PullRequest::reference)));
        }

        // Commit
        self.cancel.check().map_err(step("commit"))?;
        let placeholders = Placeholders {
            owner: target.owner.clone(),
            name: target.name.clone(),
            branch: branch.clone(),
        };
        let texts = message::compose(options, &descriptions, &placeholders);
        let (author, committer) = IdentityResolver::for_working_copy(wc.path())
            .resolve(&options.git.author, &options.git.committer)
            .map_err(step("commit"))?;
        let Some(sha) = self
            .git
            .commit(
                wc.path(),
                &texts.commit_message,
                &author,
                &committer,
                self.cancel,
            )
            .map_err(step("commit"))?
        else {
            info!("{}: updates left no net changes", repo);
            return Ok(unchanged(existing.as_ref().map(PullRequest::reference)));
        };
        debug!("{}: committed {}", repo, sha);

        if reused && self.matches_remote(wc.path(), &branch).map_err(step("commit"))? {
            info!("{}: branch {} is already up to date", repo, branch);
            return Ok(unchanged(existing.as_ref().map(PullRequest::reference)));
        }

        if options.dry_run {
            info!(
                "{}: dry run, not pushing {} or {} a pull request",
                repo,
                branch,
                if reused { "updating" } else { "opening" }
            );
            return Ok(RunOutcome {
                updated: true,
                merged: false,
                pull_request: existing.as_ref().map(PullRequest::reference),
                branch: Some(branch),
            });
        }

        // Push
        self.cancel.check().map_err(step("push"))?;
        info!("{}: pushing {}", repo, branch);
        self.git
            .push(wc.path(), &url, &branch, strategy.force_push, self.cancel)
            .map_err(step("push"))?;

        // Pull request
        self.cancel.check().map_err(step("pull-request"))?;
        let pr = self
            .reconcile_pull_request(target, options, &strategy, existing, &branch, &texts)
            .map_err(step("pull-request"))?;

        // Merge
        let merged = if options.merge.enabled {
            self.cancel.check().map_err(step("merge"))?;
            self.merge(target, options, &pr, &sha, &placeholders)
                .map_err(step("merge"))?;
            true
        } else {
            false
        };

        Ok(RunOutcome {
            updated: true,
            merged,
            pull_request: Some(pr.reference()),
            branch: Some(branch),
        })
    }

    /// The first open pull request against the base branch that carries
    /// every required label.
    fn find_pull_request(
        &self,
        target: &RepositoryTarget,
        options: &UpdateOptions,
    ) -> Result<Option<PullRequest>> {
        let labels = &options.pull_request.labels;
        if labels.is_empty() {
            warn!(
                "{}: no pull request labels configured, not reusing pull requests",
                target
            );
            return Ok(None);
        }
        let found = self
            .forge
            .find_pull_requests(&target.owner, &target.name, &options.pull_request.base_branch)?
            .into_iter()
            .find(|pr| pr.has_labels(labels));
        if let Some(pr) = &found {
            debug!("{}: found matching pull request #{}", target, pr.number);
        }
        Ok(found)
    }

    /// True when HEAD's tree equals the tree of `origin/<branch>`.
    fn matches_remote(&self, dir: &std::path::Path, branch: &str) -> Result<bool> {
        let remote = self
            .git
            .tree_id(dir, &format!("origin/{}", branch), self.cancel)?;
        let local = self.git.tree_id(dir, "HEAD", self.cancel)?;
        Ok(remote.is_some() && remote == local)
    }

    fn reconcile_pull_request(
        &self,
        target: &RepositoryTarget,
        options: &UpdateOptions,
        strategy: &Strategy,
        existing: Option<PullRequest>,
        branch: &str,
        texts: &Texts,
    ) -> Result<PullRequest> {
        let (owner, name) = (target.owner.as_str(), target.name.as_str());
        let pr = match existing {
            Some(pr) => {
                let mode = strategy.default_update_operation;
                let edit = PullRequestEdit {
                    title: mode.merge_title(&pr.title, &texts.pr_title),
                    body: mode.merge(&pr.body, &texts.pr_body),
                };
                if edit.is_empty() {
                    pr
                } else {
                    info!("{}: updating pull request #{}", target, pr.number);
                    let mut edited = self.forge.edit_pull_request(owner, name, pr.number, &edit)?;
                    // some edit responses omit labels; keep what we knew
                    if edited.labels.is_empty() {
                        edited.labels = pr.labels;
                    }
                    edited
                }
            }
            None => {
                let new = NewPullRequest {
                    title: texts.pr_title.clone(),
                    body: texts.pr_body.clone(),
                    head: branch.to_string(),
                    base: options.pull_request.base_branch.clone(),
                    draft: options.pull_request.draft,
                };
                let pr = self.forge.create_pull_request(owner, name, &new)?;
                info!(
                    "{}: opened {}pull request #{} {}",
                    target,
                    if new.draft { "draft " } else { "" },
                    pr.number,
                    pr.url
                );
                pr
            }
        };

        let missing = pr.missing_labels(&options.pull_request.labels);
        if !missing.is_empty() {
            debug!("{}: adding labels {:?} to #{}", target, missing, pr.number);
            self.forge.add_labels(owner, name, pr.number, &missing)?;
        }

        let placeholders = Placeholders {
            owner: target.owner.clone(),
            name: target.name.clone(),
            branch: branch.to_string(),
        };
        for (i, comment) in options.pull_request.comments.iter().enumerate() {
            if i > 0 {
                self.cancel.sleep(options.pull_request.comment_pause)?;
            }
            self.forge
                .add_comment(owner, name, pr.number, &placeholders.expand(comment))?;
        }
        Ok(pr)
    }

    /// Poll until mergeability settles, then merge pinned to `sha`.
    fn merge(
        &self,
        target: &RepositoryTarget,
        options: &UpdateOptions,
        pr: &PullRequest,
        sha: &str,
        placeholders: &Placeholders,
    ) -> Result<()> {
        let merge = &options.merge;
        let deadline = Instant::now() + merge.poll_timeout;
        loop {
            self.cancel.check()?;
            let current = self
                .forge
                .get_pull_request(&target.owner, &target.name, pr.number)?;
            match current.mergeable {
                Some(true) => break,
                Some(false) => return Err(Error::NotMergeable { number: pr.number }),
                None => debug!("{}: mergeability of #{} not known yet", target, pr.number),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::MergeTimeout {
                    number: pr.number,
                    timeout: humantime::format_duration(merge.poll_timeout).to_string(),
                });
            }
            self.cancel
                .sleep(merge.poll_interval.min(deadline - now))?;
        }

        let request = MergeRequest {
            method: merge.method,
            commit_title: merge.commit_title.as_deref().map(|t| placeholders.expand(t)),
            commit_message: merge
                .commit_message
                .as_deref()
                .map(|m| placeholders.expand(m)),
            sha: Some(sha.to_string()),
        };
        self.forge
            .merge_pull_request(&target.owner, &target.name, pr.number, &request)?;
        info!("{}: merged #{} ({})", target, pr.number, merge.method);
        Ok(())
    }
}
