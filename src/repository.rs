//! # Working Copies and the Git Seam
//!
//! The strategy engine never calls `git` directly. It goes through the
//! [`GitOperations`] trait so that tests can substitute a recording mock,
//! and the default implementation, [`DefaultGitOperations`], delegates to
//! the shell-based functions in [`crate::git`].
//!
//! [`WorkingCopy`] owns the ephemeral clone directory
//! `<clone-dir>/<owner>/<name>` and removes it when dropped unless files are
//! to be kept. Removal failures are logged, never escalated.

use crate::cancel::Cancellation;
use crate::error::Result;
use crate::git;
use crate::gitconfig::Identity;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Trait for git operations - allows mocking in tests
///
/// Every method receives the run's cancellation token; implementations that
/// block must give up with `Error::Cancelled` once it fires.
pub trait GitOperations: Send + Sync {
    /// Shallow-clone `branch` of `url` into `target_dir`.
    fn clone_shallow(
        &self,
        url: &str,
        branch: &str,
        target_dir: &Path,
        cancel: &Cancellation,
    ) -> Result<()>;

    /// Switch to `name`: a fresh branch from HEAD when `create` is true,
    /// otherwise a local branch tracking `origin/<name>`.
    fn switch_branch(&self, dir: &Path, name: &str, create: bool, cancel: &Cancellation)
        -> Result<()>;

    /// Hard-reset the current branch to `reference`.
    fn reset_hard(&self, dir: &Path, reference: &str, cancel: &Cancellation) -> Result<()>;

    /// Stage and commit everything. `None` when there was nothing to commit.
    fn commit(
        &self,
        dir: &Path,
        message: &str,
        author: &Identity,
        committer: &Identity,
        cancel: &Cancellation,
    ) -> Result<Option<String>>;

    /// Tree id of `rev`, `None` if it does not exist.
    fn tree_id(&self, dir: &Path, rev: &str, cancel: &Cancellation) -> Result<Option<String>>;

    /// Push `branch` to the remote at `url` under the same name.
    fn push(
        &self,
        dir: &Path,
        url: &str,
        branch: &str,
        force: bool,
        cancel: &Cancellation,
    ) -> Result<()>;
}

/// Default implementation using the system `git` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_shallow(
        &self,
        url: &str,
        branch: &str,
        target_dir: &Path,
        cancel: &Cancellation,
    ) -> Result<()> {
        git::clone_shallow(url, branch, target_dir, cancel)
    }

    fn switch_branch(
        &self,
        dir: &Path,
        name: &str,
        create: bool,
        cancel: &Cancellation,
    ) -> Result<()> {
        if create {
            git::create_branch(dir, name, cancel)
        } else {
            git::track_branch(dir, name, cancel)
        }
    }

    fn reset_hard(&self, dir: &Path, reference: &str, cancel: &Cancellation) -> Result<()> {
        git::reset_hard(dir, reference, cancel)
    }

    fn commit(
        &self,
        dir: &Path,
        message: &str,
        author: &Identity,
        committer: &Identity,
        cancel: &Cancellation,
    ) -> Result<Option<String>> {
        git::commit_all(dir, message, author, committer, cancel)
    }

    fn tree_id(&self, dir: &Path, rev: &str, cancel: &Cancellation) -> Result<Option<String>> {
        git::tree_id(dir, rev, cancel)
    }

    fn push(
        &self,
        dir: &Path,
        url: &str,
        branch: &str,
        force: bool,
        cancel: &Cancellation,
    ) -> Result<()> {
        git::push(dir, url, branch, force, cancel)
    }
}

/// An ephemeral clone directory, removed on drop unless kept.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
    keep: bool,
}

impl WorkingCopy {
    /// Reserve `<clone_dir>/<owner>/<name>`. Nothing is created yet.
    pub fn new(clone_dir: &Path, owner: &str, name: &str, keep: bool) -> Self {
        Self {
            path: clone_dir.join(owner).join(name),
            keep,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if self.keep {
            debug!("keeping working copy {}", self.path.display());
            return;
        }
        if !self.path.exists() {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("removed working copy {}", self.path.display()),
            Err(e) => warn!(
                "failed to remove working copy {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
