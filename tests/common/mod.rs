//! Shared test utilities for integration and E2E tests.
//!
//! Provides bare git remotes on the local filesystem (reachable through a
//! `file://` git URL, so no network is involved) and an in-memory `Forge`
//! that records every call.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let remotes = Remotes::new();
//! remotes.create("acme", "widgets", &[("VERSION", "1.0\n")]);
//! let mut options = remotes.options();
//! ```

#![allow(dead_code)]

use repo_scribe::error::Result;
use repo_scribe::gitconfig::PartialIdentity;
use repo_scribe::github::{
    Forge, MergeRequest, NewPullRequest, PullRequest, PullRequestEdit, SearchKind,
};
use repo_scribe::options::UpdateOptions;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use super::{git, MockForge, Remotes};
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;
}

/// Run git with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Fixture",
            "-c",
            "user.email=fixture@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A directory of bare repositories laid out as `<root>/<owner>/<name>.git`,
/// plus a clone directory for the engine.
pub struct Remotes {
    temp: tempfile::TempDir,
}

impl Remotes {
    pub fn new() -> Self {
        Self {
            temp: tempfile::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.temp.path().join("remotes")
    }

    pub fn clone_dir(&self) -> PathBuf {
        self.temp.path().join("clones")
    }

    /// `file://` URL of the remotes root.
    pub fn git_url(&self) -> String {
        format!("file://{}", self.root().display())
    }

    fn bare(&self, owner: &str, name: &str) -> PathBuf {
        self.root().join(owner).join(format!("{}.git", name))
    }

    /// Create `owner/name` with one commit on `main` holding `files`.
    pub fn create(&self, owner: &str, name: &str, files: &[(&str, &str)]) {
        let bare = self.bare(owner, name);
        fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--quiet", "--bare", "--initial-branch=main"]);

        let seed = self.temp.path().join("seed").join(owner).join(name);
        fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init", "--quiet", "--initial-branch=main"]);
        for (path, content) in files {
            let file = seed.join(path);
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(file, content).unwrap();
        }
        git(&seed, &["add", "--all"]);
        git(&seed, &["commit", "--quiet", "-m", "initial"]);
        git(
            &seed,
            &["push", "--quiet", bare.to_str().unwrap(), "main:refs/heads/main"],
        );
    }

    /// Branch names present in the remote.
    pub fn branches(&self, owner: &str, name: &str) -> Vec<String> {
        let out = git(
            &self.bare(owner, name),
            &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
        );
        out.lines().map(str::to_string).collect()
    }

    /// Content of `path` at the tip of `branch`.
    pub fn file(&self, owner: &str, name: &str, branch: &str, path: &str) -> String {
        git(
            &self.bare(owner, name),
            &["show", &format!("{}:{}", branch, path)],
        )
    }

    /// Does `path` exist at the tip of `branch`?
    pub fn has_file(&self, owner: &str, name: &str, branch: &str, path: &str) -> bool {
        Command::new("git")
            .args(["cat-file", "-e", &format!("{}:{}", branch, path)])
            .current_dir(self.bare(owner, name))
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Number of commits on `branch`.
    pub fn commit_count(&self, owner: &str, name: &str, branch: &str) -> usize {
        git(&self.bare(owner, name), &["rev-list", "--count", branch])
            .parse()
            .unwrap()
    }

    /// Options pointing at these remotes, with a fixed identity and no pauses.
    pub fn options(&self) -> UpdateOptions {
        let mut options = UpdateOptions::default();
        options.git.git_url = self.git_url();
        options.git.clone_dir = self.clone_dir();
        options.git.author = PartialIdentity {
            name: Some("Scribe Bot".to_string()),
            email: Some("scribe@example.com".to_string()),
        };
        options.pull_request.comment_pause = Duration::ZERO;
        options.merge.poll_interval = Duration::ZERO;
        options
    }
}

impl Default for Remotes {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory forge: created pull requests become visible to later
/// `find_pull_requests` calls, so repeated runs can reuse them.
#[derive(Default)]
pub struct MockForge {
    pub pull_requests: Mutex<Vec<PullRequest>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockForge {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn with_pr<T>(&self, number: u64, f: impl FnOnce(&mut PullRequest) -> T) -> T {
        let mut prs = self.pull_requests.lock().unwrap();
        let pr = prs
            .iter_mut()
            .find(|p| p.number == number)
            .expect("unknown pull request");
        f(pr)
    }
}

impl Forge for MockForge {
    fn find_pull_requests(&self, owner: &str, repo: &str, base: &str) -> Result<Vec<PullRequest>> {
        self.record(format!("find {}/{} {}", owner, repo, base));
        let prefix = format!("https://github.com/{}/{}/pull/", owner, repo);
        Ok(self
            .pull_requests()
            .into_iter()
            .filter(|p| p.url.starts_with(&prefix))
            .collect())
    }

    fn create_pull_request(&self, owner: &str, repo: &str, new: &NewPullRequest) -> Result<PullRequest> {
        self.record(format!("create {}/{} {}", owner, repo, new.head));
        let mut prs = self.pull_requests.lock().unwrap();
        let number = prs.len() as u64 + 1;
        let pr = PullRequest {
            number,
            url: format!("https://github.com/{}/{}/pull/{}", owner, repo, number),
            node_id: format!("PR_{}", number),
            title: new.title.clone(),
            body: new.body.clone(),
            head_ref: new.head.clone(),
            draft: new.draft,
            ..Default::default()
        };
        prs.push(pr.clone());
        Ok(pr)
    }

    fn edit_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        edit: &PullRequestEdit,
    ) -> Result<PullRequest> {
        self.record(format!("edit {}/{} #{}", owner, repo, number));
        Ok(self.with_pr(number, |pr| {
            if let Some(title) = &edit.title {
                pr.title = title.clone();
            }
            if let Some(body) = &edit.body {
                pr.body = body.clone();
            }
            pr.clone()
        }))
    }

    fn add_labels(&self, owner: &str, repo: &str, number: u64, labels: &[String]) -> Result<()> {
        self.record(format!("labels {}/{} #{} {}", owner, repo, number, labels.join(",")));
        self.with_pr(number, |pr| pr.labels.extend(labels.iter().cloned()));
        Ok(())
    }

    fn add_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<()> {
        self.record(format!("comment {}/{} #{} {}", owner, repo, number, body));
        Ok(())
    }

    fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest> {
        self.record(format!("get {}/{} #{}", owner, repo, number));
        Ok(self.with_pr(number, |pr| PullRequest {
            mergeable: Some(true),
            ..pr.clone()
        }))
    }

    fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        merge: &MergeRequest,
    ) -> Result<()> {
        self.record(format!("merge {}/{} #{} {}", owner, repo, number, merge.method));
        Ok(())
    }

    fn search_repositories(&self, query: &str, _kind: SearchKind) -> Result<Vec<(String, String)>> {
        self.record(format!("search {}", query));
        Ok(Vec::new())
    }
}
