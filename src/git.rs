//! Git plumbing through the system `git` binary.
//!
//! Shelling out picks up whatever the user already has configured (SSH keys,
//! credential helpers, proxies). Every function here takes the working copy
//! directory explicitly; none of them change the process's current
//! directory. Every git process runs under the run's [`Cancellation`] and is
//! killed when it fires.
//!
//! The token only ever travels in command arguments: after cloning, `origin`
//! is rewritten to the credential-free URL so a kept working copy holds no
//! secret, and pushes name the authenticated URL explicitly.

use std::fs;
use std::path::Path;
use std::process::Command;

use url::Url;

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::gitconfig::Identity;

/// Strip credentials from any URL embedded in `text`.
pub fn redact(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("://") {
        let (head, tail) = rest.split_at(pos + 3);
        out.push_str(head);
        let authority_end = tail
            .find(|c: char| c == '/' || c.is_whitespace() || c == '\'' || c == '"')
            .unwrap_or(tail.len());
        match tail[..authority_end].rfind('@') {
            Some(at) => {
                out.push_str("***");
                rest = &tail[at..];
            }
            None => rest = tail,
        }
    }
    out.push_str(rest);
    out
}

/// The clone URL for `owner/name` under `git_url`, with the token embedded as
/// HTTP basic-auth password for http(s) remotes.
pub fn remote_url(git_url: &str, owner: &str, name: &str, token: &str) -> Result<String> {
    let base = format!("{}/", git_url.trim_end_matches('/'));
    let mut url = Url::parse(&base)?.join(&format!("{}/{}.git", owner, name))?;
    if !token.is_empty() && matches!(url.scheme(), "http" | "https") {
        url.set_username("x-access-token")
            .and_then(|_| url.set_password(Some(token)))
            .map_err(|_| Error::Config {
                message: format!("cannot embed credentials in {}", git_url),
            })?;
    }
    Ok(url.to_string())
}

/// `url` with any user name and password removed.
pub fn without_credentials(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            // both only fail for cannot-be-a-base URLs, which carry no credentials
            let _ = parsed.set_password(None);
            let _ = parsed.set_username("");
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

fn git(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .args(["-c", "commit.gpgsign=false"]);
    cmd
}

/// Run git in `dir` and return trimmed stdout.
fn run(dir: &Path, args: &[&str], cancel: &Cancellation) -> Result<String> {
    run_command(git(dir), dir, args, cancel)
}

fn run_command(
    mut cmd: Command,
    dir: &Path,
    args: &[&str],
    cancel: &Cancellation,
) -> Result<String> {
    let output = cancel.output(cmd.args(args)).map_err(|e| match e {
        Error::Io(e) => Error::GitCommand {
            command: redact(&args.join(" ")),
            dir: dir.display().to_string(),
            stderr: e.to_string(),
        },
        other => other,
    })?;
    if !output.status.success() {
        return Err(Error::GitCommand {
            command: redact(&args.join(" ")),
            dir: dir.display().to_string(),
            stderr: redact(String::from_utf8_lossy(&output.stderr).trim()),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Shallow-clone `branch` of `url` into `target_dir`, fetching the tip of
/// every remote branch so existing pull-request branches can be checked out.
/// `origin` is left pointing at `url` without credentials.
pub fn clone_shallow(
    url: &str,
    branch: &str,
    target_dir: &Path,
    cancel: &Cancellation,
) -> Result<()> {
    // git won't clone into an existing non-empty directory
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0")
        .args([
            "clone",
            "--depth",
            "1",
            "--no-single-branch",
            "--branch",
            branch,
            url,
        ])
        .arg(target_dir);
    let output = cancel.output(&mut cmd).map_err(|e| match e {
        Error::Io(e) => Error::GitClone {
            url: redact(url),
            message: e.to_string(),
        },
        other => other,
    })?;

    if !output.status.success() {
        let stderr = redact(String::from_utf8_lossy(&output.stderr).trim());
        let message = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Check that the token can read the repository.\n\
                Error: {}",
                stderr
            )
        } else {
            stderr
        };
        return Err(Error::GitClone {
            url: redact(url),
            message,
        });
    }

    let clean = without_credentials(url);
    if clean != url {
        run(target_dir, &["remote", "set-url", "origin", &clean], cancel)?;
    }
    Ok(())
}

/// Create `name` from the current HEAD and switch to it.
pub fn create_branch(dir: &Path, name: &str, cancel: &Cancellation) -> Result<()> {
    run(dir, &["checkout", "-b", name], cancel).map(drop)
}

/// Switch to a local branch tracking `origin/<name>`.
pub fn track_branch(dir: &Path, name: &str, cancel: &Cancellation) -> Result<()> {
    let upstream = format!("origin/{}", name);
    run(dir, &["checkout", "-B", name, "--track", &upstream], cancel).map(drop)
}

/// Hard-reset the current branch to `reference`.
pub fn reset_hard(dir: &Path, reference: &str, cancel: &Cancellation) -> Result<()> {
    run(dir, &["reset", "--hard", reference], cancel).map(drop)
}

/// True when the working tree has staged, unstaged or untracked changes.
pub fn has_changes(dir: &Path, cancel: &Cancellation) -> Result<bool> {
    Ok(!run(dir, &["status", "--porcelain"], cancel)?.is_empty())
}

/// Stage everything and commit. Returns the new commit id, or `None` when
/// there was nothing to commit.
pub fn commit_all(
    dir: &Path,
    message: &str,
    author: &Identity,
    committer: &Identity,
    cancel: &Cancellation,
) -> Result<Option<String>> {
    if !has_changes(dir, cancel)? {
        return Ok(None);
    }
    run(dir, &["add", "--all"], cancel)?;

    let mut cmd = git(dir);
    cmd.env("GIT_AUTHOR_NAME", &author.name)
        .env("GIT_AUTHOR_EMAIL", &author.email)
        .env("GIT_COMMITTER_NAME", &committer.name)
        .env("GIT_COMMITTER_EMAIL", &committer.email);
    run_command(cmd, dir, &["commit", "--cleanup=verbatim", "-m", message], cancel)?;

    Ok(Some(run(dir, &["rev-parse", "HEAD"], cancel)?))
}

/// The tree id of `rev`, or `None` when `rev` does not exist.
pub fn tree_id(dir: &Path, rev: &str, cancel: &Cancellation) -> Result<Option<String>> {
    let spec = format!("{}^{{tree}}", rev);
    match run(dir, &["rev-parse", "--verify", "--quiet", &spec], cancel) {
        Ok(tree) if !tree.is_empty() => Ok(Some(tree)),
        Ok(_) => Ok(None),
        Err(Error::GitCommand { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Push `branch` to `url` under the same name.
///
/// `url` is the authenticated remote URL; it is given on the command line
/// because `origin` no longer carries credentials.
pub fn push(
    dir: &Path,
    url: &str,
    branch: &str,
    force: bool,
    cancel: &Cancellation,
) -> Result<()> {
    let refspec = format!("{}:refs/heads/{}", branch, branch);
    let mut args = vec!["push"];
    if force {
        args.push("--force");
    }
    args.extend([url, refspec.as_str()]);
    run(dir, &args, cancel).map(drop)
}
