//! Default values for repo-scribe configuration.
//!
//! This module provides centralized default values shared by the CLI flags
//! and [`crate::options::UpdateOptions::default`].

use std::path::PathBuf;
use std::time::Duration;

/// Label every scribe pull request carries.
pub const PR_LABEL: &str = "scribe-update";

/// Prefix of generated branch names.
pub const BRANCH_PREFIX: &str = "scribe-";

/// Branch pull requests target.
pub const BASE_BRANCH: &str = "main";

/// Footer appended to commit messages and pull request bodies.
pub const FOOTER: &str = "Generated by repo-scribe";

/// Clone endpoint.
pub const GIT_URL: &str = "https://github.com";

/// Interval between mergeability polls.
pub const MERGE_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a pull request to become mergeable.
pub const MERGE_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Pause between consecutive comments on one pull request.
pub const COMMENT_PAUSE: Duration = Duration::from_secs(1);

/// Returns the default directory working copies are cloned into.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/repo-scribe/clones` (XDG Base Directory)
/// - macOS: `~/Library/Caches/repo-scribe/clones`
/// - Windows: `{FOLDERID_LocalAppData}\repo-scribe\clones`
///
/// Falls back to `.repo-scribe/clones` in the current directory if the
/// platform cache directory cannot be determined.
pub fn default_clone_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("repo-scribe"))
        .unwrap_or_else(|| PathBuf::from(".repo-scribe"))
        .join("clones")
}
