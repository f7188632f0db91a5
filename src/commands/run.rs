//! Run command implementation
//!
//! Parses the update and repository specs, builds the run-wide options,
//! fans the strategy engine out over every target repository and prints
//! the report. Spec errors abort before any repository is touched; any
//! per-repository failure makes the process exit non-zero after the report.

use anyhow::Result;
use clap::{ArgAction, Args};
use log::{info, warn};
use repo_scribe::cancel::Cancellation;
use repo_scribe::defaults;
use repo_scribe::github::client::{GitHubClient, DEFAULT_API_URL};
use repo_scribe::github::{Forge, MergeMethod};
use repo_scribe::gitconfig::PartialIdentity;
use repo_scribe::options::{GitOptions, MergeOptions, PullRequestOptions, UpdateOptions};
use repo_scribe::orchestrator::{self, Summary};
use repo_scribe::output::{self, OutputConfig};
use repo_scribe::repository::DefaultGitOperations;
use repo_scribe::strategy::{Engine, StrategyKind};
use repo_scribe::target::resolve_targets;
use repo_scribe::updater::parse_updaters;
use std::path::PathBuf;
use std::time::Duration;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Update operation, e.g. `regex(file=VERSION,pattern='v=(\S+)')=1.2.3` (repeatable)
    #[arg(short, long, value_name = "SPEC")]
    pub update: Vec<String>,

    /// Target repository: `owner/name(params)`, `env(var=NAME)` or `search(query=...)` (repeatable)
    #[arg(short, long, value_name = "SPEC")]
    pub repo: Vec<String>,

    /// GitHub token used for the API and for cloning over HTTPS
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub API endpoint
    #[arg(long, value_name = "URL", env = "SCRIBE_GITHUB_URL", default_value = DEFAULT_API_URL)]
    pub github_url: String,

    /// Base URL repositories are cloned from
    #[arg(long, value_name = "URL", env = "SCRIBE_GIT_URL", default_value = defaults::GIT_URL)]
    pub git_url: String,

    /// Pull request title (defaults to the commit title)
    #[arg(long, value_name = "TEXT", env = "SCRIBE_PR_TITLE")]
    pub pr_title: Option<String>,

    /// Pull request body (defaults to the commit body)
    #[arg(long, value_name = "TEXT", env = "SCRIBE_PR_BODY")]
    pub pr_body: Option<String>,

    /// Comment added to the pull request (repeatable)
    #[arg(long, value_name = "TEXT")]
    pub pr_comment: Vec<String>,

    /// Labels every pull request carries; used to find pull requests to reuse
    #[arg(
        long,
        value_name = "LABEL",
        value_delimiter = ',',
        env = "SCRIBE_PR_LABELS",
        default_value = defaults::PR_LABEL
    )]
    pub pr_labels: Vec<String>,

    /// Branch pull requests target
    #[arg(long, value_name = "BRANCH", env = "SCRIBE_PR_BASE_BRANCH", default_value = defaults::BASE_BRANCH)]
    pub pr_base_branch: String,

    /// Open pull requests as drafts
    #[arg(long, env = "SCRIBE_PR_DRAFT", value_name = "BOOL", num_args = 0..=1,
          default_value_t = false, default_missing_value = "true", action = ArgAction::Set)]
    pub pr_draft: bool,

    /// Merge pull requests once they are mergeable
    #[arg(long, env = "SCRIBE_PR_MERGE", value_name = "BOOL", num_args = 0..=1,
          default_value_t = false, default_missing_value = "true", action = ArgAction::Set)]
    pub pr_merge: bool,

    /// Merge method (merge, squash, rebase)
    #[arg(
        long,
        value_name = "METHOD",
        env = "SCRIBE_PR_MERGE_METHOD",
        default_value = "merge",
        value_parser = ["merge", "squash", "rebase"]
    )]
    pub pr_merge_method: String,

    /// Title of the merge commit
    #[arg(long, value_name = "TEXT", env = "SCRIBE_PR_MERGE_COMMIT_TITLE")]
    pub pr_merge_commit_title: Option<String>,

    /// Message of the merge commit
    #[arg(long, value_name = "TEXT", env = "SCRIBE_PR_MERGE_COMMIT_MESSAGE")]
    pub pr_merge_commit_message: Option<String>,

    /// How long to wait for a pull request to become mergeable
    #[arg(
        long,
        value_name = "DURATION",
        env = "SCRIBE_PR_MERGE_POLL_TIMEOUT",
        default_value = "10m",
        value_parser = humantime::parse_duration
    )]
    pub pr_merge_poll_timeout: Duration,

    /// Interval between mergeability checks
    #[arg(
        long,
        value_name = "DURATION",
        env = "SCRIBE_PR_MERGE_POLL_INTERVAL",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub pr_merge_poll_interval: Duration,

    /// Directory working copies are cloned into
    #[arg(long, value_name = "PATH", env = "SCRIBE_GIT_CLONE_DIR")]
    pub git_clone_dir: Option<PathBuf>,

    /// Commit author name
    #[arg(long, value_name = "NAME", env = "SCRIBE_GIT_AUTHOR_NAME")]
    pub git_author_name: Option<String>,

    /// Commit author email
    #[arg(long, value_name = "EMAIL", env = "SCRIBE_GIT_AUTHOR_EMAIL")]
    pub git_author_email: Option<String>,

    /// Committer name (defaults to the author)
    #[arg(long, value_name = "NAME", env = "SCRIBE_GIT_COMMITTER_NAME")]
    pub git_committer_name: Option<String>,

    /// Committer email (defaults to the author)
    #[arg(long, value_name = "EMAIL", env = "SCRIBE_GIT_COMMITTER_EMAIL")]
    pub git_committer_email: Option<String>,

    /// Commit title (defaults to the update titles)
    #[arg(long, value_name = "TEXT", env = "SCRIBE_GIT_COMMIT_TITLE")]
    pub git_commit_title: Option<String>,

    /// Commit body (defaults to the update descriptions)
    #[arg(long, value_name = "TEXT", env = "SCRIBE_GIT_COMMIT_BODY")]
    pub git_commit_body: Option<String>,

    /// Footer after a `-- ` line; an empty value disables it
    #[arg(long, value_name = "TEXT", env = "SCRIBE_GIT_COMMIT_FOOTER")]
    pub git_commit_footer: Option<String>,

    /// Prefix of new branch names
    #[arg(long, value_name = "PREFIX", env = "SCRIBE_GIT_BRANCH_PREFIX", default_value = defaults::BRANCH_PREFIX)]
    pub git_branch_prefix: String,

    /// How pull requests are reused across runs (reset, append, recreate)
    #[arg(
        long,
        value_name = "STRATEGY",
        env = "SCRIBE_STRATEGY",
        default_value = "reset",
        value_parser = ["reset", "append", "recreate"]
    )]
    pub strategy: String,

    /// Keep working copies after the run
    #[arg(long, env = "SCRIBE_KEEP_FILES", value_name = "BOOL", num_args = 0..=1,
          default_value_t = false, default_missing_value = "true", action = ArgAction::Set)]
    pub keep_files: bool,

    /// Commit locally but do not push or touch pull requests
    #[arg(short = 'n', long, env = "SCRIBE_DRY_RUN", value_name = "BOOL", num_args = 0..=1,
          default_value_t = false, default_missing_value = "true", action = ArgAction::Set)]
    pub dry_run: bool,

    /// Cancel everything still running after this long
    #[arg(long, value_name = "DURATION", env = "SCRIBE_TIMEOUT", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

impl RunArgs {
    /// Mandatory flags that were not given.
    pub fn missing_flags(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.update.iter().all(|s| s.trim().is_empty()) {
            missing.push("--update");
        }
        if self.repo.iter().all(|s| s.trim().is_empty()) {
            missing.push("--repo");
        }
        missing
    }

    /// Build the run-wide options snapshot.
    pub fn to_options(&self) -> Result<UpdateOptions> {
        Ok(UpdateOptions {
            git: GitOptions {
                author: PartialIdentity {
                    name: self.git_author_name.clone(),
                    email: self.git_author_email.clone(),
                },
                committer: PartialIdentity {
                    name: self.git_committer_name.clone(),
                    email: self.git_committer_email.clone(),
                },
                commit_title: self.git_commit_title.clone(),
                commit_body: self.git_commit_body.clone(),
                commit_footer: Some(
                    self.git_commit_footer
                        .clone()
                        .unwrap_or_else(|| defaults::FOOTER.to_string()),
                ),
                branch_prefix: self.git_branch_prefix.clone(),
                clone_dir: self
                    .git_clone_dir
                    .clone()
                    .unwrap_or_else(defaults::default_clone_dir),
                git_url: self.git_url.clone(),
            },
            pull_request: PullRequestOptions {
                token: self.github_token.clone().unwrap_or_default(),
                title: self.pr_title.clone(),
                body: self.pr_body.clone(),
                comments: self.pr_comment.clone(),
                labels: self
                    .pr_labels
                    .iter()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect(),
                base_branch: self.pr_base_branch.clone(),
                draft: self.pr_draft,
                comment_pause: defaults::COMMENT_PAUSE,
            },
            merge: MergeOptions {
                enabled: self.pr_merge,
                method: self.pr_merge_method.parse::<MergeMethod>()?,
                commit_title: self.pr_merge_commit_title.clone(),
                commit_message: self.pr_merge_commit_message.clone(),
                poll_interval: self.pr_merge_poll_interval,
                poll_timeout: self.pr_merge_poll_timeout,
            },
            strategy: self.strategy.parse::<StrategyKind>()?,
            dry_run: self.dry_run,
            keep_files: self.keep_files,
        })
    }
}

/// Execute the run command
pub fn execute(args: RunArgs, color_flag: &str) -> Result<()> {
    let missing = args.missing_flags();
    if !missing.is_empty() {
        anyhow::bail!("missing required flags: {}", missing.join(", "));
    }

    let options = args.to_options()?;
    let updaters = parse_updaters(&args.update)?;

    let cancel = match args.timeout {
        Some(timeout) => Cancellation::with_timeout(timeout),
        None => Cancellation::new(),
    };
    let token = options.pull_request.token.clone();
    if token.is_empty() {
        warn!("No GitHub token given; pushing and pull requests will likely fail");
    }
    let client = GitHubClient::new(&args.github_url, token.clone(), cancel.clone())?;
    let forge: Option<&dyn Forge> = if token.is_empty() { None } else { Some(&client) };
    let targets = resolve_targets(&args.repo, forge)?;
    if targets.is_empty() {
        warn!("No repositories to update");
    }

    if options.dry_run {
        info!("Dry run: changes are committed locally only");
    }
    let git = DefaultGitOperations;
    let engine = Engine::new(&git, &client, &updaters, &cancel);
    let results = orchestrator::run_all(&engine, &targets, &options);

    let out = OutputConfig::from_env_and_flag(color_flag);
    print!("{}", output::render_report(&out, &results));

    let summary = Summary::from_results(&results);
    if summary.has_failures() {
        anyhow::bail!(
            "{} of {} repositories failed",
            summary.failed,
            results.len()
        );
    }
    Ok(())
}
