//! # Output Configuration
//!
//! This module controls how the end-of-run report looks on the terminal,
//! including color and emoji support based on terminal capabilities and
//! user preferences.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use repo_scribe::output::{OutputConfig, render_report};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! print!("{}", render_report(&config, &results));
//! ```

use crate::orchestrator::{RunResult, Summary};
use console::style;
use std::env;
use std::fmt::Write;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// `N updated, M unchanged, K failed`, plus the merged count when non-zero.
pub fn summary_line(summary: &Summary) -> String {
    let mut line = format!(
        "{} updated, {} unchanged, {} failed",
        summary.updated, summary.unchanged, summary.failed
    );
    if summary.merged > 0 {
        let _ = write!(line, " ({} merged)", summary.merged);
    }
    line
}

/// The full end-of-run report: one line per updated or failed repository,
/// then the summary line.
pub fn render_report(config: &OutputConfig, results: &[RunResult]) -> String {
    let mut out = String::new();
    for run in results {
        match &run.result {
            Ok(outcome) if outcome.updated => {
                let marker = emoji(config, "✅", "[UPDATED]");
                let _ = match &outcome.pull_request {
                    Some(pr) => writeln!(out, "{} {} {}", marker, run.target, pr.url),
                    None => writeln!(out, "{} {}", marker, run.target),
                };
            }
            Ok(_) => {}
            Err(e) => {
                let marker = emoji(config, "❌", "[FAILED]");
                let _ = writeln!(out, "{} {}", marker, e);
            }
        }
    }

    let summary = Summary::from_results(results);
    let line = summary_line(&summary);
    let styled = if summary.has_failures() {
        style(line).red().bold()
    } else {
        style(line).green().bold()
    };
    let _ = writeln!(out, "{}", styled.force_styling(config.use_color));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::github::PullRequestRef;
    use crate::strategy::RunOutcome;
    use crate::target::RepositoryTarget;

    fn results() -> Vec<RunResult> {
        vec![
            RunResult {
                target: RepositoryTarget::new("acme", "widgets"),
                result: Ok(RunOutcome {
                    updated: true,
                    merged: true,
                    pull_request: Some(PullRequestRef {
                        number: 4,
                        url: "https://github.com/acme/widgets/pull/4".to_string(),
                        node_id: String::new(),
                    }),
                    branch: Some("scribe-1".to_string()),
                }),
            },
            RunResult {
                target: RepositoryTarget::new("acme", "gadgets"),
                result: Ok(RunOutcome::default()),
            },
            RunResult {
                target: RepositoryTarget::new("acme", "gizmos"),
                result: Err(Error::NotMergeable { number: 9 }.in_repository("acme/gizmos", "merge")),
            },
        ]
    }

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "✅", "[UPDATED]"), "✅");
        assert_eq!(emoji(&OutputConfig::without_color(), "✅", "[UPDATED]"), "[UPDATED]");
    }

    #[test]
    fn test_summary_line() {
        let summary = Summary {
            updated: 3,
            unchanged: 2,
            failed: 1,
            merged: 0,
        };
        assert_eq!(summary_line(&summary), "3 updated, 2 unchanged, 1 failed");
    }

    #[test]
    fn test_plain_report() {
        let report = render_report(&OutputConfig::without_color(), &results());
        insta::assert_snapshot!(report, @r"
        [UPDATED] acme/widgets https://github.com/acme/widgets/pull/4
        [FAILED] acme/gizmos: merge failed: pull request #9 is not mergeable
        1 updated, 1 unchanged, 1 failed (1 merged)
        ");
    }
}
