//! Fan the strategy engine out over every target repository.
//!
//! Each repository runs as its own rayon task with a private copy of the
//! options. A failing repository is logged and recorded; it never stops or
//! affects its siblings. [`run_all`] returns only after every task finished.

use crate::error::Result;
use crate::options::UpdateOptions;
use crate::strategy::{Engine, RunOutcome};
use crate::target::RepositoryTarget;
use log::{error, info};
use rayon::prelude::*;

/// One repository's result.
#[derive(Debug)]
pub struct RunResult {
    pub target: RepositoryTarget,
    pub result: Result<RunOutcome>,
}

impl RunResult {
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// Aggregate counts over all repositories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub merged: usize,
}

impl Summary {
    pub fn from_results(results: &[RunResult]) -> Self {
        let mut summary = Summary::default();
        for run in results {
            match &run.result {
                Ok(outcome) if outcome.updated => {
                    summary.updated += 1;
                    if outcome.merged {
                        summary.merged += 1;
                    }
                }
                Ok(_) => summary.unchanged += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// True when at least one repository failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Run `engine` once per target, concurrently. Results come back in the
/// order of `targets`.
pub fn run_all(
    engine: &Engine<'_>,
    targets: &[RepositoryTarget],
    options: &UpdateOptions,
) -> Vec<RunResult> {
    info!("Processing {} repositories", targets.len());
    targets
        .par_iter()
        .map(|target| {
            let options = options.for_target(target);
            let result = engine.run(target, &options);
            match &result {
                Ok(outcome) if outcome.updated => {
                    let pr = outcome
                        .pull_request
                        .as_ref()
                        .map(|pr| format!(" ({})", pr.url))
                        .unwrap_or_default();
                    info!("{}: updated{}", target, pr);
                }
                Ok(_) => info!("{}: unchanged", target),
                Err(e) => error!("{}", e),
            }
            RunResult {
                target: target.clone(),
                result,
            }
        })
        .collect()
}
