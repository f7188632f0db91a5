//! CLI argument parsing and logging setup

use anyhow::Result;
use clap::Parser;

use crate::commands;

/// Repo Scribe - Apply the same file updates to many repositories as pull requests
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    run: commands::run::RunArgs,

    /// Colorize output (always, never, auto)
    #[arg(long, value_name = "WHEN", default_value = "auto", env = "SCRIBE_COLOR")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "SCRIBE_LOG_LEVEL",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // RUST_LOG wins over --log-level when set
        let env = env_logger::Env::default().default_filter_or(self.log_level.as_str());
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .try_init();

        commands::run::execute(self.run, &self.color)
    }
}
