//! `exec` updater: run a command inside the working copy.

use super::Description;
use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::params::{self, Params};
use std::path::{Component, Path, PathBuf};
use std::process::Command;

/// Runs `cmd args...` in the working copy (or a subdirectory of it).
///
/// A command cannot tell us what it changed, so `apply` always reports a
/// change and the commit step decides from the actual diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecUpdater {
    cmd: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
}

impl ExecUpdater {
    pub fn from_params(params: &Params) -> Result<Self> {
        let cmd = params::required(params, "cmd")?.to_string();
        let args = params
            .get("args")
            .map(|a| a.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let dir = match params.get("dir") {
            Some(dir) if !dir.is_empty() => {
                let dir = PathBuf::from(dir);
                if dir
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
                {
                    return Err(Error::InvalidParam {
                        param: "dir".to_string(),
                        message: format!("{} must be relative to the repository", dir.display()),
                    });
                }
                Some(dir)
            }
            _ => None,
        };
        Ok(Self { cmd, args, dir })
    }

    pub fn apply(&self, working_copy: &Path, cancel: &Cancellation) -> Result<bool> {
        let cwd = match &self.dir {
            Some(dir) => working_copy.join(dir),
            None => working_copy.to_path_buf(),
        };
        let mut cmd = Command::new(&self.cmd);
        cmd.args(&self.args).current_dir(&cwd);
        let output = cancel.output(&mut cmd).map_err(|e| match e {
            Error::Io(e) => Error::updater("exec", format!("failed to run {}: {}", self.cmd, e)),
            other => other,
        })?;

        if !output.status.success() {
            return Err(Error::updater(
                "exec",
                format!(
                    "{} exited with {}: {}",
                    self.command_line(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(true)
    }

    pub fn describe(&self) -> Description {
        Description {
            title: format!("Run {}", self.cmd),
            body: format!("Ran `{}`.", self.command_line()),
        }
    }

    fn command_line(&self) -> String {
        std::iter::once(self.cmd.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse_params;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn updater(list: &str) -> Result<ExecUpdater> {
        ExecUpdater::from_params(&parse_params(list).unwrap())
    }

    #[test]
    fn test_requires_cmd() {
        assert!(updater("args=x").is_err());
    }

    #[test]
    fn test_rejects_escaping_dir() {
        let err = updater("cmd=ls,dir=../other").unwrap_err();
        assert!(err.to_string().contains("dir"));
        assert!(updater("cmd=ls,dir=/etc").is_err());
    }

    #[test]
    fn test_describe() {
        let description = updater("cmd=rm,args=old.txt").unwrap().describe();
        assert_eq!(description.title, "Run rm");
        assert_eq!(description.body, "Ran `rm old.txt`.");
    }

    #[test]
    fn test_apply_runs_in_working_copy() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("old.txt"), "bye").unwrap();

        let changed = updater("cmd=rm,args=old.txt")
            .unwrap()
            .apply(temp.path(), &Cancellation::new())
            .unwrap();
        assert!(changed);
        assert!(!temp.path().join("old.txt").exists());
    }

    #[test]
    fn test_apply_in_subdirectory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();

        updater("cmd=touch,args=new.txt,dir=sub")
            .unwrap()
            .apply(temp.path(), &Cancellation::new())
            .unwrap();
        assert!(temp.path().join("sub/new.txt").exists());
    }

    #[test]
    fn test_failing_command_reports_stderr() {
        let temp = TempDir::new().unwrap();
        let err = updater("cmd=rm,args=missing.txt")
            .unwrap()
            .apply(temp.path(), &Cancellation::new())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("rm missing.txt"));
        assert!(message.contains("missing.txt"));
    }

    #[test]
    fn test_unknown_command() {
        let temp = TempDir::new().unwrap();
        let err = updater("cmd=definitely-not-a-command-xyz")
            .unwrap()
            .apply(temp.path(), &Cancellation::new())
            .unwrap_err();
        assert!(err.to_string().contains("failed to run"));
    }

    #[test]
    fn test_slow_command_is_killed_on_cancel() {
        let temp = TempDir::new().unwrap();
        let cancel = Cancellation::new();
        let canceller = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let start = Instant::now();
        let err = updater("cmd=sleep,args=10")
            .unwrap()
            .apply(temp.path(), &cancel)
            .unwrap_err();
        handle.join().unwrap();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
