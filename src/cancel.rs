//! Process-wide cancellation.
//!
//! One [`Cancellation`] is created per run and cloned into every repository
//! task. It fires either explicitly (by an embedding caller or a test) or when the
//! optional `--timeout` deadline passes. Blocking steps call
//! [`Cancellation::check`] at their boundaries and use
//! [`Cancellation::sleep`] instead of `thread::sleep` so waits end early.
//! Child processes (git, `exec`, `sops`) run through [`Cancellation::output`],
//! which kills the child when the token fires.

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// First poll interval for a running child; doubles up to `SLEEP_SLICE`.
const FIRST_POLL: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    fired: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires by itself once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            fired: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Fire the token for every clone.
    pub fn cancel(&self) {
        self.fired.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(Error::Cancelled)` once fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Error::Cancelled` if the
    /// token fires meanwhile.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let end = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= end {
                return Ok(());
            }
            thread::sleep((end - now).min(SLEEP_SLICE));
        }
    }

    /// Run `cmd` to completion and collect its output like
    /// [`Command::output`], but kill the child and return `Error::Cancelled`
    /// if the token fires first. Failing to start the child is `Error::Io`.
    pub fn output(&self, cmd: &mut Command) -> Result<Output> {
        self.check()?;
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        // Drained on their own threads so a chatty child never blocks on a
        // full pipe while we poll.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let mut poll = FIRST_POLL;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if self.is_cancelled() {
                // kill fails only if the child already exited
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Cancelled);
            }
            thread::sleep(poll);
            poll = (poll * 2).min(SLEEP_SLICE);
        };

        Ok(Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|h| h.join().ok()).unwrap_or_default()
}
