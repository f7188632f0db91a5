//! # CLI Command Implementations
//!
//! `scribe` has a single command. Its flags live in an `Args` struct derived
//! with `clap`, and its `execute` function calls into the `repo_scribe`
//! library to do the work.

pub mod run;
