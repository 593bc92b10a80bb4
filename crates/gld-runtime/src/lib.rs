//! Process execution for gridlabd models.
//!
//! - [`Runner`]: spawns one command, drains both pipes concurrently, and
//!   captures output, errors, exit code, and failures.
//! - [`ProcessCommandRunner`]: the `CommandRunner` port used by
//!   `GldModel::run`.
//! - [`Gridlabd`]: cached module and class metadata queries.

#![deny(unsafe_code)]

mod error;
pub mod gridlabd;
pub mod ports_impl;
pub mod runner;

pub use error::RunnerError;
pub use gridlabd::Gridlabd;
pub use ports_impl::ProcessCommandRunner;
pub use runner::{
    CommandLine, ErrorCallback, LineSink, Output, OutputCallback, OutputFormat, RunResult,
    RunState, Runner,
};
