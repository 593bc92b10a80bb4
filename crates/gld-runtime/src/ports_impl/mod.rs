//! Port implementations for gld-runtime.
//!
//! These adapters connect the port interfaces defined in gld-core to the
//! process runner.

pub mod command_runner;

pub use command_runner::ProcessCommandRunner;
