//! Core domain types for the GridLAB-D model editor.
//!
//! A model is an ordered collection of typed items ([`GldModel`] of
//! [`ModelItem`]) that can be loaded from and saved to the structured
//! interchange document, rendered as GLM, and run through the external
//! simulation program via the [`CommandRunner`] port.
//!
//! This crate never spawns processes itself; `gld-runtime` provides the
//! process-backed `CommandRunner`.
#![deny(unused_crate_dependencies)]

pub mod model;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use model::{
    GldModel, IdGenerator, ItemType, LookupError, ModelError, ModelItem, ModelResult,
    ModelRunResult, Position, RandomIds, RunOptions, SequentialIds,
};
pub use ports::{
    CommandOutcome, CommandRequest, CommandRunner, FailureKind, ProcessError, RunFailure,
    SENTINEL_RETURN_CODE,
};
pub use settings::{ModelSettings, SavePolicy, SettingsError, validate_settings};
