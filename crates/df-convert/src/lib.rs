//! # df-convert
//!
//! The job-execution core of docforge.
//!
//! This crate provides:
//!
//! - **Admission control** ([`JobLimiter`]) -- a capacity-bounded, FIFO
//!   limiter whose slots are released by dropping a [`JobSlot`] guard.
//! - **Command execution** ([`EngineCommand`]) -- runs the engine as a child
//!   process with a deadline and reports a [`SubprocessOutcome`].
//! - **Engine discovery** ([`ConversionEngine`]) -- resolves `soffice` from
//!   configuration or `PATH`.
//! - **Artifact lifecycle** ([`JobArtifacts`]) -- deletes a job's input and
//!   output files on every exit path.
//! - **Conversion** ([`ConversionExecutor`], [`ConversionService`]) -- ties the
//!   pieces together into a single `convert` call.

pub mod artifacts;
pub mod command;
pub mod engine;
pub mod executor;
pub mod limiter;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

// ---- Re-exports for convenience ----

pub use artifacts::JobArtifacts;
pub use command::{EngineCommand, SubprocessOutcome};
pub use engine::{ConversionEngine, EngineInfo};
pub use executor::ConversionExecutor;
pub use limiter::{JobLimiter, JobSlot};
pub use service::{ConversionRequest, ConversionService, ConvertedDocument};
