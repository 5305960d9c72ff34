//! df-core: shared types, errors, configuration and the job model.
//!
//! This crate is the foundational dependency for the other df-* crates. It
//! provides the unified error type, application configuration, and the
//! [`Job`] record with its lifecycle state machine.

pub mod config;
pub mod error;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use job::{Job, JobId, JobState};
