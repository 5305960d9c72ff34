//! Route handlers for the HTTP API.

pub mod convert;
pub mod health;
pub mod status;
