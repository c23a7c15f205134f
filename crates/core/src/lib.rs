//! Fanout core types.
//!
//! Configuration and error types shared by the bounded-concurrency
//! runners and the `fanout` binary.

#![warn(missing_docs)]

mod config;
mod error;

pub use config::{FailurePolicy, RunnerConfig};
pub use error::{ConfigError, RunError};
