//! Execution layer - bounded-concurrency runners.
//!
//! A fixed number of worker lanes drain one shared [`WorkSequence`]. The
//! unit runner ([`run_all`]) only waits for every operation; the result
//! runner ([`collect_all`]) also returns each operation's value in input
//! order.

#![warn(missing_docs)]

pub mod sequence;
pub mod lane;
pub mod runner;

pub use sequence::WorkSequence;
pub use runner::{collect_all, run_all, Runner};

pub use fanout_core::{FailurePolicy, RunError, RunnerConfig};
pub use tokio_util::sync::CancellationToken;
