//! Unit and result runners.

use std::future::Future;
use std::sync::OnceLock;

use fanout_core::{RunError, RunnerConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::lane::drain;
use crate::WorkSequence;

/// Run every operation with at most `max_concurrency` in flight.
///
/// Returns once all operations have finished. Fails with
/// [`RunError::InvalidConcurrency`] before touching any operation if
/// `max_concurrency` is 0.
pub async fn run_all<I, F, Fut, E>(
    operations: I,
    max_concurrency: usize,
) -> Result<(), RunError<E>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    checked_runner::<E>(max_concurrency)?.run_all(operations).await
}

/// Run every operation with at most `max_concurrency` in flight and return
/// their values in input order.
pub async fn collect_all<I, F, Fut, T, E>(
    operations: I,
    max_concurrency: usize,
) -> Result<Vec<T>, RunError<E>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    checked_runner::<E>(max_concurrency)?.collect_all(operations).await
}

fn checked_runner<E>(max_concurrency: usize) -> Result<Runner, RunError<E>> {
    RunnerConfig::from_limit(max_concurrency)
        .map(Runner::new)
        .map_err(|_| RunError::InvalidConcurrency(max_concurrency))
}

/// A configured runner.
///
/// The cancellation token is shared by every invocation made through this
/// runner; once cancelled, later invocations stop before claiming anything.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: RunnerConfig,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Get the cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run every operation and wait for all of them.
    pub async fn run_all<I, F, Fut, E>(&self, operations: I) -> Result<(), RunError<E>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let sequence = WorkSequence::new(operations);
        info!(
            "Running operations on {} lanes ({} on failure)",
            self.config.max_concurrency, self.config.failure_policy
        );

        drain(
            &sequence,
            self.config.max_concurrency,
            self.config.failure_policy,
            &self.cancel,
            |_, ()| {},
        )
        .await?;

        info!("Finished {} operations", sequence.claimed());
        Ok(())
    }

    /// Run every operation and return the values in input order.
    ///
    /// Completion order does not matter: each value lands in the slot of
    /// the input position it was claimed from. No partial results are
    /// returned on failure.
    pub async fn collect_all<I, F, Fut, T, E>(
        &self,
        operations: I,
    ) -> Result<Vec<T>, RunError<E>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let operations: Vec<F> = operations.into_iter().collect();
        let slots: Vec<OnceLock<T>> = std::iter::repeat_with(OnceLock::new)
            .take(operations.len())
            .collect();

        info!(
            "Collecting {} operations on {} lanes ({} on failure)",
            operations.len(),
            self.config.max_concurrency,
            self.config.failure_policy
        );
        let sequence = WorkSequence::new(operations);

        drain(
            &sequence,
            self.config.max_concurrency,
            self.config.failure_policy,
            &self.cancel,
            |index, value| {
                let written = slots[index].set(value).is_ok();
                debug_assert!(written, "result slot {index} written twice");
            },
        )
        .await?;

        // Every index was claimed exactly once and every lane has returned.
        Ok(slots
            .into_iter()
            .map(|slot| slot.into_inner().expect("result slot filled after drain"))
            .collect())
    }
}
