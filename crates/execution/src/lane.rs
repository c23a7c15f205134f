//! Worker lanes draining a shared [`WorkSequence`].
//!
//! Every runner is built on [`drain`]: up to a fixed number of lanes pull
//! from the same cursor, each running one operation at a time. The number
//! of lanes is therefore the concurrency bound; no semaphore is involved.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use fanout_core::{FailurePolicy, RunError};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::WorkSequence;

/// First failure seen by any lane, with its input index.
type FirstFailure<E> = Mutex<Option<(usize, E)>>;

/// Run at most `lanes` workers over `sequence` until every one of them stops.
///
/// A lane is only started once it has claimed an operation, so a limit
/// larger than the input costs nothing beyond the operations themselves.
///
/// Each successful value is handed to `store` together with the input index
/// of the operation that produced it. The call returns only after all lanes
/// have terminated, so `store` has seen every value by then.
///
/// Cancellation is checked before each claim. Operations already running
/// are always awaited to completion.
pub async fn drain<I, Fut, T, E, S>(
    sequence: &WorkSequence<I>,
    lanes: NonZeroUsize,
    policy: FailurePolicy,
    cancel: &CancellationToken,
    store: S,
) -> Result<(), RunError<E>>
where
    I: Iterator,
    I::Item: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: Fn(usize, T),
{
    let first_failure: FirstFailure<E> = Mutex::new(None);
    let mut running = FuturesUnordered::new();

    while running.len() < lanes.get() {
        let Some(claim) = next_claim(sequence, cancel) else {
            break;
        };
        let lane = running.len();
        running.push(run_lane(lane, claim, sequence, policy, cancel, &store, &first_failure));
    }
    debug!("Started {} lanes", running.len());

    while running.next().await.is_some() {}
    drop(running);

    let failure = first_failure
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some((index, source)) = failure {
        return Err(RunError::Operation { index, source });
    }

    if cancel.is_cancelled() && sequence.has_remaining() {
        return Err(RunError::Cancelled {
            claimed: sequence.claimed(),
        });
    }

    Ok(())
}

fn next_claim<I: Iterator>(
    sequence: &WorkSequence<I>,
    cancel: &CancellationToken,
) -> Option<(usize, I::Item)> {
    if cancel.is_cancelled() {
        if !sequence.is_closed() {
            debug!("Run cancelled, closing sequence");
            sequence.close();
        }
        return None;
    }

    sequence.claim()
}

async fn run_lane<I, Fut, T, E, S>(
    lane: usize,
    first: (usize, I::Item),
    sequence: &WorkSequence<I>,
    policy: FailurePolicy,
    cancel: &CancellationToken,
    store: &S,
    first_failure: &FirstFailure<E>,
) where
    I: Iterator,
    I::Item: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: Fn(usize, T),
{
    let mut completed = 0usize;
    let mut claim = Some(first);

    while let Some((index, operation)) = claim.take() {
        debug!("Lane {} claimed operation {}", lane, index);

        match operation().await {
            Ok(value) => {
                store(index, value);
                completed += 1;
            }
            Err(source) => {
                warn!("Operation {} failed on lane {}", index, lane);
                record_failure(first_failure, index, source);

                if policy == FailurePolicy::StopClaiming {
                    sequence.close();
                    break;
                }
            }
        }

        claim = next_claim(sequence, cancel);
    }

    debug!("Lane {} finished after {} operations", lane, completed);
}

fn record_failure<E>(first_failure: &FirstFailure<E>, index: usize, source: E) {
    let mut slot = first_failure.lock().unwrap_or_else(PoisonError::into_inner);
    match slot.as_ref().map(|(first, _)| *first) {
        None => *slot = Some((index, source)),
        Some(first) => debug!(
            "Discarding failure of operation {} (operation {} failed first)",
            index, first
        ),
    }
}
