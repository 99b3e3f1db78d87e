//! Bounded wait for a qualifying event.
//!
//! [`await_event`] subscribes the caller to one event stream for at most
//! a deadline, running an evaluator over each event. Exactly one outcome
//! is ever produced; when the future is dropped the subscription goes
//! with it, so no evaluator runs after logical completion.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

/// How a bounded wait can fail.
#[derive(Debug, thiserror::Error)]
pub enum WaitError<E> {
    /// The deadline elapsed before any event resolved the wait.
    #[error("wait timed out after {0:?}")]
    Timeout(Duration),

    /// The event source closed (the connection shut down) while the
    /// wait was in flight.
    #[error("event source closed")]
    Closed,

    /// The evaluator itself failed; the wait ends immediately.
    #[error(transparent)]
    Eval(E),
}

impl<E> WaitError<E> {
    /// Returns `true` for the deadline-elapsed outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout(_))
    }
}

/// Waits up to `deadline` for an event the evaluator accepts.
///
/// The evaluator is invoked once per received event and decides the
/// outcome:
///
/// - `Ok(Some(value))` resolves the wait with `value`;
/// - `Ok(None)` with `persist` keeps waiting for further events; without
///   `persist` the wait resolves immediately with `Ok(None)` (single-shot
///   mode);
/// - `Err(e)` propagates as [`WaitError::Eval`] and ends the wait.
///
/// Deadline expiry yields [`WaitError::Timeout`]; the source closing
/// underneath the wait yields [`WaitError::Closed`]. A lagged receiver
/// skips the overwritten events and keeps going.
///
/// The evaluator is a plain `FnMut` returning a future rather than an
/// `async` closure so the returned future has one nameable type; that
/// keeps the whole wait `Send` when the evaluator borrows from the
/// caller and the wait runs inside a spawned task.
pub async fn await_event<T, R, E, F, Fut>(
    rx: &mut broadcast::Receiver<T>,
    deadline: Duration,
    persist: bool,
    mut evaluate: F,
) -> Result<Option<R>, WaitError<E>>
where
    T: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<Option<R>, E>>,
{
    let timer = tokio::time::sleep(deadline);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => return Err(WaitError::Timeout(deadline)),
            received = rx.recv() => match received {
                Ok(event) => {
                    match evaluate(event).await.map_err(WaitError::Eval)? {
                        Some(value) => return Ok(Some(value)),
                        None if persist => continue,
                        None => return Ok(None),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(WaitError::Closed);
                }
            },
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
