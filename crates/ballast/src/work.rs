//! Units of work and their completion signals.

use crate::{Error, Result};
use core::{
    fmt,
    panic::AssertUnwindSafe,
    pin::Pin,
    task::{Context, Poll},
};
use futures::{FutureExt, future::BoxFuture};
use tokio::sync::oneshot;

type Computation<T> = Box<dyn FnOnce() -> BoxFuture<'static, T> + Send + 'static>;

/// A single piece of assignable work.
///
/// A unit pairs an opaque computation with a one-shot slot through which its
/// result is delivered. It is created by a demand source, handed to the
/// [`Balancer`] and from there owned exclusively by exactly one worker until
/// the computation finishes. It is never returned to the coordinator.
///
/// [`Balancer`]: crate::Balancer
pub struct WorkUnit<T> {
    computation: Computation<T>,
    completion: oneshot::Sender<T>,
}

impl<T> WorkUnit<T>
where
    T: Send + 'static,
{
    /// Creates a unit from an asynchronous computation.
    ///
    /// Returns the unit together with the [`Completion`] the caller awaits for
    /// the result.
    pub fn new<F, Fut>(f: F) -> (Self, Completion<T>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                computation: Box::new(move || f().boxed()),
                completion: tx,
            },
            Completion { rx },
        )
    }

    /// Creates a unit from a synchronous computation.
    ///
    /// The closure runs on tokio's blocking pool so a long computation does
    /// not stall the worker threads of the runtime. The worker that owns the
    /// unit still counts it as executing until it returns.
    pub fn blocking<F>(f: F) -> (Self, Completion<T>)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::new(move || async move {
            match tokio::task::spawn_blocking(f).await {
                Ok(value) => value,
                Err(err) => match err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    // Only happens while the runtime is shutting down.
                    Err(_) => std::future::pending().await,
                },
            }
        })
    }

    /// Runs the computation and delivers its result.
    ///
    /// Returns `false` if the computation panicked. The panic is contained so
    /// the owning worker keeps serving its mailbox; the completion slot is
    /// dropped and the caller observes [`Error::Abandoned`].
    pub(crate) async fn execute(self) -> bool {
        let Self {
            computation,
            completion,
        } = self;

        match AssertUnwindSafe(async move { computation().await })
            .catch_unwind()
            .await
        {
            Ok(value) => {
                if completion.send(value).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Completion receiver dropped; discarding result");
                }
                true
            }
            Err(_) => false,
        }
    }
}

impl<T> fmt::Debug for WorkUnit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("awaited", &!self.completion.is_closed())
            .finish_non_exhaustive()
    }
}

/// The caller's side of a unit's completion signal.
///
/// Resolves to the computation's result once the worker has executed the
/// unit, or to [`Error::Abandoned`] if the unit was dropped first (for
/// example because it was refused by a stopped balancer or worker, or because
/// its computation panicked).
#[derive(Debug)]
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Returns the result if it is already available, without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Abandoned`] if the unit was dropped before producing a
    /// value. Returns `Ok(None)` while the unit is still queued or executing.
    pub fn try_take(&mut self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(Error::Abandoned),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| Error::Abandoned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_result() {
        let (unit, completion) = WorkUnit::new(|| async { 7_u32 });
        assert!(unit.execute().await);
        assert_eq!(completion.await, Ok(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_runs_off_the_runtime() {
        let (unit, completion) = WorkUnit::blocking(|| 6_u64 * 7);
        assert!(unit.execute().await);
        assert_eq!(completion.await, Ok(42));
    }

    #[tokio::test]
    async fn dropped_unit_is_abandoned() {
        let (unit, completion) = WorkUnit::new(|| async { 1_u8 });
        drop(unit);
        assert_eq!(completion.await, Err(Error::Abandoned));
    }

    fn explode() -> u8 {
        panic!("boom")
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let (unit, completion) = WorkUnit::new(|| async { explode() });
        assert!(!unit.execute().await);
        assert_eq!(completion.await, Err(Error::Abandoned));
    }

    #[tokio::test]
    async fn result_is_discarded_when_nobody_waits() {
        let (unit, completion) = WorkUnit::new(|| async { "late" });
        drop(completion);
        assert!(unit.execute().await);
    }

    #[tokio::test]
    async fn try_take_reports_progress() {
        let (unit, mut completion) = WorkUnit::new(|| async { 3_i32 });
        assert_eq!(completion.try_take(), Ok(None));
        assert!(unit.execute().await);
        assert_eq!(completion.try_take(), Ok(Some(3)));
    }
}
