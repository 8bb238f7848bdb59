//! Error types for the dispatcher.
//!
//! The taxonomy is narrow. A full worker mailbox is not an error
//! (the dispatching call waits instead), and popping from an empty
//! [`LoadIndex`] is a broken invariant that panics rather than surfacing here.
//!
//! ## Error Cases
//! - `InvalidConfig`: a [`PoolConfig`] failed validation.
//! - `UnknownWorker`: an id that does not name a seated pool member.
//! - `LoadUnderflow`: a completion arrived for a worker with nothing pending.
//! - `WorkerStopped`: the worker task behind a mailbox has exited.
//! - `BalancerStopped`: the coordinator has exited and no longer takes work.
//! - `Abandoned`: a unit was dropped before its computation produced a value.
//!
//! [`LoadIndex`]: crate::LoadIndex
//! [`PoolConfig`]: crate::PoolConfig

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `ballast` can emit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Pool configuration was rejected.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The id does not name a seated member of the load index.
    #[error("Unknown worker {worker}")]
    UnknownWorker { worker: usize },

    /// Applying a load change would take a worker below zero outstanding
    /// units.
    #[error("Load underflow on worker {worker}")]
    LoadUnderflow { worker: usize },

    /// The worker task has exited and its mailbox is closed.
    #[error("Worker {worker} has stopped")]
    WorkerStopped { worker: usize },

    /// The coordinator has exited; the intake is closed.
    #[error("Balancer has stopped")]
    BalancerStopped,

    /// The unit was dropped without ever delivering a result.
    #[error("Work unit was abandoned before completing")]
    Abandoned,
}
