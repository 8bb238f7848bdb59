//! Pool workers.
//!
//! A worker is split in two halves. The [`Worker`] handle lives inside the
//! coordinator's [`LoadIndex`] and carries the load accounting, which only the
//! coordinator mutates. The worker task ([`worker_loop`]) owns the receiving
//! end of the mailbox and knows nothing about load; it executes units in the
//! order they arrive and reports each completion by id.
//!
//! The mailbox is bounded by a semaphore rather than by the channel itself.
//! A slot is taken when a unit is submitted and released only after the unit's
//! computation has returned, so the capacity counts units that are queued
//! *or* executing. With a capacity of one, a second submission waits until the
//! worker has finished the first and is free to take the next.
//!
//! [`LoadIndex`]: crate::LoadIndex

use crate::{Error, Loaded, Result, WorkUnit};
use core::fmt;
use std::sync::Arc;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, mpsc},
    task::JoinHandle,
};

/// A unit together with the mailbox slot it occupies.
struct Letter<T> {
    unit: WorkUnit<T>,
    slot: OwnedSemaphorePermit,
}

/// Coordinator-side handle to a worker task.
///
/// Holds the sending half of the worker's mailbox and the worker's load
/// accounting. `pending` and `position` are written only through the
/// [`Loaded`] implementation, which is only ever driven by the coordinator's
/// index; the worker task never sees them.
pub struct Worker<T> {
    id: usize,
    mailbox: mpsc::UnboundedSender<Letter<T>>,
    slots: Arc<Semaphore>,
    capacity: usize,
    pending: usize,
    position: Option<usize>,
}

impl<T> Worker<T>
where
    T: Send + 'static,
{
    /// Spawns a worker task on the current tokio runtime.
    ///
    /// The task reports each finished unit by sending `id` on `done`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, or if `capacity` exceeds
    /// [`Semaphore::MAX_PERMITS`]. [`PoolConfig`](crate::PoolConfig) rejects
    /// such capacities.
    pub(crate) fn spawn(
        id: usize,
        capacity: usize,
        done: mpsc::UnboundedSender<usize>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let slots = Arc::new(Semaphore::new(capacity));
        let task = tokio::spawn(worker_loop(id, rx, Arc::clone(&slots), done));

        (
            Self {
                id,
                mailbox: tx,
                slots,
                capacity,
                pending: 0,
                position: None,
            },
            task,
        )
    }

    /// Enqueues `unit` at the back of this worker's mailbox.
    ///
    /// Waits while the mailbox is full. Work is never dropped to make room.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerStopped`] if the worker task has exited. The
    /// unit is dropped in that case and its completion resolves to
    /// [`Error::Abandoned`].
    pub async fn submit(&self, unit: WorkUnit<T>) -> Result<()> {
        let slot = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(slot) => slot,
            Err(TryAcquireError::NoPermits) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {} mailbox full; waiting for a slot", self.id);

                Arc::clone(&self.slots)
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::WorkerStopped { worker: self.id })?
            }
            Err(TryAcquireError::Closed) => {
                return Err(Error::WorkerStopped { worker: self.id });
            }
        };

        self.mailbox
            .send(Letter { unit, slot })
            .map_err(|_| Error::WorkerStopped { worker: self.id })
    }
}

impl<T> Worker<T> {
    /// Stable identity of this worker within its pool.
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Number of units handed to this worker that have not yet completed.
    pub const fn pending(&self) -> usize {
        self.pending
    }

    /// Maximum units this worker holds, queued or executing.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free mailbox slots right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

impl<T> Loaded for Worker<T> {
    fn load(&self) -> usize {
        self.pending
    }

    fn set_load(&mut self, load: usize) {
        self.pending = load;
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn set_position(&mut self, position: Option<usize>) {
        self.position = position;
    }
}

impl<T> fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("pending", &self.pending)
            .field("position", &self.position)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Worker task: executes mailbox units one at a time, in arrival order.
///
/// For every unit received it runs the computation, delivers the result
/// through the unit's completion slot, frees the mailbox slot and only then
/// sends `worker_id` on `done`. Exactly one notification is sent per unit,
/// including units whose computation panicked.
///
/// # Arguments
///
/// - `worker_id`: Identity reported on `done`.
/// - `rx`: Receiving half of the mailbox.
/// - `slots`: Mailbox capacity shared with the [`Worker`] handle. Closed when
///   the loop exits so that submitters waiting for a slot fail instead of
///   hanging.
/// - `done`: Completion channel back to the coordinator.
///
/// The loop ends once every [`Worker`] handle is dropped and the mailbox has
/// drained, or when the coordinator stops listening on `done`.
async fn worker_loop<T>(
    worker_id: usize,
    mut rx: mpsc::UnboundedReceiver<Letter<T>>,
    slots: Arc<Semaphore>,
    done: mpsc::UnboundedSender<usize>,
) where
    T: Send + 'static,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    while let Some(Letter { unit, slot }) = rx.recv().await {
        if !unit.execute().await {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {worker_id}: computation panicked; unit abandoned");
        }
        drop(slot);

        if done.send(worker_id).is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker_id}: coordinator gone; stopping");
            break;
        }
    }

    slots.close();

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}
