//! The coordinator.
//!
//! [`Balancer`] is the single authority over pool load. It owns the
//! [`LoadIndex`] and every [`Worker`] handle inside it, and it is the only
//! code that changes a worker's pending count or heap position. All of that
//! happens on whichever task drives [`Balancer::run`] (or, in tests, calls
//! [`dispatch`](Balancer::dispatch) and [`completed`](Balancer::completed)
//! directly through `&mut self`), one event at a time. That serialization is
//! what lets the index use plain, unsynchronized heap operations.
//!
//! Two event streams feed the loop:
//!
//! - arrivals: [`WorkUnit`]s sent by demand sources through an [`Intake`];
//! - completions: worker ids sent by worker tasks as each unit finishes.
//!
//! The intake is a handoff channel of capacity one. When the least-loaded
//! worker's mailbox is full, `dispatch` waits, the coordinator stops pulling
//! from the intake and producers wait in turn. That is the only backpressure
//! path; nothing is dropped or reordered to relieve it. Completions travel on
//! an unbounded channel so a worker never waits on a coordinator that is
//! itself waiting on that worker's mailbox.


use crate::{
    Completion, Error, LoadIndex, Loaded, PoolConfig, Result, Snapshot, Summary, WorkUnit, Worker,
    WorkerLoad,
};
use core::{fmt, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

enum Event<T> {
    Arrival(WorkUnit<T>),
    Completed(usize),
    Shutdown,
    IntakeClosed,
    WorkersGone,
}

/// Least-loaded dispatcher over a fixed pool of workers.
///
/// Created once with [`Balancer::new`], which spawns the worker tasks and
/// hands back the producer-side [`Intake`]. Drive it with [`Balancer::run`].
pub struct Balancer<T> {
    index: LoadIndex<Worker<T>>,
    intake: mpsc::Receiver<WorkUnit<T>>,
    completions: mpsc::UnboundedReceiver<usize>,
    snapshots: watch::Sender<Snapshot>,
    tasks: Vec<JoinHandle<()>>,
    dispatched: u64,
    acknowledged: u64,
    shutdown_timeout: Duration,
}

impl<T> Balancer<T>
where
    T: Send + 'static,
{
    /// Spawns `config.workers()` worker tasks and builds the coordinator.
    ///
    /// Returns the coordinator and the [`Intake`] producers use to submit
    /// work. The intake can be cloned freely; once every clone is dropped,
    /// [`run`](Self::run) drains outstanding work and returns.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: &PoolConfig) -> (Self, Intake<T>) {
        let (intake_tx, intake_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let mut index = LoadIndex::with_capacity(config.workers());
        let mut tasks = Vec::with_capacity(config.workers());

        for worker_id in 0..config.workers() {
            let (worker, task) =
                Worker::spawn(worker_id, config.mailbox_capacity(), done_tx.clone());
            let id = index.insert(worker);
            debug_assert_eq!(id, worker_id);
            tasks.push(task);
        }

        let (snapshots, _) = watch::channel(Snapshot::default());
        let balancer = Self {
            index,
            intake: intake_rx,
            completions: done_rx,
            snapshots,
            tasks,
            dispatched: 0,
            acknowledged: 0,
            shutdown_timeout: config.shutdown_timeout(),
        };
        balancer.publish();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Balancer started with {} workers (mailbox capacity {})",
            config.workers(),
            config.mailbox_capacity()
        );

        (balancer, Intake { tx: intake_tx })
    }

    /// Hands `unit` to a least-loaded worker and charges that worker one unit.
    ///
    /// Waits while that worker's mailbox is full. Returns the id of the
    /// chosen worker. Ties between equally loaded workers are broken
    /// arbitrarily.
    ///
    /// If the returned future is dropped while waiting for a mailbox slot,
    /// the unit is dropped and no accounting changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerStopped`] if the chosen worker's task has
    /// exited.
    ///
    /// # Panics
    ///
    /// Panics if the pool is empty, which [`PoolConfig`] rules out.
    pub async fn dispatch(&mut self, unit: WorkUnit<T>) -> Result<usize> {
        let worker = self.index.peek_min().expect("load index is never empty");

        self.index
            .get(worker)
            .ok_or(Error::UnknownWorker { worker })?
            .submit(unit)
            .await?;

        let _pending = self.index.update_and_reseat(worker, 1)?;
        self.dispatched += 1;

        #[cfg(feature = "tracing")]
        tracing::trace!("Dispatched unit to worker {worker} ({_pending} pending)");

        Ok(worker)
    }

    /// Acknowledges one completed unit on `worker`. Returns its new load.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownWorker`] if `worker` is not part of this pool.
    /// - [`Error::LoadUnderflow`] if `worker` has nothing pending.
    pub fn completed(&mut self, worker: usize) -> Result<usize> {
        let pending = self.index.update_and_reseat(worker, -1)?;
        self.acknowledged += 1;

        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {worker} completed a unit ({pending} pending)");

        Ok(pending)
    }

    /// Waits for the next completion notification and acknowledges it.
    ///
    /// Returns the id of the worker that finished, or `None` once every
    /// worker task has exited.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`completed`](Self::completed).
    pub async fn next_completion(&mut self) -> Result<Option<usize>> {
        match self.completions.recv().await {
            Some(worker) => {
                self.completed(worker)?;
                Ok(Some(worker))
            }
            None => Ok(None),
        }
    }

    /// Runs the coordinator event loop.
    ///
    /// Each iteration waits for whichever comes first of a completion, the
    /// shutdown token, or an arrival on the intake; handles it fully; then
    /// publishes a [`Snapshot`]. Completions are preferred when several events
    /// are ready at once so that dispatch sees the freshest loads.
    ///
    /// When `shutdown` is cancelled the intake is closed to new submissions.
    /// Units it already accepted are still dispatched. Once the intake is
    /// empty (or every [`Intake`] has been dropped), the loop keeps
    /// acknowledging completions until no work is outstanding, then closes
    /// the worker mailboxes and waits for the worker tasks to exit (each
    /// bounded by the configured shutdown timeout).
    ///
    /// # Errors
    ///
    /// Returns the first error from [`dispatch`](Self::dispatch) or
    /// [`completed`](Self::completed). Both indicate a broken pool (a dead
    /// worker, or a completion the coordinator never dispatched).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(workers = self.index.len())))]
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<Summary> {
        let mut draining = false;
        let mut intake_open = true;

        loop {
            if !intake_open && self.index.total_load() == 0 {
                break;
            }

            let event = tokio::select! {
                biased;

                notice = self.completions.recv() => match notice {
                    Some(worker) => Event::Completed(worker),
                    None => Event::WorkersGone,
                },
                () = shutdown.cancelled(), if !draining => Event::Shutdown,
                arrival = self.intake.recv(), if intake_open => match arrival {
                    Some(unit) => Event::Arrival(unit),
                    None => Event::IntakeClosed,
                },
            };

            match event {
                Event::Arrival(unit) => {
                    self.dispatch(unit).await?;
                }
                Event::Completed(worker) => {
                    self.completed(worker)?;
                }
                Event::Shutdown => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        "Refusing new work; draining {} in-flight units",
                        self.index.total_load()
                    );
                    draining = true;
                    // Buffered units are still delivered after close.
                    self.intake.close();
                }
                Event::IntakeClosed => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "Intake exhausted; waiting on {} in-flight units",
                        self.index.total_load()
                    );
                    draining = true;
                    intake_open = false;
                }
                Event::WorkersGone => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(
                        "Every worker has exited with {} units unacknowledged",
                        self.index.total_load()
                    );
                    break;
                }
            }

            self.publish();
        }

        Ok(self.stop().await)
    }

    /// Closes every mailbox and waits for the worker tasks to exit.
    async fn stop(self) -> Summary {
        let Self {
            index,
            tasks,
            dispatched,
            acknowledged,
            shutdown_timeout,
            ..
        } = self;

        // Dropping the handles closes the mailboxes; each worker finishes what
        // it holds and exits.
        drop(index);

        #[cfg(feature = "tracing")]
        tracing::debug!("Waiting up to {shutdown_timeout:?} per worker for shutdown");

        let joins = tasks.into_iter().enumerate().map(|(_worker, task)| async move {
            match timeout(shutdown_timeout, task).await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {_worker} stopped");
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {_worker} failed: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Worker {_worker} shutdown timed out");
                }
            }
        });
        futures::future::join_all(joins).await;

        #[cfg(feature = "tracing")]
        tracing::info!("Balancer stopped: {dispatched} dispatched, {acknowledged} completed");

        Summary {
            dispatched,
            completed: acknowledged,
        }
    }
}

impl<T> Balancer<T> {
    /// Current load of every worker, in worker-id order.
    pub fn snapshot(&self) -> Snapshot {
        let loads = self
            .index
            .iter()
            .map(|worker| WorkerLoad {
                worker: worker.id(),
                pending: worker.load(),
            })
            .collect();
        Snapshot::new(loads, self.dispatched, self.acknowledged)
    }

    /// Subscribes to the snapshots the coordinator publishes after every
    /// event.
    ///
    /// The receiver never touches the index, so reporters may read it from
    /// any task.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Read-only view of the load index.
    pub fn load_index(&self) -> &LoadIndex<Worker<T>> {
        &self.index
    }

    /// Number of workers in the pool.
    pub fn workers(&self) -> usize {
        self.index.len()
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

impl<T> fmt::Debug for Balancer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Balancer")
            .field("index", &self.index)
            .field("dispatched", &self.dispatched)
            .field("completed", &self.acknowledged)
            .finish_non_exhaustive()
    }
}

/// Producer-side handle for submitting work to a [`Balancer`].
///
/// Cheap to clone. Submissions wait while the coordinator is itself waiting
/// on a full worker mailbox.
pub struct Intake<T> {
    tx: mpsc::Sender<WorkUnit<T>>,
}

impl<T> Intake<T>
where
    T: Send + 'static,
{
    /// Hands `unit` to the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BalancerStopped`] if the coordinator is shutting down
    /// or gone. The unit is dropped and its completion resolves to
    /// [`Error::Abandoned`].
    pub async fn submit(&self, unit: WorkUnit<T>) -> Result<()> {
        self.tx
            .send(unit)
            .await
            .map_err(|_| Error::BalancerStopped)
    }

    /// Submits an asynchronous computation and waits for its result.
    ///
    /// # Errors
    ///
    /// [`Error::BalancerStopped`] if the unit could not be submitted,
    /// [`Error::Abandoned`] if it was dropped before producing a value.
    pub async fn execute<F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (unit, completion) = WorkUnit::new(f);
        self.submit_and_wait(unit, completion).await
    }

    /// Submits a synchronous computation and waits for its result.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn execute_blocking<F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (unit, completion) = WorkUnit::blocking(f);
        self.submit_and_wait(unit, completion).await
    }

    async fn submit_and_wait(&self, unit: WorkUnit<T>, completion: Completion<T>) -> Result<T> {
        self.submit(unit).await?;
        completion.await
    }
}

impl<T> Intake<T> {
    /// Returns `true` once the coordinator no longer accepts work.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Clone for Intake<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for Intake<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intake")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
