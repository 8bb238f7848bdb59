//! Read-only views of pool load.
//!
//! Snapshots are produced by the coordinator itself, after it has finished
//! handling an event, so a snapshot never observes a half-applied update.

/// Outstanding units on one worker at the time of a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerLoad {
    /// Stable worker identity.
    pub worker: usize,
    /// Units enqueued at or executing on the worker.
    pub pending: usize,
}

/// Load of every worker in the pool, in worker-id order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    loads: Vec<WorkerLoad>,
    dispatched: u64,
    completed: u64,
}

impl Snapshot {
    /// Builds a snapshot from per-worker loads and lifetime counters.
    pub fn new(loads: Vec<WorkerLoad>, dispatched: u64, completed: u64) -> Self {
        Self {
            loads,
            dispatched,
            completed,
        }
    }

    /// Per-worker loads ordered by worker id.
    pub fn loads(&self) -> &[WorkerLoad] {
        &self.loads
    }

    /// Units dispatched since the pool started.
    pub const fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Completions acknowledged since the pool started.
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    /// Units dispatched but not yet acknowledged.
    pub const fn in_flight(&self) -> u64 {
        self.dispatched.saturating_sub(self.completed)
    }

    /// Sum of pending units across the pool.
    pub fn total(&self) -> usize {
        self.loads.iter().map(|load| load.pending).sum()
    }

    /// Mean pending units per worker; `0.0` for an empty snapshot.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.loads.is_empty() {
            0.0
        } else {
            self.total() as f64 / self.loads.len() as f64
        }
    }

    /// Highest pending count in the pool.
    pub fn max(&self) -> usize {
        self.loads.iter().map(|load| load.pending).max().unwrap_or(0)
    }

    /// Lowest pending count in the pool.
    pub fn min(&self) -> usize {
        self.loads.iter().map(|load| load.pending).min().unwrap_or(0)
    }

    /// Difference between the busiest and the idlest worker.
    pub fn spread(&self) -> usize {
        self.max() - self.min()
    }
}

/// Totals reported when a balancer shuts down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Units dispatched over the balancer's lifetime.
    pub dispatched: u64,
    /// Completions acknowledged over the balancer's lifetime.
    pub completed: u64,
}
