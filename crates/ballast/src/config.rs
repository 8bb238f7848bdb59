use crate::{Error, Result};
use core::time::Duration;

/// Default number of workers in a pool.
pub const DEFAULT_WORKERS: usize = 10;

/// Default number of units a worker may hold (queued plus executing) before
/// dispatch to it waits.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 60;

/// Default time allowed for each worker task to stop during shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Fixed topology of a worker pool.
///
/// Both sizes are set once at startup and never change for the lifetime of
/// the [`Balancer`]. Construct with [`PoolConfig::builder`] or
/// [`PoolConfig::new`]; either path validates that both sizes are positive,
/// which is what guarantees the load index is never empty.
///
/// [`Balancer`]: crate::Balancer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    workers: usize,
    mailbox_capacity: usize,
    shutdown_timeout: Duration,
}

impl PoolConfig {
    /// Creates a validated configuration with the default shutdown timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if either size is zero.
    pub fn new(workers: usize, mailbox_capacity: usize) -> Result<Self> {
        Self::builder()
            .workers(workers)
            .mailbox_capacity(mailbox_capacity)
            .build()
    }

    /// Returns a builder preloaded with the defaults.
    pub const fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder {
            workers: DEFAULT_WORKERS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Number of workers in the pool.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Maximum units a single worker holds, queued or executing.
    pub const fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    /// Upper bound on how long shutdown waits for each worker task to exit.
    pub const fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Builder for [`PoolConfig`].
#[derive(Clone, Debug)]
pub struct PoolConfigBuilder {
    workers: usize,
    mailbox_capacity: usize,
    shutdown_timeout: Duration,
}

impl PoolConfigBuilder {
    /// Sets the number of workers.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the per-worker mailbox capacity.
    #[must_use]
    pub const fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Sets how long shutdown waits for each worker task.
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validates and produces the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the worker count or the mailbox
    /// capacity is zero, or if the capacity exceeds what a tokio semaphore can
    /// hold.
    pub fn build(self) -> Result<PoolConfig> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "worker count must be greater than 0".into(),
            });
        }

        if self.mailbox_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "mailbox capacity must be greater than 0".into(),
            });
        }

        if self.mailbox_capacity > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "mailbox capacity ({}) exceeds the maximum of {}",
                    self.mailbox_capacity,
                    tokio::sync::Semaphore::MAX_PERMITS
                ),
            });
        }

        Ok(PoolConfig {
            workers: self.workers,
            mailbox_capacity: self.mailbox_capacity,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}
