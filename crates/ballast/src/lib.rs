//! A least-loaded work dispatcher.
//!
//! A fixed pool of [`Worker`]s executes opaque [`WorkUnit`]s. A single
//! [`Balancer`] coordinator receives every unit from any number of producers
//! (through an [`Intake`]) and hands it to the worker with the fewest
//! outstanding units, tracked in a [`LoadIndex`]. Workers report each finished
//! unit back to the coordinator, which lowers that worker's load.
//!
//! ```no_run
//! use ballast::{Balancer, PoolConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> ballast::Result<()> {
//! let config = PoolConfig::new(4, 16)?;
//! let (balancer, intake) = Balancer::<u64>::new(&config);
//! let coordinator = tokio::spawn(balancer.run(CancellationToken::new()));
//!
//! let answer = intake.execute(|| async { 6 * 7 }).await?;
//! assert_eq!(answer, 42);
//!
//! drop(intake);
//! let summary = coordinator.await.expect("coordinator panicked")?;
//! assert_eq!(summary.completed, 1);
//! # Ok(())
//! # }
//! ```

mod balancer;
mod config;
mod error;
mod index;
mod stats;
mod work;
mod worker;

pub use crate::balancer::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::index::*;
pub use crate::stats::*;
pub use crate::work::*;
pub use crate::worker::*;
