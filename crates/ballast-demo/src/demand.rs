//! Simulated demand.
//!
//! Each producer alternates between thinking for a random while and asking
//! the pool to do a random amount of work, waiting for the answer before it
//! thinks again. With many producers this gives the coordinator a bursty,
//! uneven stream of arrivals.

use ballast::{Error, Intake};
use rand::Rng;
use std::time::Duration;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct DemandConfig {
    pub producers: usize,
    pub max_think: Duration,
    pub max_work: Duration,
}

/// Spawns `config.producers` producer tasks.
///
/// Each task returns the number of units it saw completed. Producers stop
/// when `shutdown` is cancelled or the pool stops accepting work.
pub fn spawn(
    intake: &Intake<Duration>,
    config: &DemandConfig,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<u64>> {
    (0..config.producers)
        .map(|producer_id| {
            tokio::spawn(producer(
                producer_id,
                intake.clone(),
                config.clone(),
                shutdown.clone(),
            ))
        })
        .collect()
}

async fn producer(
    producer_id: usize,
    intake: Intake<Duration>,
    config: DemandConfig,
    shutdown: CancellationToken,
) -> u64 {
    let mut served = 0;

    loop {
        let think = random_duration(config.max_think);
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = sleep(think) => {}
        }

        let work = random_duration(config.max_work);
        match intake
            .execute(move || async move {
                sleep(work).await;
                work
            })
            .await
        {
            Ok(worked) => {
                served += 1;
                tracing::trace!("Producer {producer_id}: unit worked for {worked:?}");
            }
            Err(Error::BalancerStopped) => {
                tracing::debug!("Producer {producer_id}: pool closed");
                break;
            }
            Err(e) => {
                tracing::warn!("Producer {producer_id}: {e}");
                break;
            }
        }
    }

    served
}

/// Uniform in `[0, max)` at millisecond resolution.
fn random_duration(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_ms))
}
