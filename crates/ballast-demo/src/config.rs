use crate::demand::DemandConfig;
use crate::report::ReportConfig;
use anyhow::bail;
use ballast::PoolConfig;
use clap::Parser;
use std::time::Duration;

/// Runtime configuration for the `ballast-demo` binary.
///
/// The defaults reproduce a small, visibly uneven workload: ten workers, sixty
/// producers, and think/work times that scale with the pool so the loads
/// drift up and down instead of settling.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ballast-demo",
    version,
    about = "Drives a least-loaded worker pool with simulated demand"
)]
pub struct CliArgs {
    /// Number of workers in the pool.
    ///
    /// Environment variable: `BALLAST_WORKERS`
    #[arg(long, env = "BALLAST_WORKERS", default_value_t = ballast::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Units a single worker may hold, queued or executing, before dispatch
    /// to it waits.
    ///
    /// Environment variable: `BALLAST_MAILBOX_CAPACITY`
    #[arg(long, env = "BALLAST_MAILBOX_CAPACITY", default_value_t = ballast::DEFAULT_MAILBOX_CAPACITY)]
    pub mailbox_capacity: usize,

    /// Number of concurrent demand sources.
    ///
    /// Environment variable: `BALLAST_PRODUCERS`
    #[arg(long, env = "BALLAST_PRODUCERS", default_value_t = 60)]
    pub producers: usize,

    /// Upper bound of the random pause between a producer's requests.
    /// Defaults to 2000 ms per worker.
    ///
    /// Environment variable: `BALLAST_MAX_THINK_MS`
    #[arg(long, env = "BALLAST_MAX_THINK_MS")]
    pub max_think_ms: Option<u64>,

    /// Upper bound of the random time a unit spends working. Defaults to
    /// 1000 ms per worker.
    ///
    /// Environment variable: `BALLAST_MAX_WORK_MS`
    #[arg(long, env = "BALLAST_MAX_WORK_MS")]
    pub max_work_ms: Option<u64>,

    /// Stop after this many seconds. `0` runs until Ctrl+C or SIGTERM.
    ///
    /// Environment variable: `BALLAST_RUN_FOR_SECS`
    #[arg(long, env = "BALLAST_RUN_FOR_SECS", default_value_t = 0)]
    pub run_for_secs: u64,

    /// How long shutdown waits for each worker task to exit.
    ///
    /// Environment variable: `BALLAST_SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "BALLAST_SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,

    /// Print a line for every snapshot the coordinator publishes.
    ///
    /// Environment variable: `BALLAST_REPORT_EVERY_EVENT`
    #[arg(long, env = "BALLAST_REPORT_EVERY_EVENT", default_value_t = false)]
    pub report_every_event: bool,

    /// Minimum time between printed lines unless `--report-every-event` is
    /// set.
    ///
    /// Environment variable: `BALLAST_REPORT_INTERVAL_MS`
    #[arg(long, env = "BALLAST_REPORT_INTERVAL_MS", default_value_t = 250)]
    pub report_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub pool: PoolConfig,
    pub demand: DemandConfig,
    pub report: ReportConfig,
    pub run_for: Option<Duration>,
}

impl TryFrom<CliArgs> for DemoConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let pool = PoolConfig::builder()
            .workers(args.workers)
            .mailbox_capacity(args.mailbox_capacity)
            .shutdown_timeout(Duration::from_secs(args.shutdown_timeout_secs))
            .build()?;

        if args.producers == 0 {
            bail!("BALLAST_PRODUCERS must be greater than 0");
        }

        if args.report_interval_ms == 0 && !args.report_every_event {
            bail!("BALLAST_REPORT_INTERVAL_MS must be greater than 0 unless every event is reported");
        }

        let per_worker = u64::try_from(args.workers)?;
        let max_think_ms = match args.max_think_ms {
            Some(ms) => ms,
            None => per_worker
                .checked_mul(2000)
                .ok_or_else(|| anyhow::anyhow!("Overflow in default think time"))?,
        };
        let max_work_ms = match args.max_work_ms {
            Some(ms) => ms,
            None => per_worker
                .checked_mul(1000)
                .ok_or_else(|| anyhow::anyhow!("Overflow in default work time"))?,
        };

        Ok(Self {
            pool,
            demand: DemandConfig {
                producers: args.producers,
                max_think: Duration::from_millis(max_think_ms),
                max_work: Duration::from_millis(max_work_ms),
            },
            report: ReportConfig {
                every_event: args.report_every_event,
                interval: Duration::from_millis(args.report_interval_ms),
            },
            run_for: (args.run_for_secs > 0).then(|| Duration::from_secs(args.run_for_secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("ballast-demo").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn timings_scale_with_workers() {
        let config = DemoConfig::try_from(parse(&["--workers", "4"])).unwrap();
        assert_eq!(config.pool.workers(), 4);
        assert_eq!(config.demand.max_think, Duration::from_secs(8));
        assert_eq!(config.demand.max_work, Duration::from_secs(4));
        assert_eq!(config.run_for, None);
    }

    #[test]
    fn explicit_timings_win() {
        let config = DemoConfig::try_from(parse(&[
            "--max-think-ms",
            "10",
            "--max-work-ms",
            "5",
            "--run-for-secs",
            "2",
        ]))
        .unwrap();
        assert_eq!(config.demand.max_think, Duration::from_millis(10));
        assert_eq!(config.demand.max_work, Duration::from_millis(5));
        assert_eq!(config.run_for, Some(Duration::from_secs(2)));
    }

    #[test]
    fn rejects_invalid_sizes() {
        assert!(DemoConfig::try_from(parse(&["--workers", "0"])).is_err());
        assert!(DemoConfig::try_from(parse(&["--mailbox-capacity", "0"])).is_err());
        assert!(DemoConfig::try_from(parse(&["--producers", "0"])).is_err());
    }
}
