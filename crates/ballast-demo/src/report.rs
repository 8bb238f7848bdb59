//! Console view of pool load.
//!
//! One line per report: every worker's pending count in worker order, the
//! mean across the pool to two decimals, then a strip of band glyphs running
//! from idle to saturated.

use ballast::Snapshot;
use std::time::Duration;
use tokio::{sync::watch, time::sleep};

/// Glyphs for 0 through 8 pending units.
const BANDS: [char; 9] = [' ', '.', ':', '-', '=', '+', '*', '#', '%'];
/// Glyph for 9 or more pending units.
const SATURATED: char = '@';

#[derive(Debug, Clone, Copy)]
pub struct ReportConfig {
    pub every_event: bool,
    pub interval: Duration,
}

/// Prints snapshots until the coordinator stops publishing.
///
/// With `every_event` unset, lines are printed at most once per `interval`
/// and intermediate snapshots are skipped.
pub async fn run(mut snapshots: watch::Receiver<Snapshot>, config: ReportConfig) {
    while snapshots.changed().await.is_ok() {
        let line = format_line(&snapshots.borrow_and_update());
        println!("{line}");

        if !config.every_event {
            sleep(config.interval).await;
        }
    }

    tracing::debug!("Reporter stopped");
}

pub fn band(pending: usize) -> char {
    BANDS.get(pending).copied().unwrap_or(SATURATED)
}

pub fn format_line(snapshot: &Snapshot) -> String {
    let mut line = String::new();
    for load in snapshot.loads() {
        line.push_str(&format!("{:>3} ", load.pending));
    }
    line.push_str(&format!("| {:>6.2} |", snapshot.mean()));
    line.extend(snapshot.loads().iter().map(|load| band(load.pending)));
    line.push('|');
    line
}
