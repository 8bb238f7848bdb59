//! Console logging for the demo.
//!
//! Log lines go to stderr through `tracing_subscriber::fmt`; the load report
//! itself is printed on stdout, so the two can be redirected separately.
//! Verbosity follows `RUST_LOG` and defaults to `info`.
//!
//! ```bash
//! RUST_LOG=ballast=trace,ballast_demo=debug cargo run -p ballast-demo
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;

    Ok(())
}
