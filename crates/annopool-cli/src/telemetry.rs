//! Log output for every subcommand.
//!
//! Filtering comes from `RUST_LOG` (default `info`). Logs go to stderr so
//! `urls` and `inspect` can write their results to stdout.

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::rfc_3339());

    match format {
        LogFormat::Pretty => registry
            .with(
                layer
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_target(false)
                    .pretty(),
            )
            .try_init()?,
        LogFormat::Compact => registry.with(layer.with_target(false).compact()).try_init()?,
        LogFormat::Json => registry.with(layer.json()).try_init()?,
    }
    Ok(())
}
