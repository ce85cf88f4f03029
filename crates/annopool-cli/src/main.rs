mod config;
mod http;
mod inspect;
mod telemetry;
mod urls;

use std::sync::Arc;

use anyhow::Context;
use annopool_core::app::ReaperLoop;
use annopool_core::impls::JsonlEventLog;
use annopool_core::{CoordinatorBuilder, Skeleton};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::config::{LogFormat, ServeArgs, ServeConfig};
use crate::inspect::InspectArgs;
use crate::telemetry::init_telemetry;
use crate::urls::UrlArgs;

#[derive(Parser, Debug)]
#[command(name = "annopool", version, about = "Fair work pool for grasp annotation")]
struct Cli {
    /// Log output format.
    ///
    /// Environment variable: `ANNOPOOL_LOG_FORMAT`
    #[arg(long, global = true, env = "ANNOPOOL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the annotation API.
    Serve(ServeArgs),
    /// Replay the event log offline and print a summary.
    Inspect(InspectArgs),
    /// Generate annotation links for the given categories.
    Urls(UrlArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_telemetry(cli.log_format)?;

    match cli.command {
        Command::Serve(args) => serve(ServeConfig::try_from(args)?).await,
        Command::Inspect(args) => inspect::run(args).await,
        Command::Urls(args) => urls::run(args),
    }
}

async fn serve(config: ServeConfig) -> anyhow::Result<()> {
    let skeleton = Skeleton::load(&config.skeleton)
        .with_context(|| format!("loading skeleton {}", config.skeleton.display()))?;
    let log = JsonlEventLog::open(&config.event_log)
        .await
        .with_context(|| format!("opening event log {}", config.event_log.display()))?;

    let (coordinator, report) = CoordinatorBuilder::new(skeleton, Arc::new(log))
        .config(config.coordinator_config()?)
        .build()
        .await
        .context("recovering pool state")?;
    if !report.corrupt.is_empty() {
        tracing::warn!(corrupt = report.corrupt.len(), "event log contains corrupt records");
    }

    let cancel = CancellationToken::new();
    let reaper = config.lease_ttl.map(|_| {
        ReaperLoop::new(coordinator.clone(), config.reap_interval).spawn(cancel.child_token())
    });

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    log_startup_info(&config);

    axum::serve(listener, http::router(coordinator.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Some(reaper) = reaper
        && let Err(e) = reaper.await
    {
        tracing::error!(error = %e, "lease reaper panicked");
    }
    coordinator.shutdown().await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServeConfig) {
    tracing::info!(
        addr = %config.addr,
        skeleton = %config.skeleton.display(),
        event_log = %config.event_log.display(),
        seed = ?config.seed,
        lease_ttl = ?config.lease_ttl,
        reap_interval = ?config.reap_interval,
        "Starting annotation service"
    );
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_urls_subcommand() {
        let cli = Cli::try_parse_from([
            "annopool",
            "urls",
            "--skeleton",
            "s.json",
            "-p",
            "CODE",
            "Mug",
            "Pan",
        ])
        .unwrap();
        match cli.command {
            Command::Urls(args) => {
                assert_eq!(args.categories, vec!["Mug", "Pan"]);
                assert_eq!(args.prolific_code.as_deref(), Some("CODE"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_log_format_after_subcommand() {
        let cli = Cli::try_parse_from([
            "annopool",
            "inspect",
            "--skeleton",
            "s.json",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[derive(Clone)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn startup_info_is_logged_as_fields() {
        let config = ServeConfig {
            skeleton: "skeleton.json".into(),
            event_log: "events.jsonl".into(),
            addr: "127.0.0.1:5000".parse().unwrap(),
            seed: Some(7),
            lease_ttl: None,
            reap_interval: std::time::Duration::from_secs(30),
        };
        let capture = Capture(Arc::default());
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || log_startup_info(&config));

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Starting annotation service"));
        assert!(output.contains("addr=127.0.0.1:5000"));
        assert!(output.contains("event_log=events.jsonl"));
        assert!(!output.contains("ServeConfig"));
    }
}
