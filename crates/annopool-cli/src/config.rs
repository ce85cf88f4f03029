use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use annopool_core::CoordinatorConfig;
use clap::{Args, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human readable.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// Settings for `annopool serve`. Every flag can also come from the
/// environment (or a `.env` file).
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Annotation skeleton: `{"<category>": {"<object_id>": [grasp_id, ...]}}`.
    ///
    /// Environment variable: `ANNOPOOL_SKELETON`
    #[arg(long, env = "ANNOPOOL_SKELETON")]
    pub skeleton: PathBuf,

    /// Append-only event log (JSON lines). Created if missing.
    ///
    /// Environment variable: `ANNOPOOL_EVENT_LOG`
    #[arg(long, env = "ANNOPOOL_EVENT_LOG", default_value = "annotations.jsonl")]
    pub event_log: PathBuf,

    /// Address to listen on.
    ///
    /// Environment variable: `ANNOPOOL_ADDR`
    #[arg(long, env = "ANNOPOOL_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub addr: String,

    /// Fixed RNG seed for reproducible assignment order.
    ///
    /// Environment variable: `ANNOPOOL_SEED`
    #[arg(long, env = "ANNOPOOL_SEED")]
    pub seed: Option<u64>,

    /// Return an assigned but unsubmitted unit to the pool after this many
    /// seconds. Unset keeps it reserved until submit or removal.
    ///
    /// Environment variable: `ANNOPOOL_LEASE_TTL_SECS`
    #[arg(long, env = "ANNOPOOL_LEASE_TTL_SECS")]
    pub lease_ttl_secs: Option<u64>,

    /// How often the background reaper looks for expired leases.
    ///
    /// Environment variable: `ANNOPOOL_REAP_INTERVAL_SECS`
    #[arg(long, env = "ANNOPOOL_REAP_INTERVAL_SECS", default_value_t = 30)]
    pub reap_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub skeleton: PathBuf,
    pub event_log: PathBuf,
    pub addr: SocketAddr,
    pub seed: Option<u64>,
    pub lease_ttl: Option<Duration>,
    pub reap_interval: Duration,
}

impl ServeConfig {
    pub fn coordinator_config(&self) -> anyhow::Result<CoordinatorConfig> {
        let lease_ttl = self
            .lease_ttl
            .map(chrono::Duration::from_std)
            .transpose()
            .context("lease TTL out of range")?;
        Ok(CoordinatorConfig {
            seed: self.seed,
            lease_ttl,
        })
    }
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let addr: SocketAddr = args
            .addr
            .parse()
            .with_context(|| format!("ANNOPOOL_ADDR is not a socket address: {}", args.addr))?;

        if args.lease_ttl_secs == Some(0) {
            bail!("ANNOPOOL_LEASE_TTL_SECS must be greater than 0");
        }
        if args.reap_interval_secs == 0 {
            bail!("ANNOPOOL_REAP_INTERVAL_SECS must be greater than 0");
        }

        Ok(Self {
            skeleton: args.skeleton,
            event_log: args.event_log,
            addr,
            seed: args.seed,
            lease_ttl: args.lease_ttl_secs.map(Duration::from_secs),
            reap_interval: Duration::from_secs(args.reap_interval_secs),
        })
    }
}
