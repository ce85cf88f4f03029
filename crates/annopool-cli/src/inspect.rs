//! `annopool inspect` - offline view of a skeleton plus event log.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use annopool_core::app::{AnnotatorActivity, PoolStats, RecoveryReport, annotator_activity, recover};
use annopool_core::impls::JsonlEventLog;
use annopool_core::pool::LeaseTable;
use annopool_core::Skeleton;
use clap::{Args, ValueEnum};
use serde::Serialize;

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Environment variable: `ANNOPOOL_SKELETON`
    #[arg(long, env = "ANNOPOOL_SKELETON")]
    pub skeleton: PathBuf,

    /// Environment variable: `ANNOPOOL_EVENT_LOG`
    #[arg(long, env = "ANNOPOOL_EVENT_LOG", default_value = "annotations.jsonl")]
    pub event_log: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
pub struct Inspection {
    pub recovery: RecoveryReport,
    pub stats: PoolStats,
    pub annotators: BTreeMap<String, AnnotatorActivity>,
}

impl Inspection {
    pub async fn collect(skeleton: &Skeleton, log: &JsonlEventLog) -> anyhow::Result<Self> {
        let recovery = recover(skeleton, log).await.context("replaying event log")?;
        if let Err(violation) = recovery.state.check_invariants() {
            tracing::error!(%violation, "recovered pool is inconsistent");
        }
        Ok(Self {
            stats: PoolStats::collect(&recovery.state, &LeaseTable::new()),
            annotators: annotator_activity(&recovery.entries),
            recovery: recovery.report,
        })
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let r = &self.recovery;
        let _ = writeln!(
            out,
            "log: {} records ({} applied, {} no-op), {} corrupt",
            r.records(),
            r.applied,
            r.no_ops,
            r.corrupt.len()
        );
        for corrupt in &r.corrupt {
            let _ = writeln!(out, "  line {}: {}", corrupt.line, corrupt.reason);
        }

        let s = &self.stats;
        let _ = writeln!(
            out,
            "pool: {} categories, {} objects, {} units, {} annotated, {} remaining",
            s.categories, s.objects, s.units, s.annotated, s.assignable
        );
        for (name, counts) in &s.per_category {
            let _ = writeln!(
                out,
                "  {name}: {}/{} annotated across {} objects",
                counts.annotated, counts.units, counts.objects
            );
        }

        let _ = writeln!(out, "annotators: {}", self.annotators.len());
        for (annotator, activity) in &self.annotators {
            let _ = writeln!(
                out,
                "  {annotator}: {} annotations, {} malformed, {} invalid grasps",
                activity.annotations, activity.malformed_reports, activity.invalid_grasp_reports
            );
        }
        out
    }
}

pub async fn run(args: InspectArgs) -> anyhow::Result<()> {
    let skeleton = Skeleton::load(&args.skeleton)
        .with_context(|| format!("loading skeleton {}", args.skeleton.display()))?;
    let log = JsonlEventLog::open_read_only(&args.event_log)
        .await
        .with_context(|| format!("opening event log {}", args.event_log.display()))?;

    let inspection = Inspection::collect(&skeleton, &log).await?;
    match args.format {
        OutputFormat::Text => print!("{}", inspection.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&inspection)?),
    }
    Ok(())
}
