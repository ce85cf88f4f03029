//! CoordinatorBuilder - recover the pool and wire the coordinator.
//!
//! Startup is fail-fast: a log that cannot be read stops the build. Corrupt
//! lines do not; they come back in the [`RecoveryReport`].

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::coordinator::WorkCoordinator;
use super::log_writer::LogWriter;
use super::recovery::{RecoveryReport, recover};
use crate::error::PoolError;
use crate::pool::Skeleton;
use crate::ports::{Clock, EventLog, SystemClock};

/// Tuning for the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Fixed RNG seed for reproducible assignment. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Reservations expire after this long. `None` keeps them until submit
    /// or removal.
    pub lease_ttl: Option<chrono::Duration>,
}

/// # Example
/// ```ignore
/// let (coordinator, report) = CoordinatorBuilder::new(skeleton, log)
///     .seed(42)
///     .lease_ttl(chrono::Duration::minutes(30))
///     .build()
///     .await?;
/// ```
pub struct CoordinatorBuilder {
    skeleton: Skeleton,
    log: Arc<dyn EventLog>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
}

impl CoordinatorBuilder {
    pub fn new(skeleton: Skeleton, log: Arc<dyn EventLog>) -> Self {
        Self {
            skeleton,
            log,
            clock: Arc::new(SystemClock),
            config: CoordinatorConfig::default(),
        }
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn lease_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.config.lease_ttl = Some(ttl);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replay the log, then spawn the log writer. Must run inside a tokio
    /// runtime.
    pub async fn build(self) -> Result<(WorkCoordinator, RecoveryReport), PoolError> {
        let recovery = recover(&self.skeleton, self.log.as_ref())
            .await
            .map_err(PoolError::LogReplay)?;

        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let writer = LogWriter::spawn(Arc::clone(&self.log));
        let coordinator = WorkCoordinator::new(
            recovery.state,
            Arc::new(self.skeleton),
            writer,
            self.clock,
            rng,
            self.config.lease_ttl,
        );
        Ok((coordinator, recovery.report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogEntry, LogRecord, UnitId, UnitState};
    use crate::impls::InMemoryEventLog;

    fn skeleton() -> Skeleton {
        Skeleton::from_json_str(r#"{"A": {"x": [0, 1]}}"#).unwrap()
    }

    #[tokio::test]
    async fn build_recovers_existing_log() {
        let log = Arc::new(InMemoryEventLog::new());
        let unit = UnitId::new("A", "x", 1);
        log.append(&LogEntry::new(
            LogRecord::annotated(&unit, "u", serde_json::Value::Null),
            &SystemClock,
        ))
        .await
        .unwrap();
        log.push_raw_line("garbage").await;

        let (coordinator, report) = CoordinatorBuilder::new(skeleton(), log).build().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.corrupt.len(), 1);
        assert_eq!(coordinator.unit_state(&unit).await.unwrap(), UnitState::Annotated);
    }

    #[tokio::test]
    async fn config_is_applied() {
        let config = CoordinatorConfig {
            seed: Some(3),
            lease_ttl: Some(chrono::Duration::minutes(5)),
        };
        let (coordinator, _) = CoordinatorBuilder::new(skeleton(), Arc::new(InMemoryEventLog::new()))
            .config(config)
            .build()
            .await
            .unwrap();
        assert_eq!(coordinator.lease_ttl(), Some(chrono::Duration::minutes(5)));
    }

    #[tokio::test]
    async fn same_seed_gives_same_assignment_sequence() {
        let json = r#"{"A": {"x": [0, 1, 2], "y": [0, 1]}, "B": {"z": [0, 1, 2, 3]}}"#;
        let mut sequences = Vec::new();
        for _ in 0..2 {
            let skeleton = Skeleton::from_json_str(json).unwrap();
            let (c, _) = CoordinatorBuilder::new(skeleton, Arc::new(InMemoryEventLog::new()))
                .seed(99)
                .build()
                .await
                .unwrap();
            let mut units = Vec::new();
            while let Some(unit) = c.assign().await.unwrap().into_unit() {
                units.push(unit);
            }
            sequences.push(units);
        }
        assert_eq!(sequences[0].len(), 9);
        assert_eq!(sequences[0], sequences[1]);
    }
}
