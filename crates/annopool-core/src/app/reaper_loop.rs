//! ReaperLoop - release leases that ran past their TTL.
//!
//! Assign already reaps lazily; this loop keeps `stats` and `unit_state`
//! honest when no one is asking for work.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::coordinator::WorkCoordinator;

pub struct ReaperLoop {
    coordinator: WorkCoordinator,
    interval: Duration,
}

impl ReaperLoop {
    pub fn new(coordinator: WorkCoordinator, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Runs until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "lease reaper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let released = self.coordinator.reap_expired_leases().await;
                    if released > 0 {
                        tracing::info!(released, "reaped expired leases");
                    }
                }
            }
        }

        tracing::debug!("lease reaper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::CoordinatorBuilder;
    use crate::domain::UnitState;
    use crate::impls::InMemoryEventLog;
    use crate::pool::Skeleton;
    use crate::ports::FixedClock;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn reaps_in_background_and_stops_on_cancel() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let skeleton = Skeleton::from_json_str(r#"{"A": {"x": [0]}}"#).unwrap();
        let (c, _) = CoordinatorBuilder::new(skeleton, Arc::new(InMemoryEventLog::new()))
            .clock(clock.clone())
            .lease_ttl(chrono::Duration::seconds(10))
            .build()
            .await
            .unwrap();

        let unit = c.assign().await.unwrap().into_unit().unwrap();
        assert_eq!(c.stats().await.reserved, 1);
        clock.advance(chrono::Duration::seconds(11));

        let cancel = CancellationToken::new();
        let handle = ReaperLoop::new(c.clone(), Duration::from_millis(5)).spawn(cancel.clone());

        let mut reserved = 1;
        for _ in 0..100 {
            reserved = c.stats().await.reserved;
            if reserved == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(reserved, 0);
        assert_eq!(c.unit_state(&unit).await.unwrap(), UnitState::Available);

        cancel.cancel();
        handle.await.unwrap();
    }
}
