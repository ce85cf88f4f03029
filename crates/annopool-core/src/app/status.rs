//! Status - read-only views over the pool and the log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{LogEntry, LogRecord};
use crate::pool::{LeaseTable, PoolState};

/// Counts for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub objects: usize,
    pub units: usize,
    pub annotated: usize,
    /// Units currently handed out (leases not yet reaped included).
    pub reserved: usize,
    pub assignable: usize,
}

/// Pool-wide totals plus a per-category breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub categories: usize,
    pub objects: usize,
    pub units: usize,
    pub annotated: usize,
    pub reserved: usize,
    pub assignable: usize,
    pub per_category: BTreeMap<String, CategoryCounts>,
}

impl PoolStats {
    pub fn collect(state: &PoolState, leases: &LeaseTable) -> Self {
        let mut stats = PoolStats::default();
        for (name, category) in state.categories() {
            let units = category.unit_count();
            let annotated = category.load();
            let reserved = leases.count_in(name);
            let counts = CategoryCounts {
                objects: category.object_count(),
                units,
                annotated,
                reserved,
                assignable: units.saturating_sub(annotated).saturating_sub(reserved),
            };
            stats.categories += 1;
            stats.objects += counts.objects;
            stats.units += counts.units;
            stats.annotated += counts.annotated;
            stats.reserved += counts.reserved;
            stats.assignable += counts.assignable;
            stats.per_category.insert(name.to_string(), counts);
        }
        stats
    }

    pub fn is_exhausted(&self) -> bool {
        self.assignable == 0
    }
}

/// What one annotator has recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatorActivity {
    pub annotations: usize,
    pub malformed_reports: usize,
    pub invalid_grasp_reports: usize,
}

impl AnnotatorActivity {
    pub fn total(&self) -> usize {
        self.annotations + self.malformed_reports + self.invalid_grasp_reports
    }
}

/// Per-annotator counts over a replayed log, keyed by annotator id.
pub fn annotator_activity(entries: &[LogEntry]) -> BTreeMap<String, AnnotatorActivity> {
    let mut activity: BTreeMap<String, AnnotatorActivity> = BTreeMap::new();
    for entry in entries {
        let counts = activity
            .entry(entry.record.annotator_id().to_string())
            .or_default();
        match entry.record {
            LogRecord::Annotated { .. } => counts.annotations += 1,
            LogRecord::ObjectRemoved { .. } => counts.malformed_reports += 1,
            LogRecord::GraspRemoved { .. } => counts.invalid_grasp_reports += 1,
        }
    }
    activity
}
