use std::collections::BTreeSet;
use std::sync::Arc;

use annopool_core::app::fold;
use annopool_core::impls::{InMemoryEventLog, JsonlEventLog};
use annopool_core::ports::EventLog;
use annopool_core::{
    Assignment, CoordinatorBuilder, PoolError, Skeleton, Submission, UnitId, WorkCoordinator,
};
use serde_json::json;

async fn build(json: &str, log: Arc<dyn EventLog>, seed: u64) -> WorkCoordinator {
    let skeleton = Skeleton::from_json_str(json).unwrap();
    let (coordinator, _) = CoordinatorBuilder::new(skeleton, log)
        .seed(seed)
        .build()
        .await
        .unwrap();
    coordinator
}

async fn annotate(c: &WorkCoordinator, unit: &UnitId) {
    c.submit(Submission::new(unit.clone(), "tester", json!({"grasp_label": "good"})))
        .await
        .unwrap();
}

/// `n` categories with `objects` objects of `grasps` grasps each.
fn grid(n: usize, objects: usize, grasps: u32) -> String {
    let mut root = serde_json::Map::new();
    for c in 0..n {
        let mut category = serde_json::Map::new();
        for o in 0..objects {
            category.insert(format!("obj-{o}"), json!((0..grasps).collect::<Vec<_>>()));
        }
        root.insert(format!("cat-{c}"), serde_json::Value::Object(category));
    }
    serde_json::Value::Object(root).to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assigns_never_hand_out_the_same_unit() {
    let c = build(&grid(4, 3, 5), Arc::new(InMemoryEventLog::new()), 11).await;
    let total = 4 * 3 * 5;

    let mut handles = Vec::new();
    for _ in 0..total {
        let c = c.clone();
        handles.push(tokio::spawn(async move { c.assign().await }));
    }
    let mut units = BTreeSet::new();
    for handle in handles {
        let unit = handle.await.unwrap().unwrap().into_unit().unwrap();
        assert!(units.insert(unit.clone()), "{unit} assigned twice");
    }

    assert_eq!(units.len(), total);
    assert_eq!(c.assign().await.unwrap(), Assignment::Exhausted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_and_assigns_never_hand_out_annotated_units() {
    let c = build(&grid(2, 2, 4), Arc::new(InMemoryEventLog::new()), 5).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let c = c.clone();
        handles.push(tokio::spawn(async move {
            let mut done = Vec::new();
            while let Some(unit) = c.assign().await.unwrap().into_unit() {
                annotate(&c, &unit).await;
                done.push(unit);
            }
            done
        }));
    }
    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }

    let distinct: BTreeSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), 16);
    assert_eq!(distinct.len(), 16);
    assert_eq!(c.stats().await.annotated, 16);
}

#[tokio::test]
async fn equal_categories_stay_within_one_of_each_other() {
    let c = build(&grid(2, 2, 5), Arc::new(InMemoryEventLog::new()), 3).await;

    for _ in 0..9 {
        let unit = c.assign().await.unwrap().into_unit().unwrap();
        annotate(&c, &unit).await;

        let stats = c.stats().await;
        let a = stats.per_category["cat-0"].annotated;
        let b = stats.per_category["cat-1"].annotated;
        assert!(a.abs_diff(b) <= 1, "loads drifted apart: {a} vs {b}");
    }
}

#[tokio::test]
async fn assign_moves_to_the_less_loaded_category_until_exhausted() {
    let c = build(r#"{"A": {"x": [0, 1]}, "B": {"y": [0]}}"#, Arc::new(InMemoryEventLog::new()), 8).await;

    let mut cycles = 0;
    loop {
        let before = c.stats().await;
        let Some(unit) = c.assign().await.unwrap().into_unit() else {
            break;
        };
        let min_load = before
            .per_category
            .values()
            .filter(|counts| counts.assignable > 0)
            .map(|counts| counts.annotated)
            .min()
            .unwrap();
        assert_eq!(before.per_category[&unit.category].annotated, min_load);
        annotate(&c, &unit).await;
        cycles += 1;
    }

    assert_eq!(cycles, 3);
    assert_eq!(c.stats().await.annotated, 3);
    assert!(c.assign().await.unwrap().is_exhausted());
}

#[tokio::test]
async fn less_loaded_category_wins_after_a_submission() {
    let c = build(r#"{"A": {"x": [0, 1]}, "B": {"y": [0]}}"#, Arc::new(InMemoryEventLog::new()), 8).await;

    // (A,x,0) is submitted without being assigned first, so no unit is held
    // back by a reservation and the order below does not depend on the seed.
    annotate(&c, &UnitId::new("A", "x", 0)).await;

    let next = c.assign().await.unwrap().into_unit().unwrap();
    assert_eq!(next, UnitId::new("B", "y", 0));
    annotate(&c, &next).await;

    let next = c.assign().await.unwrap().into_unit().unwrap();
    assert_eq!(next, UnitId::new("A", "x", 1));
    annotate(&c, &next).await;

    assert!(c.assign().await.unwrap().is_exhausted());
}

#[tokio::test]
async fn reserved_units_are_skipped_until_submitted() {
    let c = build(r#"{"A": {"x": [0, 1]}, "B": {"y": [0]}}"#, Arc::new(InMemoryEventLog::new()), 8).await;
    annotate(&c, &UnitId::new("A", "x", 0)).await;

    // Assigned but not yet submitted: both stay reserved.
    let b = c.assign().await.unwrap().into_unit().unwrap();
    let a = c.assign().await.unwrap().into_unit().unwrap();
    assert_eq!(b, UnitId::new("B", "y", 0));
    assert_eq!(a, UnitId::new("A", "x", 1));
    assert!(c.assign().await.unwrap().is_exhausted());
    assert_eq!(c.stats().await.reserved, 2);

    annotate(&c, &b).await;
    annotate(&c, &a).await;
    let stats = c.stats().await;
    assert_eq!((stats.annotated, stats.reserved, stats.assignable), (3, 0, 0));
    assert!(c.assign().await.unwrap().is_exhausted());
}

#[tokio::test]
async fn invalid_grasp_is_never_assigned_and_last_removal_drops_category() {
    let c = build(r#"{"A": {"x": [0, 1]}, "B": {"y": [0]}}"#, Arc::new(InMemoryEventLog::new()), 21).await;

    c.report_invalid("A", "x", 1, "tester").await.unwrap();
    let mut assigned = Vec::new();
    while let Some(unit) = c.assign().await.unwrap().into_unit() {
        assigned.push(unit);
    }
    assert!(!assigned.contains(&UnitId::new("A", "x", 1)));
    assert_eq!(assigned.len(), 2);

    c.report_invalid("A", "x", 0, "tester").await.unwrap();
    let stats = c.stats().await;
    assert!(!stats.per_category.contains_key("A"));
    assert_eq!(stats.categories, 1);
}

#[tokio::test]
async fn restart_rebuilds_the_same_pool_from_the_file_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let json = grid(3, 2, 3);

    let before = {
        let log = Arc::new(JsonlEventLog::open(&path).await.unwrap());
        let c = build(&json, log, 17).await;
        for _ in 0..6 {
            let unit = c.assign().await.unwrap().into_unit().unwrap();
            annotate(&c, &unit).await;
        }
        c.report_malformed("cat-1", "obj-0", "tester").await.unwrap();
        c.report_invalid("cat-2", "obj-1", 2, "tester").await.unwrap();
        // Resubmission after removal: logged, no effect.
        annotate(&c, &UnitId::new("cat-1", "obj-0", 0)).await;
        c.shutdown().await.unwrap();
        c.snapshot().await
    };

    let log = Arc::new(JsonlEventLog::open(&path).await.unwrap());
    let replay = log.replay().await.unwrap();
    assert!(replay.corrupt.is_empty());
    assert_eq!(replay.entries.len(), 9);

    let skeleton = Skeleton::from_json_str(&json).unwrap();
    let folded = fold(&skeleton, replay.entries.iter().map(|e| &e.record));
    assert_eq!(folded, before);

    let after = build(&json, log, 99).await.snapshot().await;
    assert_eq!(after, before);
    after.check_invariants().unwrap();
}

#[tokio::test]
async fn pool_only_shrinks() {
    let json = grid(2, 3, 3);
    let skeleton = Skeleton::from_json_str(&json).unwrap();
    let c = build(&json, Arc::new(InMemoryEventLog::new()), 4).await;

    c.report_malformed("cat-0", "obj-1", "tester").await.unwrap();
    c.report_invalid("cat-1", "obj-2", 0, "tester").await.unwrap();
    while let Some(unit) = c.assign().await.unwrap().into_unit() {
        assert_ne!((unit.category.as_str(), unit.object_id.as_str()), ("cat-0", "obj-1"));
        assert_ne!(unit, UnitId::new("cat-1", "obj-2", 0));
        annotate(&c, &unit).await;
    }

    let snapshot = c.snapshot().await;
    for (unit, _) in snapshot.units() {
        assert!(skeleton.contains(&unit));
    }
    assert_eq!(snapshot.unit_count(), skeleton.unit_count() - 4);
    assert!(!snapshot.contains_object("cat-0", "obj-1"));
    snapshot.check_invariants().unwrap();
}

#[tokio::test]
async fn failed_append_surfaces_log_write_and_keeps_the_removal() {
    let log = Arc::new(InMemoryEventLog::new());
    let c = build(r#"{"A": {"x": [0]}, "B": {"y": [0]}}"#, log.clone(), 1).await;

    log.fail_next_appends(1);
    let err = c.report_malformed("A", "x", "tester").await.unwrap_err();
    assert!(matches!(err, PoolError::LogWrite(_)));
    assert!(!c.snapshot().await.contains_object("A", "x"));

    // The lost record is simply absent after a restart.
    let rebuilt = build(r#"{"A": {"x": [0]}, "B": {"y": [0]}}"#, log, 1).await;
    assert!(rebuilt.snapshot().await.contains_object("A", "x"));
}
