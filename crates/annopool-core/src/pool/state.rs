//! Pool state: `category -> object_id -> grasp_id -> annotated`.
//!
//! Invariants (kept by every mutating method, callers never cascade by hand):
//! - keys only disappear; flags only flip false -> true
//! - no object without grasps, no category without objects
//! - cached `annotated` counters equal the number of `true` flags below them

use std::collections::BTreeMap;

use crate::domain::{GraspId, LogRecord, UnitId};

use super::Skeleton;

/// Annotated flags of one object's remaining grasps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPool {
    grasps: BTreeMap<GraspId, bool>,
    annotated: usize,
}

impl ObjectPool {
    /// Number of annotated grasps in this object.
    pub fn load(&self) -> usize {
        self.annotated
    }

    pub fn len(&self) -> usize {
        self.grasps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grasps.is_empty()
    }

    pub fn grasps(&self) -> impl Iterator<Item = (GraspId, bool)> + '_ {
        self.grasps.iter().map(|(id, annotated)| (*id, *annotated))
    }

    pub fn unannotated(&self) -> impl Iterator<Item = GraspId> + '_ {
        self.grasps
            .iter()
            .filter(|(_, annotated)| !**annotated)
            .map(|(id, _)| *id)
    }
}

/// Objects of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPool {
    objects: BTreeMap<String, ObjectPool>,
    annotated: usize,
}

impl CategoryPool {
    /// Number of annotated units in this category.
    pub fn load(&self) -> usize {
        self.annotated
    }

    pub fn objects(&self) -> impl Iterator<Item = (&str, &ObjectPool)> {
        self.objects.iter().map(|(id, object)| (id.as_str(), object))
    }

    pub fn object(&self, object_id: &str) -> Option<&ObjectPool> {
        self.objects.get(object_id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn unit_count(&self) -> usize {
        self.objects.values().map(ObjectPool::len).sum()
    }
}

/// Result of flagging a unit annotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    AlreadyAnnotated,
    Missing,
}

/// The live pool.
///
/// Ordered maps keep iteration (and therefore seeded sampling) deterministic,
/// and make two folds of the same log comparable with `==`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolState {
    categories: BTreeMap<String, CategoryPool>,
}

impl PoolState {
    /// Every skeleton unit, none annotated.
    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        let categories = skeleton
            .tree()
            .iter()
            .map(|(category, objects)| {
                let objects = objects
                    .iter()
                    .map(|(object_id, grasps)| {
                        let object = ObjectPool {
                            grasps: grasps.iter().map(|id| (*id, false)).collect(),
                            annotated: 0,
                        };
                        (object_id.clone(), object)
                    })
                    .collect();
                (
                    category.clone(),
                    CategoryPool {
                        objects,
                        annotated: 0,
                    },
                )
            })
            .collect();
        Self { categories }
    }

    /// Fold one log record into the state. Returns whether anything changed.
    ///
    /// Records naming units or objects that no longer exist are no-ops, which
    /// keeps replay idempotent.
    pub fn apply(&mut self, record: &LogRecord) -> bool {
        match record {
            LogRecord::Annotated {
                category,
                object_id,
                grasp_id,
                ..
            } => {
                let unit = UnitId::new(category.as_str(), object_id.as_str(), *grasp_id);
                self.mark_annotated(&unit) == MarkOutcome::Marked
            }
            LogRecord::ObjectRemoved {
                category, object_id, ..
            } => self.remove_object(category, object_id).is_some(),
            LogRecord::GraspRemoved {
                category,
                object_id,
                grasp_id,
                ..
            } => {
                let unit = UnitId::new(category.as_str(), object_id.as_str(), *grasp_id);
                self.remove_grasp(&unit)
            }
        }
    }

    pub fn mark_annotated(&mut self, unit: &UnitId) -> MarkOutcome {
        let Some(category) = self.categories.get_mut(&unit.category) else {
            return MarkOutcome::Missing;
        };
        let Some(object) = category.objects.get_mut(&unit.object_id) else {
            return MarkOutcome::Missing;
        };
        let Some(flag) = object.grasps.get_mut(&unit.grasp_id) else {
            return MarkOutcome::Missing;
        };
        if *flag {
            return MarkOutcome::AlreadyAnnotated;
        }
        *flag = true;
        object.annotated += 1;
        category.annotated += 1;
        MarkOutcome::Marked
    }

    /// Remove one grasp, then its object and category if they became empty.
    pub fn remove_grasp(&mut self, unit: &UnitId) -> bool {
        let Some(category) = self.categories.get_mut(&unit.category) else {
            return false;
        };
        let Some(object) = category.objects.get_mut(&unit.object_id) else {
            return false;
        };
        let Some(was_annotated) = object.grasps.remove(&unit.grasp_id) else {
            return false;
        };
        if was_annotated {
            object.annotated -= 1;
            category.annotated -= 1;
        }
        if object.grasps.is_empty() {
            category.objects.remove(&unit.object_id);
        }
        if category.objects.is_empty() {
            self.categories.remove(&unit.category);
        }
        true
    }

    /// Remove a whole object (annotated grasps included), then its category
    /// if it became empty. Returns how many units were dropped.
    pub fn remove_object(&mut self, category_name: &str, object_id: &str) -> Option<usize> {
        let category = self.categories.get_mut(category_name)?;
        let object = category.objects.remove(object_id)?;
        category.annotated -= object.annotated;
        if category.objects.is_empty() {
            self.categories.remove(category_name);
        }
        Some(object.len())
    }

    /// Annotated units in `category`, `None` once the category is gone.
    pub fn get_load(&self, category: &str) -> Option<usize> {
        self.categories.get(category).map(CategoryPool::load)
    }

    pub fn object_load(&self, category: &str, object_id: &str) -> Option<usize> {
        self.categories
            .get(category)
            .and_then(|c| c.objects.get(object_id))
            .map(ObjectPool::load)
    }

    /// `None` if the unit is not in the pool (removed or never existed).
    pub fn is_annotated(&self, unit: &UnitId) -> Option<bool> {
        self.categories
            .get(&unit.category)
            .and_then(|c| c.objects.get(&unit.object_id))
            .and_then(|o| o.grasps.get(&unit.grasp_id))
            .copied()
    }

    pub fn contains(&self, unit: &UnitId) -> bool {
        self.is_annotated(unit).is_some()
    }

    pub fn contains_object(&self, category: &str, object_id: &str) -> bool {
        self.categories
            .get(category)
            .is_some_and(|c| c.objects.contains_key(object_id))
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category(&self, name: &str) -> Option<&CategoryPool> {
        self.categories.get(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &CategoryPool)> {
        self.categories.iter().map(|(name, c)| (name.as_str(), c))
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn unit_count(&self) -> usize {
        self.categories.values().map(CategoryPool::unit_count).sum()
    }

    pub fn annotated_count(&self) -> usize {
        self.categories.values().map(CategoryPool::load).sum()
    }

    /// Every remaining unit with its annotated flag, in key order.
    pub fn units(&self) -> impl Iterator<Item = (UnitId, bool)> + '_ {
        self.categories.iter().flat_map(|(category, c)| {
            c.objects.iter().flat_map(move |(object_id, o)| {
                o.grasps.iter().map(move |(grasp_id, annotated)| {
                    (UnitId::new(category.as_str(), object_id.as_str(), *grasp_id), *annotated)
                })
            })
        })
    }

    /// Verify the structural invariants. Used by tests and `inspect`.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (category, c) in &self.categories {
            if c.objects.is_empty() {
                return Err(format!("category {category} has no objects"));
            }
            let mut category_annotated = 0;
            for (object_id, o) in &c.objects {
                if o.grasps.is_empty() {
                    return Err(format!("object {category}/{object_id} has no grasps"));
                }
                let annotated = o.grasps.values().filter(|a| **a).count();
                if annotated != o.annotated {
                    return Err(format!(
                        "object {category}/{object_id} caches load {} but has {annotated} annotated",
                        o.annotated
                    ));
                }
                category_annotated += annotated;
            }
            if category_annotated != c.annotated {
                return Err(format!(
                    "category {category} caches load {} but has {category_annotated} annotated",
                    c.annotated
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(json: &str) -> PoolState {
        PoolState::from_skeleton(&Skeleton::from_json_str(json).unwrap())
    }

    #[test]
    fn starts_unannotated() {
        let state = pool(r#"{"A": {"x": [0, 1]}, "B": {"y": [0]}}"#);
        assert_eq!(state.unit_count(), 3);
        assert_eq!(state.annotated_count(), 0);
        assert_eq!(state.get_load("A"), Some(0));
        assert_eq!(state.is_annotated(&UnitId::new("B", "y", 0)), Some(false));
        state.check_invariants().unwrap();
    }

    #[test]
    fn mark_annotated_updates_loads_once() {
        let mut state = pool(r#"{"A": {"x": [0, 1], "z": [5]}}"#);
        let unit = UnitId::new("A", "x", 1);

        assert_eq!(state.mark_annotated(&unit), MarkOutcome::Marked);
        assert_eq!(state.mark_annotated(&unit), MarkOutcome::AlreadyAnnotated);
        assert_eq!(state.mark_annotated(&UnitId::new("A", "x", 9)), MarkOutcome::Missing);

        assert_eq!(state.get_load("A"), Some(1));
        assert_eq!(state.object_load("A", "x"), Some(1));
        assert_eq!(state.object_load("A", "z"), Some(0));
        state.check_invariants().unwrap();
    }

    #[test]
    fn removing_last_grasp_cascades_to_category() {
        let mut state = pool(r#"{"A": {"x": [0, 1]}, "B": {"y": [0]}}"#);

        assert!(state.remove_grasp(&UnitId::new("A", "x", 1)));
        assert!(state.contains_object("A", "x"));

        assert!(state.remove_grasp(&UnitId::new("A", "x", 0)));
        assert!(!state.contains_object("A", "x"));
        assert_eq!(state.get_load("A"), None);
        assert_eq!(state.category_count(), 1);

        assert!(!state.remove_grasp(&UnitId::new("A", "x", 0)));
        state.check_invariants().unwrap();
    }

    #[test]
    fn removing_annotated_grasp_lowers_load() {
        let mut state = pool(r#"{"A": {"x": [0, 1]}}"#);
        let unit = UnitId::new("A", "x", 0);
        state.mark_annotated(&unit);
        assert_eq!(state.get_load("A"), Some(1));

        state.remove_grasp(&unit);
        assert_eq!(state.get_load("A"), Some(0));
        state.check_invariants().unwrap();
    }

    #[test]
    fn remove_object_discards_annotations() {
        let mut state = pool(r#"{"A": {"x": [0, 1], "w": [3]}, "B": {"y": [0]}}"#);
        state.mark_annotated(&UnitId::new("A", "x", 0));
        state.mark_annotated(&UnitId::new("A", "w", 3));

        assert_eq!(state.remove_object("A", "x"), Some(2));
        assert_eq!(state.get_load("A"), Some(1));
        assert_eq!(state.remove_object("A", "x"), None);

        assert_eq!(state.remove_object("B", "y"), Some(1));
        assert!(state.category("B").is_none());
        state.check_invariants().unwrap();
    }

    #[test]
    fn apply_is_idempotent() {
        let mut state = pool(r#"{"A": {"x": [0, 1]}}"#);
        let annotate = LogRecord::annotated(&UnitId::new("A", "x", 0), "u", serde_json::Value::Null);
        let remove = LogRecord::grasp_removed(&UnitId::new("A", "x", 1), "u");

        assert!(state.apply(&annotate));
        assert!(state.apply(&remove));
        let once = state.clone();

        assert!(!state.apply(&annotate));
        assert!(!state.apply(&remove));
        assert_eq!(state, once);
    }

    #[test]
    fn annotation_after_removal_is_a_no_op() {
        let mut state = pool(r#"{"A": {"x": [0, 1]}}"#);
        assert!(state.apply(&LogRecord::object_removed("A", "x", "u")));
        assert!(!state.apply(&LogRecord::annotated(
            &UnitId::new("A", "x", 0),
            "u",
            serde_json::Value::Null
        )));
        assert!(state.is_empty());
    }

    #[test]
    fn units_lists_remaining_flags() {
        let mut state = pool(r#"{"A": {"x": [0, 1]}}"#);
        state.mark_annotated(&UnitId::new("A", "x", 1));
        let units: Vec<_> = state.units().collect();
        assert_eq!(
            units,
            vec![(UnitId::new("A", "x", 0), false), (UnitId::new("A", "x", 1), true)]
        );
    }
}
