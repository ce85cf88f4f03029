//! Two-level least-loaded selection.
//!
//! 1. category with the fewest annotated units (random among ties)
//! 2. object in that category with the fewest annotated units (random among ties)
//! 3. uniformly random unannotated, unreserved grasp in that object
//!
//! Only categories and objects that still hold an assignable unit take part,
//! so `None` means nothing is assignable anywhere.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;

use super::{LeaseTable, ObjectPool, PoolState};
use crate::domain::{GraspId, UnitId};

/// Units in `object` that are neither annotated nor reserved.
fn assignable_in(object: &ObjectPool, reserved: usize) -> usize {
    object.len().saturating_sub(object.load()).saturating_sub(reserved)
}

fn pick_least_loaded<T: Copy, R: Rng + ?Sized>(candidates: &[(T, usize)], rng: &mut R) -> Option<T> {
    let min = candidates.iter().map(|(_, load)| *load).min()?;
    let tied: Vec<T> = candidates
        .iter()
        .filter(|(_, load)| *load == min)
        .map(|(candidate, _)| *candidate)
        .collect();
    tied.choose(rng).copied()
}

pub fn select_unit<R: Rng + ?Sized>(
    state: &PoolState,
    leases: &LeaseTable,
    exclude: &BTreeSet<String>,
    rng: &mut R,
) -> Option<UnitId> {
    let categories: Vec<(&str, usize)> = state
        .categories()
        .filter(|(name, _)| !exclude.contains(*name))
        .filter(|(name, category)| {
            category
                .objects()
                .any(|(object_id, object)| assignable_in(object, leases.count_in_object(name, object_id)) > 0)
        })
        .map(|(name, category)| (name, category.load()))
        .collect();
    let category_name = pick_least_loaded(&categories, rng)?;
    let category = state.category(category_name)?;

    let objects: Vec<(&str, usize)> = category
        .objects()
        .filter(|(object_id, object)| {
            assignable_in(object, leases.count_in_object(category_name, object_id)) > 0
        })
        .map(|(object_id, object)| (object_id, object.load()))
        .collect();
    let object_id = pick_least_loaded(&objects, rng)?;
    let object = category.object(object_id)?;

    let grasps: Vec<GraspId> = object
        .unannotated()
        .filter(|grasp_id| !leases.is_reserved(category_name, object_id, *grasp_id))
        .collect();
    let grasp_id = grasps.choose(rng).copied()?;

    Some(UnitId::new(category_name, object_id, grasp_id))
}
