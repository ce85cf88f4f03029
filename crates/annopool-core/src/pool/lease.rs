//! Reservations on assigned units.
//!
//! An assigned unit is held out of sampling until it is submitted, removed,
//! or (when a TTL is configured) its lease expires. Leases live only in
//! memory and are never logged: after a restart every unannotated unit is
//! assignable again.
//!
//! Invariant: every leased unit is present in the pool and unannotated. The
//! coordinator releases leases on submit and on removal to keep it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};

use crate::domain::{GraspId, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub granted_at: DateTime<Utc>,
    /// `None` means the reservation never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Lease {
    pub fn new(granted_at: DateTime<Utc>, ttl: Option<chrono::Duration>) -> Self {
        Self {
            granted_at,
            expires_at: ttl.map(|ttl| granted_at + ttl),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// `category -> object_id -> grasp_id -> lease`, with no empty branches.
#[derive(Debug, Default)]
pub struct LeaseTable {
    leases: HashMap<String, HashMap<String, HashMap<GraspId, Lease>>>,
    len: usize,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `unit`. An existing lease on the same unit is replaced.
    pub fn reserve(&mut self, unit: &UnitId, lease: Lease) {
        let previous = self
            .leases
            .entry(unit.category.clone())
            .or_default()
            .entry(unit.object_id.clone())
            .or_default()
            .insert(unit.grasp_id, lease);
        if previous.is_none() {
            self.len += 1;
        }
    }

    pub fn is_reserved(&self, category: &str, object_id: &str, grasp_id: GraspId) -> bool {
        self.leases
            .get(category)
            .and_then(|objects| objects.get(object_id))
            .is_some_and(|grasps| grasps.contains_key(&grasp_id))
    }

    pub fn get(&self, unit: &UnitId) -> Option<&Lease> {
        self.leases
            .get(&unit.category)
            .and_then(|objects| objects.get(&unit.object_id))
            .and_then(|grasps| grasps.get(&unit.grasp_id))
    }

    /// Drop the lease on `unit`, if any.
    pub fn release(&mut self, unit: &UnitId) -> bool {
        let Entry::Occupied(mut objects) = self.leases.entry(unit.category.clone()) else {
            return false;
        };
        let Entry::Occupied(mut grasps) = objects.get_mut().entry(unit.object_id.clone()) else {
            return false;
        };
        let released = grasps.get_mut().remove(&unit.grasp_id).is_some();
        if grasps.get().is_empty() {
            grasps.remove_entry();
        }
        if objects.get().is_empty() {
            objects.remove_entry();
        }
        if released {
            self.len -= 1;
        }
        released
    }

    /// Drop every lease inside one object. Returns how many were dropped.
    pub fn release_object(&mut self, category: &str, object_id: &str) -> usize {
        let Some(objects) = self.leases.get_mut(category) else {
            return 0;
        };
        let released = objects.remove(object_id).map_or(0, |grasps| grasps.len());
        if objects.is_empty() {
            self.leases.remove(category);
        }
        self.len -= released;
        released
    }

    /// Remove and return every lease expired at `now`, sorted.
    pub fn reap_expired(&mut self, now: DateTime<Utc>) -> Vec<UnitId> {
        let mut reaped = Vec::new();
        self.leases.retain(|category, objects| {
            objects.retain(|object_id, grasps| {
                grasps.retain(|grasp_id, lease| {
                    let expired = lease.is_expired(now);
                    if expired {
                        reaped.push(UnitId::new(category.as_str(), object_id.as_str(), *grasp_id));
                    }
                    !expired
                });
                !grasps.is_empty()
            });
            !objects.is_empty()
        });
        self.len -= reaped.len();
        reaped.sort();
        reaped
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count_in(&self, category: &str) -> usize {
        self.leases
            .get(category)
            .map_or(0, |objects| objects.values().map(HashMap::len).sum())
    }

    pub fn count_in_object(&self, category: &str, object_id: &str) -> usize {
        self.leases
            .get(category)
            .and_then(|objects| objects.get(object_id))
            .map_or(0, HashMap::len)
    }
}
