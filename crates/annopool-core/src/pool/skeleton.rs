//! Skeleton loader: the immutable enumeration of every annotatable unit.
//!
//! The artifact is produced offline (grasp subsampling) and is a JSON object
//! of the shape `{category: {object_id: [grasp_id, ...]}}`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{GraspId, UnitId};

#[derive(Debug, Error)]
pub enum SkeletonError {
    #[error("cannot read skeleton {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("skeleton is not a {{category: {{object_id: [grasp_id]}}}} JSON object: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("negative grasp id {grasp_id} in {category}/{object_id}")]
    NegativeGraspId {
        category: String,
        object_id: String,
        grasp_id: i64,
    },

    #[error("grasp id {grasp_id} in {category}/{object_id} does not fit in u32")]
    GraspIdOutOfRange {
        category: String,
        object_id: String,
        grasp_id: i64,
    },

    #[error("duplicate grasp id {grasp_id} in {category}/{object_id}")]
    DuplicateGraspId {
        category: String,
        object_id: String,
        grasp_id: GraspId,
    },
}

type RawSkeleton = BTreeMap<String, BTreeMap<String, Vec<i64>>>;

/// Read-only map `category -> object_id -> {grasp_id}`.
///
/// Never contains an empty object or an empty category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skeleton {
    categories: BTreeMap<String, BTreeMap<String, BTreeSet<GraspId>>>,
}

impl Skeleton {
    /// Load and validate the artifact at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SkeletonError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SkeletonError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let skeleton = Self::from_json_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            categories = skeleton.category_count(),
            units = skeleton.unit_count(),
            "loaded skeleton"
        );
        Ok(skeleton)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, SkeletonError> {
        let raw: RawSkeleton = serde_json::from_str(contents)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSkeleton) -> Result<Self, SkeletonError> {
        let mut categories = BTreeMap::new();
        for (category, raw_objects) in raw {
            let mut objects = BTreeMap::new();
            for (object_id, raw_grasps) in raw_objects {
                let mut grasps = BTreeSet::new();
                for raw_id in raw_grasps {
                    if raw_id < 0 {
                        return Err(SkeletonError::NegativeGraspId {
                            category,
                            object_id,
                            grasp_id: raw_id,
                        });
                    }
                    let Ok(grasp_id) = GraspId::try_from(raw_id) else {
                        return Err(SkeletonError::GraspIdOutOfRange {
                            category,
                            object_id,
                            grasp_id: raw_id,
                        });
                    };
                    if !grasps.insert(grasp_id) {
                        return Err(SkeletonError::DuplicateGraspId {
                            category,
                            object_id,
                            grasp_id,
                        });
                    }
                }
                if grasps.is_empty() {
                    tracing::warn!(%category, %object_id, "skeleton object has no grasps, skipping");
                    continue;
                }
                objects.insert(object_id, grasps);
            }
            if objects.is_empty() {
                tracing::warn!(%category, "skeleton category has no objects, skipping");
                continue;
            }
            categories.insert(category, objects);
        }
        Ok(Self { categories })
    }

    pub fn contains(&self, unit: &UnitId) -> bool {
        self.categories
            .get(&unit.category)
            .and_then(|objects| objects.get(&unit.object_id))
            .is_some_and(|grasps| grasps.contains(&unit.grasp_id))
    }

    pub fn contains_object(&self, category: &str, object_id: &str) -> bool {
        self.categories
            .get(category)
            .is_some_and(|objects| objects.contains_key(object_id))
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn unit_count(&self) -> usize {
        self.categories
            .values()
            .flat_map(|objects| objects.values())
            .map(BTreeSet::len)
            .sum()
    }

    /// Every unit, in `(category, object_id, grasp_id)` order.
    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.categories.iter().flat_map(|(category, objects)| {
            objects.iter().flat_map(move |(object_id, grasps)| {
                grasps
                    .iter()
                    .map(move |grasp_id| UnitId::new(category.as_str(), object_id.as_str(), *grasp_id))
            })
        })
    }

    /// Units of one category, `None` if the category is unknown.
    pub fn units_in(&self, category: &str) -> Option<Vec<UnitId>> {
        let objects = self.categories.get(category)?;
        Some(
            objects
                .iter()
                .flat_map(|(object_id, grasps)| {
                    grasps
                        .iter()
                        .map(move |grasp_id| UnitId::new(category, object_id.as_str(), *grasp_id))
                })
                .collect(),
        )
    }

    pub(crate) fn tree(&self) -> &BTreeMap<String, BTreeMap<String, BTreeSet<GraspId>>> {
        &self.categories
    }
}
