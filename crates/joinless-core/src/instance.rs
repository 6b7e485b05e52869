//! Spatial instances and their identity key.
//!
//! An instance is identified by `(feature, instance_id)` alone. Coordinates and
//! the check-in weight ride along but never take part in equality, ordering or
//! hashing, so two independently constructed instances with the same identity
//! are interchangeable as set members and map keys.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a spatial instance: feature type plus an id unique within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub feature: String,
    pub instance_id: u64,
}

impl InstanceKey {
    pub fn new(feature: impl Into<String>, instance_id: u64) -> Self {
        Self {
            feature: feature.into(),
            instance_id,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.feature, self.instance_id)
    }
}

/// One geo-tagged occurrence of a feature type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialInstance {
    pub feature: String,
    pub instance_id: u64,
    pub x: f64,
    pub y: f64,
    /// Popularity weight (check-in count).
    pub checkin: u64,
}

impl SpatialInstance {
    pub fn new(feature: impl Into<String>, instance_id: u64, x: f64, y: f64, checkin: u64) -> Self {
        Self {
            feature: feature.into(),
            instance_id,
            x,
            y,
            checkin,
        }
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.feature.clone(), self.instance_id)
    }

    pub fn has_key(&self, key: &InstanceKey) -> bool {
        self.instance_id == key.instance_id && self.feature == key.feature
    }

    /// Euclidean distance between the two locations. Finite for any two
    /// finite locations whose true distance fits in an `f64`.
    pub fn distance_to(&self, other: &SpatialInstance) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn identity(&self) -> (&str, u64) {
        (self.feature.as_str(), self.instance_id)
    }
}

impl PartialEq for SpatialInstance {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for SpatialInstance {}

impl Hash for SpatialInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for SpatialInstance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SpatialInstance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}
