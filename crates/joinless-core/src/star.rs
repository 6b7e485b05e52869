//! Star neighborhoods: for every instance, the set of its neighbors.

use roaring::RoaringBitmap;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::instance::{InstanceKey, SpatialInstance};
use crate::neighbor::{NeighborGraph, Threshold};
use crate::registry::InstanceRegistry;

/// One center instance and the slots of its neighbors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StarNeighborhood {
    center: u32,
    neighbors: RoaringBitmap,
}

impl StarNeighborhood {
    pub fn new(center: u32) -> Self {
        Self {
            center,
            neighbors: RoaringBitmap::new(),
        }
    }

    pub fn center_slot(&self) -> u32 {
        self.center
    }

    /// Add a neighbor slot. Idempotent; the center itself is never added.
    /// Returns whether the star changed.
    pub fn add_neighbor(&mut self, slot: u32) -> bool {
        slot != self.center && self.neighbors.insert(slot)
    }

    pub fn neighbor_slots(&self) -> &RoaringBitmap {
        &self.neighbors
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.neighbors.contains(slot)
    }

    /// Number of neighbors.
    pub fn len(&self) -> usize {
        self.neighbors.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// Every star of one registry, indexed by center slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StarNeighborhoods {
    threshold: Threshold,
    stars: Vec<StarNeighborhood>,
}

impl StarNeighborhoods {
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn get(&self, slot: u32) -> Option<&StarNeighborhood> {
        self.stars.get(slot as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StarNeighborhood> {
        self.stars.iter()
    }

    /// The star centered on `key`, resolved against `registry`.
    pub fn star_of<'a>(
        &'a self,
        registry: &'a InstanceRegistry,
        key: &InstanceKey,
    ) -> Option<StarView<'a>> {
        let slot = registry.slot_of(key)?;
        StarView::new(registry, self.get(slot)?)
    }
}

/// Derive one star per registered instance from `graph`.
///
/// Every instance gets a star, including those without relations. Each
/// relation contributes to both of its endpoints' stars.
pub fn build_star_neighborhoods(
    registry: &InstanceRegistry,
    graph: &NeighborGraph,
) -> StarNeighborhoods {
    let mut stars: Vec<StarNeighborhood> = (0..registry.len() as u32)
        .map(StarNeighborhood::new)
        .collect();

    for &(a, b) in graph.slot_pairs() {
        if let Some(star) = stars.get_mut(a as usize) {
            star.add_neighbor(b);
        }
        if let Some(star) = stars.get_mut(b as usize) {
            star.add_neighbor(a);
        }
    }

    let isolated = stars.iter().filter(|s| s.is_empty()).count();
    tracing::debug!(stars = stars.len(), isolated, "built star neighborhoods");

    StarNeighborhoods {
        threshold: graph.threshold(),
        stars,
    }
}

/// A star with its slots resolved to instances.
#[derive(Debug, Clone, Copy)]
pub struct StarView<'a> {
    registry: &'a InstanceRegistry,
    star: &'a StarNeighborhood,
    center: &'a SpatialInstance,
}

impl<'a> StarView<'a> {
    pub fn new(registry: &'a InstanceRegistry, star: &'a StarNeighborhood) -> Option<Self> {
        let center = registry.get(star.center)?;
        Some(Self {
            registry,
            star,
            center,
        })
    }

    pub fn center(&self) -> &'a SpatialInstance {
        self.center
    }

    pub fn neighbors(&self) -> impl Iterator<Item = &'a SpatialInstance> + 'a {
        let (registry, star) = (self.registry, self.star);
        star.neighbors.iter().filter_map(move |slot| registry.get(slot))
    }

    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.registry
            .slot_of(key)
            .map_or(false, |slot| self.star.contains(slot))
    }

    pub fn len(&self) -> usize {
        self.star.len()
    }

    pub fn is_empty(&self) -> bool {
        self.star.is_empty()
    }

    /// Distinct feature types among the neighbors.
    pub fn feature_types(&self) -> BTreeSet<&'a str> {
        self.neighbors().map(|inst| inst.feature.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_neighbor_is_idempotent_and_irreflexive() {
        let mut star = StarNeighborhood::new(3);
        assert!(star.add_neighbor(1));
        assert!(!star.add_neighbor(1));
        assert!(!star.add_neighbor(3));
        assert_eq!(star.len(), 1);
        assert!(star.contains(1));
        assert!(!star.contains(3));
    }
}
