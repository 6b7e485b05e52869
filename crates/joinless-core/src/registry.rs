//! Instance registry: every loaded instance, grouped by feature type.
//!
//! Instances are addressed internally by a dense `u32` slot (their load
//! position). Slots are what the neighbor graph and star neighborhoods store;
//! the identity key is what callers use to look things up.

use ahash::AHashMap;
use serde::Serialize;

use crate::error::{JoinlessError, Result};
use crate::instance::{InstanceKey, SpatialInstance};

/// All instances of one feature type, in load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureGroup {
    name: String,
    slots: Vec<u32>,
}

impl FeatureGroup {
    fn new(name: String) -> Self {
        Self {
            name,
            slots: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry slots of the member instances.
    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    /// Slot column: slot -> instance
    instances: Vec<SpatialInstance>,
    /// Feature groups in first-seen order
    groups: Vec<FeatureGroup>,
    /// Feature name -> position in `groups`
    group_index: AHashMap<String, usize>,
    /// Identity index: key -> slot
    slots: AHashMap<InstanceKey, u32>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances stored.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Register an instance, returning its slot.
    ///
    /// Rejects a second instance with an identity already present and
    /// coordinates that are not finite. Nothing is modified on error.
    pub fn add_instance(&mut self, instance: SpatialInstance) -> Result<u32> {
        let key = instance.key();
        if self.slots.contains_key(&key) {
            return Err(JoinlessError::DuplicateInstance(key));
        }
        if !instance.x.is_finite() || !instance.y.is_finite() {
            return Err(JoinlessError::InvalidCoordinates {
                key,
                x: instance.x,
                y: instance.y,
            });
        }

        let slot = next_slot(self.instances.len())?;
        let group = match self.group_index.get(&instance.feature) {
            Some(&pos) => pos,
            None => {
                let pos = self.groups.len();
                self.groups.push(FeatureGroup::new(instance.feature.clone()));
                self.group_index.insert(instance.feature.clone(), pos);
                pos
            }
        };
        self.groups[group].slots.push(slot);
        self.slots.insert(key, slot);
        self.instances.push(instance);
        Ok(slot)
    }

    /// All instances in load order; the index is the slot.
    pub fn instances(&self) -> &[SpatialInstance] {
        &self.instances
    }

    pub fn get(&self, slot: u32) -> Option<&SpatialInstance> {
        self.instances.get(slot as usize)
    }

    pub fn slot_of(&self, key: &InstanceKey) -> Option<u32> {
        self.slots.get(key).copied()
    }

    pub fn lookup(&self, key: &InstanceKey) -> Option<&SpatialInstance> {
        self.slot_of(key).and_then(|slot| self.get(slot))
    }

    pub fn feature_groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    pub fn feature_group(&self, feature: &str) -> Option<&FeatureGroup> {
        self.group_index.get(feature).map(|&pos| &self.groups[pos])
    }

    /// Instances of one feature type, in load order. Empty for an unknown feature.
    pub fn feature_instances<'a>(
        &'a self,
        feature: &str,
    ) -> impl Iterator<Item = &'a SpatialInstance> + 'a {
        self.feature_group(feature)
            .map(|g| g.slots.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&slot| self.get(slot))
    }

    /// Total number of instances of `feature` (0 when the feature is unknown).
    pub fn feature_instance_count(&self, feature: &str) -> usize {
        self.feature_group(feature).map(FeatureGroup::len).unwrap_or(0)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(FeatureGroup::name)
    }

    /// Feature -> instance count for every known feature.
    pub fn feature_totals(&self) -> AHashMap<String, usize> {
        self.groups
            .iter()
            .map(|g| (g.name.clone(), g.len()))
            .collect()
    }
}

/// Slot for the instance stored after `len` others.
fn next_slot(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| JoinlessError::RegistryFull { limit: u32::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_keep_load_order() {
        let mut registry = InstanceRegistry::new();
        registry.add_instance(SpatialInstance::new("B", 1, 0.0, 0.0, 0)).unwrap();
        registry.add_instance(SpatialInstance::new("A", 2, 1.0, 0.0, 0)).unwrap();
        registry.add_instance(SpatialInstance::new("A", 1, 2.0, 0.0, 0)).unwrap();

        let names: Vec<&str> = registry.feature_names().collect();
        assert_eq!(names, vec!["B", "A"]);

        let ids: Vec<u64> = registry.feature_instances("A").map(|i| i.instance_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(registry.feature_instance_count("A"), 2);
        assert_eq!(registry.feature_instance_count("Z"), 0);
        assert_eq!(registry.feature_instances("Z").count(), 0);
    }

    #[test]
    fn duplicate_identity_is_rejected_without_overwrite() {
        let mut registry = InstanceRegistry::new();
        registry.add_instance(SpatialInstance::new("A", 1, 0.0, 0.0, 3)).unwrap();

        let err = registry
            .add_instance(SpatialInstance::new("A", 1, 5.0, 5.0, 9))
            .unwrap_err();
        assert!(matches!(err, JoinlessError::DuplicateInstance(ref k) if *k == InstanceKey::new("A", 1)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.feature_instance_count("A"), 1);
        let kept = registry.lookup(&InstanceKey::new("A", 1)).unwrap();
        assert_eq!((kept.x, kept.checkin), (0.0, 3));
    }

    #[test]
    fn same_id_under_other_feature_is_distinct() {
        let mut registry = InstanceRegistry::new();
        registry.add_instance(SpatialInstance::new("A", 1, 0.0, 0.0, 0)).unwrap();
        registry.add_instance(SpatialInstance::new("B", 1, 0.0, 0.0, 0)).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let mut registry = InstanceRegistry::new();
        let err = registry
            .add_instance(SpatialInstance::new("A", 1, f64::NAN, 0.0, 0))
            .unwrap_err();
        assert!(matches!(err, JoinlessError::InvalidCoordinates { .. }));
        assert!(registry.is_empty());
        assert!(registry.feature_group("A").is_none());
    }

    #[test]
    fn slots_stop_at_u32_range() {
        assert_eq!(next_slot(0).unwrap(), 0);
        assert_eq!(next_slot(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn slot_past_u32_range_is_an_error() {
        let err = next_slot(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, JoinlessError::RegistryFull { limit: u32::MAX }));
    }

    #[test]
    fn totals_cover_every_feature() {
        let mut registry = InstanceRegistry::new();
        for (f, id) in [("A", 1), ("A", 2), ("B", 1)] {
            registry.add_instance(SpatialInstance::new(f, id, 0.0, id as f64, 0)).unwrap();
        }
        let totals = registry.feature_totals();
        assert_eq!(totals.get("A"), Some(&2));
        assert_eq!(totals.get("B"), Some(&1));
        assert_eq!(totals.len(), 2);
    }
}
