//! Neighbor graph: every unordered instance pair within a distance threshold.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::error::{JoinlessError, Result};
use crate::grid::UniformGrid;
use crate::instance::{InstanceKey, SpatialInstance};
use crate::options::{BuildOptions, ScanStrategy};
use crate::registry::InstanceRegistry;

// ============================================================================
// Threshold
// ============================================================================

/// A validated distance threshold: finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(JoinlessError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Closed boundary: a distance equal to the threshold is admitted.
    pub fn admits(self, distance: f64) -> bool {
        distance <= self.0
    }
}

impl TryFrom<f64> for Threshold {
    type Error = JoinlessError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> f64 {
        t.0
    }
}

// ============================================================================
// Relations
// ============================================================================

/// An unordered pair of distinct instances and their distance.
///
/// Endpoints are stored in identity order, so `(A, B)` and `(B, A)` build the
/// same value. Equality and hashing look at the endpoints only.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborRelation {
    first: InstanceKey,
    second: InstanceKey,
    distance: f64,
}

impl NeighborRelation {
    /// `None` when both sides are the same instance.
    pub fn between(a: &SpatialInstance, b: &SpatialInstance) -> Option<Self> {
        Self::with_distance(a.key(), b.key(), a.distance_to(b))
    }

    fn with_distance(a: InstanceKey, b: InstanceKey, distance: f64) -> Option<Self> {
        match a.cmp(&b) {
            Ordering::Equal => None,
            Ordering::Less => Some(Self {
                first: a,
                second: b,
                distance,
            }),
            Ordering::Greater => Some(Self {
                first: b,
                second: a,
                distance,
            }),
        }
    }

    pub fn first(&self) -> &InstanceKey {
        &self.first
    }

    pub fn second(&self) -> &InstanceKey {
        &self.second
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn involves(&self, key: &InstanceKey) -> bool {
        self.first == *key || self.second == *key
    }

    /// The endpoint opposite `key`, if `key` is an endpoint.
    pub fn other(&self, key: &InstanceKey) -> Option<&InstanceKey> {
        if self.first == *key {
            Some(&self.second)
        } else if self.second == *key {
            Some(&self.first)
        } else {
            None
        }
    }

    fn endpoints(&self) -> (&InstanceKey, &InstanceKey) {
        (&self.first, &self.second)
    }
}

impl PartialEq for NeighborRelation {
    fn eq(&self, other: &Self) -> bool {
        self.endpoints() == other.endpoints()
    }
}

impl Eq for NeighborRelation {}

impl Hash for NeighborRelation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.endpoints().hash(state);
    }
}

impl PartialOrd for NeighborRelation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NeighborRelation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.endpoints().cmp(&other.endpoints())
    }
}

// ============================================================================
// Graph
// ============================================================================

/// All neighbor relations of one registry at one threshold.
///
/// Relations are kept in canonical order (by endpoints), which makes two
/// builds over the same instances and threshold identical regardless of scan
/// strategy or thread scheduling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborGraph {
    threshold: Threshold,
    relations: Vec<NeighborRelation>,
    /// Registry slots of each relation's (first, second) endpoints.
    slot_pairs: Vec<(u32, u32)>,
}

impl NeighborGraph {
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn relations(&self) -> &[NeighborRelation] {
        &self.relations
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborRelation> {
        self.relations.iter()
    }

    /// The relation between `a` and `b`, in either argument order.
    pub fn relation(&self, a: &InstanceKey, b: &InstanceKey) -> Option<&NeighborRelation> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.relations
            .binary_search_by(|r| r.endpoints().cmp(&(lo, hi)))
            .ok()
            .map(|pos| &self.relations[pos])
    }

    pub fn contains(&self, a: &InstanceKey, b: &InstanceKey) -> bool {
        self.relation(a, b).is_some()
    }

    /// Registry slots of each relation, aligned with `relations()`.
    pub fn slot_pairs(&self) -> &[(u32, u32)] {
        &self.slot_pairs
    }

    /// Assemble a graph from raw slot pairs. Pairs must reference distinct
    /// registry slots; order and orientation do not matter.
    pub(crate) fn from_slot_pairs(
        registry: &InstanceRegistry,
        threshold: Threshold,
        pairs: Vec<(u32, u32, f64)>,
    ) -> Self {
        let mut entries: Vec<(NeighborRelation, (u32, u32))> = pairs
            .into_iter()
            .filter_map(|(a, b, distance)| {
                let ia = registry.get(a)?;
                let ib = registry.get(b)?;
                let relation = NeighborRelation::with_distance(ia.key(), ib.key(), distance)?;
                let slots = if ia.has_key(&relation.first) { (a, b) } else { (b, a) };
                Some((relation, slots))
            })
            .collect();
        entries.sort_unstable_by(|x, y| x.0.cmp(&y.0));
        entries.dedup_by(|x, y| x.0 == y.0);

        let (relations, slot_pairs): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        Self {
            threshold,
            relations,
            slot_pairs,
        }
    }
}

/// Build the neighbor graph of `registry` at `threshold`.
///
/// The threshold is validated before any pair is examined. Every unordered
/// pair of distinct instances is considered exactly once and kept iff its
/// Euclidean distance is at most the threshold.
pub fn build_neighbor_relations(
    registry: &InstanceRegistry,
    threshold: f64,
    options: &BuildOptions,
) -> Result<NeighborGraph> {
    let threshold = Threshold::new(threshold)?;
    let instances = registry.instances();

    tracing::debug!(
        instances = instances.len(),
        threshold = threshold.get(),
        strategy = ?options.strategy,
        parallel = options.parallel,
        "scanning instance pairs"
    );

    let pairs = match options.strategy {
        ScanStrategy::BruteForce => scan_rows(instances.len(), options, |i| {
            let a = &instances[i];
            instances[i + 1..]
                .iter()
                .enumerate()
                .filter_map(|(offset, b)| admit(threshold, i, i + 1 + offset, a, b))
                .collect()
        })?,
        ScanStrategy::Grid => {
            let grid = UniformGrid::build(instances, threshold.get());
            scan_rows(instances.len(), options, |i| {
                let a = &instances[i];
                grid.candidates(a)
                    .filter(|&j| j as usize > i)
                    .filter_map(|j| admit(threshold, i, j as usize, a, &instances[j as usize]))
                    .collect()
            })?
        }
    };

    let graph = NeighborGraph::from_slot_pairs(registry, threshold, pairs);
    tracing::info!(
        instances = instances.len(),
        relations = graph.len(),
        threshold = threshold.get(),
        "built neighbor graph"
    );
    Ok(graph)
}

fn admit(
    threshold: Threshold,
    i: usize,
    j: usize,
    a: &SpatialInstance,
    b: &SpatialInstance,
) -> Option<(u32, u32, f64)> {
    let distance = a.distance_to(b);
    threshold
        .admits(distance)
        .then_some((i as u32, j as u32, distance))
}

/// Run `row(i)` for every outer index and concatenate the partial results.
///
/// Rows are independent: each reads the shared instance slice and owns its
/// output until the merge.
fn scan_rows<F>(n: usize, options: &BuildOptions, row: F) -> Result<Vec<(u32, u32, f64)>>
where
    F: Fn(usize) -> Vec<(u32, u32, f64)> + Sync,
{
    let run = |i: usize| -> Result<Vec<(u32, u32, f64)>> {
        if options.is_cancelled() {
            return Err(JoinlessError::Cancelled);
        }
        Ok(row(i))
    };

    let rows: Vec<Vec<(u32, u32, f64)>> = if options.parallel {
        (0..n).into_par_iter().map(run).collect::<Result<_>>()?
    } else {
        (0..n).map(run).collect::<Result<_>>()?
    };

    Ok(rows.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(points: &[(&str, u64, f64, f64)]) -> InstanceRegistry {
        let mut r = InstanceRegistry::new();
        for &(f, id, x, y) in points {
            r.add_instance(SpatialInstance::new(f, id, x, y, 0)).unwrap();
        }
        r
    }

    #[test]
    fn threshold_rejects_non_positive_and_non_finite() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(Threshold::new(bad), Err(JoinlessError::InvalidThreshold(_))));
        }
        assert_eq!(Threshold::new(2.5).unwrap().get(), 2.5);
    }

    #[test]
    fn relation_is_unordered() {
        let a = SpatialInstance::new("B", 1, 0.0, 0.0, 0);
        let b = SpatialInstance::new("A", 9, 3.0, 4.0, 0);
        let ab = NeighborRelation::between(&a, &b).unwrap();
        let ba = NeighborRelation::between(&b, &a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.first(), &InstanceKey::new("A", 9));
        assert_eq!(ab.other(&InstanceKey::new("A", 9)), Some(&InstanceKey::new("B", 1)));
        assert!(NeighborRelation::between(&a, &a).is_none());
    }

    #[test]
    fn boundary_distance_is_included() {
        let r = registry(&[("A", 1, 0.0, 0.0), ("B", 1, 3.0, 4.0)]);
        let graph = build_neighbor_relations(&r, 5.0, &BuildOptions::sequential()).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.relations()[0].distance(), 5.0);
    }

    #[test]
    fn invalid_threshold_fails_before_scanning() {
        let r = registry(&[("A", 1, 0.0, 0.0), ("B", 1, 0.0, 0.0)]);
        let err = build_neighbor_relations(&r, 0.0, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, JoinlessError::InvalidThreshold(t) if t == 0.0));
    }

    #[test]
    fn slot_pairs_follow_canonical_endpoints() {
        let r = registry(&[("B", 1, 0.0, 0.0), ("A", 1, 1.0, 0.0)]);
        let graph = build_neighbor_relations(&r, 2.0, &BuildOptions::sequential()).unwrap();
        assert_eq!(graph.relations()[0].first(), &InstanceKey::new("A", 1));
        assert_eq!(graph.slot_pairs(), &[(1, 0)]);
    }

    #[test]
    fn cancelled_build_returns_error() {
        let r = registry(&[("A", 1, 0.0, 0.0), ("B", 1, 1.0, 0.0)]);
        let cancel = crate::options::BuildCancellation::new();
        cancel.cancel();
        let options = BuildOptions::default().with_cancellation(cancel);
        let err = build_neighbor_relations(&r, 2.0, &options).unwrap_err();
        assert!(matches!(err, JoinlessError::Cancelled));
    }
}
