//! Immutable dataset snapshots and the handle that swaps them atomically.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::clique::Clique;
use crate::error::{JoinlessError, Result};
use crate::instance::InstanceKey;
use crate::neighbor::{build_neighbor_relations, NeighborGraph};
use crate::options::BuildOptions;
use crate::registry::InstanceRegistry;
use crate::snapshot;
use crate::star::{build_star_neighborhoods, StarNeighborhoods, StarView};

/// Instances plus the neighbor graph and stars built from them at one threshold.
///
/// A dataset never changes after construction. Changing the threshold means
/// building a new dataset (`rebuild`), which shares the registry.
#[derive(Debug, Clone)]
pub struct SpatialDataset {
    registry: Arc<InstanceRegistry>,
    graph: NeighborGraph,
    stars: StarNeighborhoods,
}

impl SpatialDataset {
    pub fn build(registry: InstanceRegistry, threshold: f64, options: &BuildOptions) -> Result<Self> {
        Self::build_shared(Arc::new(registry), threshold, options)
    }

    pub fn build_shared(
        registry: Arc<InstanceRegistry>,
        threshold: f64,
        options: &BuildOptions,
    ) -> Result<Self> {
        let graph = build_neighbor_relations(&registry, threshold, options)?;
        let stars = build_star_neighborhoods(&registry, &graph);
        Ok(Self {
            registry,
            graph,
            stars,
        })
    }

    /// A new dataset over the same instances at another threshold.
    pub fn rebuild(&self, threshold: f64, options: &BuildOptions) -> Result<Self> {
        Self::build_shared(Arc::clone(&self.registry), threshold, options)
    }

    pub(crate) fn from_parts(
        registry: InstanceRegistry,
        graph: NeighborGraph,
        stars: StarNeighborhoods,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            graph,
            stars,
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn shared_registry(&self) -> Arc<InstanceRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn graph(&self) -> &NeighborGraph {
        &self.graph
    }

    pub fn stars(&self) -> &StarNeighborhoods {
        &self.stars
    }

    /// The threshold the graph and stars were built with.
    pub fn distance_threshold(&self) -> f64 {
        self.graph.threshold().get()
    }

    pub fn feature_instance_count(&self, feature: &str) -> usize {
        self.registry.feature_instance_count(feature)
    }

    pub fn star(&self, key: &InstanceKey) -> Option<StarView<'_>> {
        self.stars.star_of(&self.registry, key)
    }

    /// Resolve `keys` and build a clique at this dataset's threshold.
    pub fn clique(&self, keys: &[InstanceKey]) -> Result<Clique> {
        let instances = keys
            .iter()
            .map(|key| {
                self.registry
                    .lookup(key)
                    .cloned()
                    .ok_or_else(|| JoinlessError::UnknownInstance(key.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Clique::new(instances, self.graph.threshold())
    }

    /// Serialize to the versioned snapshot format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(snapshot::encode(self)?)
    }

    /// Deserialize from the versioned snapshot format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(snapshot::decode(bytes)?)
    }
}

/// Shared access to the current dataset.
///
/// Readers take an `Arc` to the current snapshot; a rebuild computes the
/// replacement without holding the lock and then swaps it in, so readers see
/// either the old dataset or the new one.
#[derive(Debug)]
pub struct DatasetHandle {
    current: RwLock<Arc<SpatialDataset>>,
}

impl DatasetHandle {
    pub fn new(dataset: SpatialDataset) -> Self {
        Self {
            current: RwLock::new(Arc::new(dataset)),
        }
    }

    pub fn current(&self) -> Arc<SpatialDataset> {
        self.current.read().clone()
    }

    pub fn replace(&self, dataset: SpatialDataset) -> Arc<SpatialDataset> {
        let next = Arc::new(dataset);
        *self.current.write() = Arc::clone(&next);
        next
    }

    /// Rebuild at `threshold`. On error the current dataset stays in place.
    pub fn rebuild(&self, threshold: f64, options: &BuildOptions) -> Result<Arc<SpatialDataset>> {
        let base = self.current();
        let next = base.rebuild(threshold, options)?;
        tracing::info!(
            from = base.distance_threshold(),
            to = next.distance_threshold(),
            "swapping rebuilt dataset"
        );
        Ok(self.replace(next))
    }
}
