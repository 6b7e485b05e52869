//! Joinless core: the spatial data model behind co-location pattern mining.
//!
//! Pipeline:
//!
//! ```text
//! InstanceRegistry ──► build_neighbor_relations ──► build_star_neighborhoods
//!        │                    (NeighborGraph)           (StarNeighborhoods)
//!        │
//!        └──── totals ──► ColocationPattern::participation_index ◄── cliques
//! ```
//!
//! 1. **Registry**: instances keyed by `(feature, instance_id)`, grouped by feature.
//! 2. **Neighbor graph**: unordered pairs within a closed distance threshold,
//!    found by a brute-force or grid-indexed scan (optionally on rayon).
//! 3. **Stars**: one per instance, neighbors kept in a Roaring bitmap of slots.
//! 4. **Cliques / patterns**: value types produced by a clique-enumeration stage.
//! 5. **Prevalence**: participation ratio and participation index.
//!
//! `SpatialDataset` bundles 1-3 into an immutable snapshot with a versioned
//! binary encoding; `DatasetHandle` swaps snapshots atomically on rebuild.

pub mod clique;
pub mod dataset;
pub mod error;
mod grid;
pub mod instance;
pub mod neighbor;
pub mod options;
pub mod pattern;
pub mod prevalence;
pub mod registry;
pub mod snapshot;
pub mod star;

pub use clique::{Clique, FeaturePattern};
pub use dataset::{DatasetHandle, SpatialDataset};
pub use error::{JoinlessError, Result, SnapshotError};
pub use instance::{InstanceKey, SpatialInstance};
pub use neighbor::{build_neighbor_relations, NeighborGraph, NeighborRelation, Threshold};
pub use options::{BuildCancellation, BuildOptions, ScanStrategy};
pub use pattern::{ColocationPattern, PatternCatalog};
pub use prevalence::{FeatureTotals, PrevalenceReport};
pub use registry::{FeatureGroup, InstanceRegistry};
pub use snapshot::{SnapshotHeader, SNAPSHOT_FORMAT_VERSION, SNAPSHOT_MAGIC};
pub use star::{build_star_neighborhoods, StarNeighborhood, StarNeighborhoods, StarView};
