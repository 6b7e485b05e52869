//! Versioned binary snapshot of a built dataset.
//!
//! Layout:
//!
//! ```text
//! magic "JLDS" | format version (u32 LE) | payload length (u64 LE)
//!   | SHA-256 of payload (32 bytes) | payload (bincode)
//! ```
//!
//! The payload stores instances in registry order, relations as slot pairs
//! and stars as slot lists, plus the threshold. Decoding re-validates all of
//! it: instances go through `add_instance`, relations must be within the
//! stored threshold, no pair within the threshold may be missing (checked by a
//! grid rescan), and the stored stars must equal the stars derived from the
//! relations. Any disagreement is reported, never silently accepted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::dataset::SpatialDataset;
use crate::error::SnapshotError;
use crate::instance::SpatialInstance;
use crate::neighbor::{build_neighbor_relations, NeighborGraph, Threshold};
use crate::options::{BuildOptions, ScanStrategy};
use crate::registry::InstanceRegistry;
use crate::star::build_star_neighborhoods;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"JLDS";
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 8 + 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub format_version: u32,
    pub payload_len: u64,
    pub checksum: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    threshold: f64,
    instances: Vec<SpatialInstance>,
    relations: Vec<RelationRecord>,
    stars: Vec<StarRecord>,
}

#[derive(Serialize, Deserialize)]
struct RelationRecord {
    first: u32,
    second: u32,
    distance: f64,
}

#[derive(Serialize, Deserialize, PartialEq)]
struct StarRecord {
    center: u32,
    neighbors: Vec<u32>,
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn star_records(dataset: &SpatialDataset) -> Vec<StarRecord> {
    dataset
        .stars()
        .iter()
        .map(|s| StarRecord {
            center: s.center_slot(),
            neighbors: s.neighbor_slots().iter().collect(),
        })
        .collect()
}

pub fn encode(dataset: &SpatialDataset) -> Result<Vec<u8>, SnapshotError> {
    let body = SnapshotBody {
        threshold: dataset.distance_threshold(),
        instances: dataset.registry().instances().to_vec(),
        relations: dataset
            .graph()
            .slot_pairs()
            .iter()
            .zip(dataset.graph().relations())
            .map(|(&(first, second), rel)| RelationRecord {
                first,
                second,
                distance: rel.distance(),
            })
            .collect(),
        stars: star_records(dataset),
    };
    let payload = bincode::serialize(&body).map_err(|e| SnapshotError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&SNAPSHOT_MAGIC);
    out.extend_from_slice(&SNAPSHOT_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&sha256(&payload));
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse and check the fixed-size header without touching the payload.
pub fn read_header(bytes: &[u8]) -> Result<SnapshotHeader, SnapshotError> {
    if bytes.len() < 4 || bytes[0..4] != SNAPSHOT_MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(SnapshotError::Truncated {
            expected: HEADER_LEN as u64,
            actual: bytes.len() as u64,
        });
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let format_version = u32::from_le_bytes(version);
    if format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: format_version,
            supported: SNAPSHOT_FORMAT_VERSION,
        });
    }

    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[8..16]);
    let mut checksum = [0u8; 32];
    checksum.copy_from_slice(&bytes[16..HEADER_LEN]);

    Ok(SnapshotHeader {
        format_version,
        payload_len: u64::from_le_bytes(len),
        checksum,
    })
}

pub fn decode(bytes: &[u8]) -> Result<SpatialDataset, SnapshotError> {
    let header = read_header(bytes)?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != header.payload_len {
        return Err(SnapshotError::Truncated {
            expected: HEADER_LEN as u64 + header.payload_len,
            actual: bytes.len() as u64,
        });
    }
    if sha256(payload) != header.checksum {
        return Err(SnapshotError::ChecksumMismatch);
    }

    let body: SnapshotBody =
        bincode::deserialize(payload).map_err(|e| SnapshotError::Decode(e.to_string()))?;

    let threshold = Threshold::new(body.threshold)
        .map_err(|e| SnapshotError::Inconsistent(e.to_string()))?;

    let mut registry = InstanceRegistry::new();
    for instance in body.instances {
        registry
            .add_instance(instance)
            .map_err(|e| SnapshotError::Inconsistent(e.to_string()))?;
    }

    let mut pairs = Vec::with_capacity(body.relations.len());
    for rel in &body.relations {
        let (Some(a), Some(b)) = (registry.get(rel.first), registry.get(rel.second)) else {
            return Err(SnapshotError::Inconsistent(format!(
                "relation ({}, {}) references an unknown slot",
                rel.first, rel.second
            )));
        };
        if rel.first == rel.second {
            return Err(SnapshotError::Inconsistent(format!(
                "self-relation on {}",
                a.key()
            )));
        }
        let distance = a.distance_to(b);
        if distance.to_bits() != rel.distance.to_bits() {
            return Err(SnapshotError::Inconsistent(format!(
                "relation {} - {} stores distance {} but the instances are {distance} apart",
                a.key(),
                b.key(),
                rel.distance
            )));
        }
        if !threshold.admits(distance) {
            return Err(SnapshotError::Inconsistent(format!(
                "relation {} - {} at distance {distance} exceeds threshold {}",
                a.key(),
                b.key(),
                threshold.get()
            )));
        }
        pairs.push((rel.first, rel.second, distance));
    }
    let graph = NeighborGraph::from_slot_pairs(&registry, threshold, pairs);
    if graph.len() != body.relations.len() {
        return Err(SnapshotError::Inconsistent(
            "duplicate neighbor relations".to_string(),
        ));
    }

    // every stored relation is valid; now check none is missing
    let rescan = BuildOptions::default().with_strategy(ScanStrategy::Grid);
    let expected = build_neighbor_relations(&registry, threshold.get(), &rescan)
        .map_err(|e| SnapshotError::Inconsistent(e.to_string()))?;
    if expected.len() > graph.len() {
        return Err(SnapshotError::Inconsistent(format!(
            "snapshot stores {} neighbor relations but {} pairs are within threshold {}",
            graph.len(),
            expected.len(),
            threshold.get()
        )));
    }

    let stars = build_star_neighborhoods(&registry, &graph);
    let dataset = SpatialDataset::from_parts(registry, graph, stars);
    if star_records(&dataset) != body.stars {
        return Err(SnapshotError::Inconsistent(
            "stored star neighborhoods disagree with the neighbor relations".to_string(),
        ));
    }

    tracing::debug!(
        instances = dataset.registry().len(),
        relations = dataset.graph().len(),
        threshold = dataset.distance_threshold(),
        "decoded dataset snapshot"
    );
    Ok(dataset)
}
