//! Error types for the spatial data model and its snapshot codec.

use crate::instance::InstanceKey;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JoinlessError>;

#[derive(Debug, Error)]
pub enum JoinlessError {
    #[error("duplicate instance {0}: (feature, instance id) must be unique")]
    DuplicateInstance(InstanceKey),

    #[error("invalid coordinates for instance {key}: ({x}, {y})")]
    InvalidCoordinates { key: InstanceKey, x: f64, y: f64 },

    #[error("instance registry is full: at most {limit} instances can be addressed")]
    RegistryFull { limit: u32 },

    #[error("invalid distance threshold {0}: must be finite and greater than zero")]
    InvalidThreshold(f64),

    #[error("a clique needs at least one instance")]
    EmptyClique,

    #[error("instance {0} appears more than once in the clique")]
    DuplicateCliqueMember(InstanceKey),

    #[error("instances {first} and {second} are {distance} apart, beyond threshold {threshold}")]
    CliqueNotConnected {
        first: InstanceKey,
        second: InstanceKey,
        distance: f64,
        threshold: f64,
    },

    #[error("clique has feature pattern {found}, expected {expected}")]
    PatternMismatch { expected: String, found: String },

    #[error("unknown instance {0}")]
    UnknownInstance(InstanceKey),

    #[error("neighbor graph build cancelled")]
    Cancelled,

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Failures while reading or writing a dataset snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported snapshot format version {found} (reader supports {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("snapshot truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("failed to decode snapshot: {0}")]
    Decode(String),

    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}
