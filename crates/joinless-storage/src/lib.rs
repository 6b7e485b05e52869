//! Joinless snapshot cache
//!
//! Keeps a built dataset on disk next to the CSV it came from:
//!
//! ```text
//!              ┌──────────── cache file valid, same threshold ───────────┐
//!              │                                                          ▼
//! CacheConfig ─┤                                                    SpatialDataset
//!              │                                                          ▲
//!              └─ missing / other threshold / corrupt / forced ──►  CSV ─► build ─► write cache
//! ```
//!
//! Snapshots are written to a temporary file and renamed into place, so a
//! crash mid-write never leaves a half-written cache behind.

#[cfg(test)]
mod tests;

use anyhow::Context;
use joinless_core::{BuildOptions, SpatialDataset};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration
// ============================================================================

/// Where the instances and their cached snapshot live, and how to build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Instance CSV (`Feature,Instance,LocX,LocY,Checkin`)
    pub csv_path: PathBuf,
    /// Snapshot file
    pub cache_path: PathBuf,
    /// Neighbor distance threshold
    pub threshold: f64,
    /// Ignore any existing snapshot
    pub force_rebuild: bool,
    pub build: BuildOptions,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("./instances.csv"),
            cache_path: PathBuf::from("./instances.jlds"),
            threshold: 160.0,
            force_rebuild: false,
            build: BuildOptions::default(),
        }
    }
}

impl CacheConfig {
    pub fn new(csv_path: impl Into<PathBuf>, cache_path: impl Into<PathBuf>, threshold: f64) -> Self {
        Self {
            csv_path: csv_path.into(),
            cache_path: cache_path.into(),
            threshold,
            ..Self::default()
        }
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Why a dataset was (or wasn't) rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheStatus {
    /// Snapshot reused as-is
    Hit,
    /// No snapshot on disk
    Missing,
    /// Snapshot built at another threshold
    ThresholdMismatch { cached: f64, requested: f64 },
    /// Snapshot unreadable or failed validation
    Corrupt,
    /// Rebuild requested explicitly
    Forced,
}

impl CacheStatus {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheStatus::Hit)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Hit => write!(f, "cache hit"),
            CacheStatus::Missing => write!(f, "no cache, built from CSV"),
            CacheStatus::ThresholdMismatch { cached, requested } => write!(
                f,
                "cache threshold {cached} != requested {requested}, rebuilt"
            ),
            CacheStatus::Corrupt => write!(f, "cache corrupt, rebuilt"),
            CacheStatus::Forced => write!(f, "forced rebuild"),
        }
    }
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub dataset: SpatialDataset,
    pub status: CacheStatus,
}

// ============================================================================
// Operations
// ============================================================================

/// Reuse the cached snapshot when it matches `config`, otherwise rebuild from
/// the CSV and refresh the cache.
pub fn load_or_build(config: &CacheConfig) -> anyhow::Result<LoadOutcome> {
    let status = if config.force_rebuild {
        CacheStatus::Forced
    } else if !config.cache_path.exists() {
        CacheStatus::Missing
    } else {
        match load_dataset(&config.cache_path) {
            Ok(dataset) if dataset.distance_threshold() == config.threshold => {
                tracing::info!(
                    path = %config.cache_path.display(),
                    instances = dataset.registry().len(),
                    relations = dataset.graph().len(),
                    "loaded cached dataset"
                );
                return Ok(LoadOutcome {
                    dataset,
                    status: CacheStatus::Hit,
                });
            }
            Ok(dataset) => {
                tracing::info!(
                    cached = dataset.distance_threshold(),
                    requested = config.threshold,
                    "cached threshold differs, rebuilding"
                );
                CacheStatus::ThresholdMismatch {
                    cached: dataset.distance_threshold(),
                    requested: config.threshold,
                }
            }
            Err(err) => {
                tracing::warn!(
                    path = %config.cache_path.display(),
                    error = %format!("{err:#}"),
                    "ignoring unusable cache"
                );
                CacheStatus::Corrupt
            }
        }
    };

    let dataset = build_from_csv(config)?;
    save_dataset(&config.cache_path, &dataset)?;
    tracing::info!(
        path = %config.cache_path.display(),
        %status,
        "wrote dataset snapshot"
    );
    Ok(LoadOutcome { dataset, status })
}

/// Ingest `config.csv_path` and build at `config.threshold`, bypassing the cache.
pub fn build_from_csv(config: &CacheConfig) -> anyhow::Result<SpatialDataset> {
    let registry = joinless_ingest::load_registry(&config.csv_path)
        .with_context(|| format!("failed to load instances from {}", config.csv_path.display()))?;
    SpatialDataset::build(registry, config.threshold, &config.build)
        .with_context(|| format!("failed to build dataset at threshold {}", config.threshold))
}

/// Write `dataset` to `path` through a temporary sibling file.
pub fn save_dataset(path: impl AsRef<Path>, dataset: &SpatialDataset) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let bytes = dataset.to_bytes()?;

    let tmp = tmp_path(path);
    fs::write(&tmp, &bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
    Ok(())
}

pub fn load_dataset(path: impl AsRef<Path>) -> anyhow::Result<SpatialDataset> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    SpatialDataset::from_bytes(&bytes)
        .with_context(|| format!("invalid snapshot {}", path.display()))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
