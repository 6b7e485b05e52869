//! CSV ingestion for Joinless
//!
//! Reads one spatial instance per row into an [`InstanceRegistry`]:
//!
//! ```text
//! Feature,Instance,LocX,LocY,Checkin
//! A,1,-115.17,36.12,42
//! ```
//!
//! Columns are matched by header name (surrounding whitespace ignored), may
//! appear in any order, and extra columns are skipped. The first bad row
//! aborts the load and is reported with its line number.

use joinless_core::{InstanceRegistry, JoinlessError, SpatialInstance};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Headers every instance file must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Feature", "Instance", "LocX", "LocY", "Checkin"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad header: {0}")]
    Header(String),

    #[error("line {line}: {message}")]
    Row { line: u64, message: String },

    #[error("line {line}: {source}")]
    InvalidRow {
        line: u64,
        #[source]
        source: JoinlessError,
    },
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "Feature")]
    feature: String,
    #[serde(rename = "Instance")]
    instance: u64,
    #[serde(rename = "LocX")]
    x: f64,
    #[serde(rename = "LocY")]
    y: f64,
    #[serde(rename = "Checkin")]
    checkin: u64,
}

impl Row {
    fn into_instance(self) -> SpatialInstance {
        SpatialInstance::new(self.feature, self.instance, self.x, self.y, self.checkin)
    }
}

fn csv_error(err: csv::Error) -> IngestError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => IngestError::Io(e),
        _ => IngestError::Row { line, message },
    }
}

/// Read a registry from any CSV source.
pub fn read_registry<R: Read>(reader: R) -> Result<InstanceRegistry, IngestError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv.headers().map_err(csv_error)?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::Header(format!(
            "missing column(s) {}",
            missing.join(", ")
        )));
    }

    let mut registry = InstanceRegistry::new();
    for record in csv.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let row: Row = record
            .deserialize(Some(&headers))
            .map_err(|e| IngestError::Row {
                line,
                message: e.to_string(),
            })?;
        registry
            .add_instance(row.into_instance())
            .map_err(|source| IngestError::InvalidRow { line, source })?;
    }

    tracing::debug!(
        instances = registry.len(),
        features = registry.feature_groups().len(),
        "read instance registry"
    );
    Ok(registry)
}

/// Read a registry from a CSV file.
pub fn load_registry(path: impl AsRef<Path>) -> Result<InstanceRegistry, IngestError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let registry = read_registry(BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        instances = registry.len(),
        "loaded instances"
    );
    Ok(registry)
}
