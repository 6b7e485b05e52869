//! Build configuration for the neighbor-graph scan.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How candidate pairs are enumerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Every unordered pair, exactly once.
    #[default]
    BruteForce,
    /// Uniform grid with cell size equal to the threshold; only pairs in the
    /// same or adjacent cells are compared. Same output as `BruteForce`.
    Grid,
}

impl std::str::FromStr for ScanStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "brute_force" | "brute" => Ok(Self::BruteForce),
            "grid" => Ok(Self::Grid),
            other => Err(format!("unknown scan strategy `{other}` (expected brute-force or grid)")),
        }
    }
}

/// A cancellation flag shared with the scan workers.
///
/// Workers check it between rows of the pair scan; a cancelled build
/// returns `JoinlessError::Cancelled` and drops its partial output.
#[derive(Debug, Clone, Default)]
pub struct BuildCancellation {
    flag: Arc<AtomicBool>,
}

impl BuildCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub strategy: ScanStrategy,
    /// Spread the pair scan over the rayon thread pool.
    pub parallel: bool,
    #[serde(skip)]
    pub cancellation: Option<BuildCancellation>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            strategy: ScanStrategy::BruteForce,
            parallel: true,
            cancellation: None,
        }
    }
}

impl BuildOptions {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_cancellation(mut self, cancellation: BuildCancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, BuildCancellation::is_cancelled)
    }
}
