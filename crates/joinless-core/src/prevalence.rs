//! Participation ratio and participation index.
//!
//! For a pattern `P` and one of its features `f`:
//!
//! ```text
//! PR(f, P) = |distinct instances of f in P's cliques| / |instances of f|
//! PI(P)    = min over f in P of PR(f, P)
//! ```
//!
//! `PI` is anti-monotone: extending `P` by a feature can only keep or lower it.
//! Missing or zero totals yield a ratio of 0 instead of an error.

use ahash::AHashMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::pattern::ColocationPattern;
use crate::registry::InstanceRegistry;

/// Source of per-feature total instance counts.
pub trait FeatureTotals {
    fn total_instances(&self, feature: &str) -> Option<usize>;
}

impl FeatureTotals for InstanceRegistry {
    fn total_instances(&self, feature: &str) -> Option<usize> {
        self.feature_group(feature).map(|g| g.len())
    }
}

impl<S: BuildHasher> FeatureTotals for HashMap<String, usize, S> {
    fn total_instances(&self, feature: &str) -> Option<usize> {
        self.get(feature).copied()
    }
}

impl FeatureTotals for AHashMap<String, usize> {
    fn total_instances(&self, feature: &str) -> Option<usize> {
        self.get(feature).copied()
    }
}

impl FeatureTotals for BTreeMap<String, usize> {
    fn total_instances(&self, feature: &str) -> Option<usize> {
        self.get(feature).copied()
    }
}

pub fn participation_ratio<T: FeatureTotals + ?Sized>(
    pattern: &ColocationPattern,
    feature: &str,
    totals: &T,
) -> f64 {
    if !pattern.feature_pattern().contains(feature) || !pattern.has_cliques() {
        return 0.0;
    }
    let total = match totals.total_instances(feature) {
        Some(total) if total > 0 => total,
        _ => return 0.0,
    };
    pattern.participants(feature).len() as f64 / total as f64
}

pub fn participation_index<T: FeatureTotals + ?Sized>(pattern: &ColocationPattern, totals: &T) -> f64 {
    let features = pattern.feature_pattern();
    if features.is_empty() {
        return 0.0;
    }
    features
        .iter()
        .map(|f| participation_ratio(pattern, f, totals))
        .fold(f64::INFINITY, f64::min)
}

/// Every ratio of a pattern plus its index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrevalenceReport {
    pub pattern: Vec<String>,
    pub ratios: BTreeMap<String, f64>,
    pub participation_index: f64,
}

impl PrevalenceReport {
    pub fn is_prevalent(&self, min_prevalence: f64) -> bool {
        self.participation_index >= min_prevalence
    }
}

pub fn report<T: FeatureTotals + ?Sized>(pattern: &ColocationPattern, totals: &T) -> PrevalenceReport {
    let ratios: BTreeMap<String, f64> = pattern
        .feature_pattern()
        .iter()
        .map(|f| (f.to_string(), participation_ratio(pattern, f, totals)))
        .collect();
    let participation_index = if ratios.is_empty() {
        0.0
    } else {
        ratios.values().copied().fold(f64::INFINITY, f64::min)
    };
    PrevalenceReport {
        pattern: pattern.feature_pattern().as_slice().to_vec(),
        ratios,
        participation_index,
    }
}
