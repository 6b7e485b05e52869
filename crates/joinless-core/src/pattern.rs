//! Co-location patterns and the catalog that accumulates cliques into them.

use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::clique::{Clique, FeaturePattern};
use crate::error::{JoinlessError, Result};
use crate::instance::SpatialInstance;
use crate::prevalence::{self, FeatureTotals, PrevalenceReport};

/// A feature-type combination together with the cliques supporting it.
///
/// Two patterns with the same feature tuple are the same pattern, whatever
/// cliques they hold.
#[derive(Debug, Clone, Serialize)]
pub struct ColocationPattern {
    features: FeaturePattern,
    cliques: AHashSet<Clique>,
}

impl ColocationPattern {
    pub fn new(features: FeaturePattern) -> Self {
        Self {
            features,
            cliques: AHashSet::new(),
        }
    }

    /// A pattern seeded with its first supporting clique.
    pub fn from_clique(clique: Clique) -> Self {
        let mut pattern = Self::new(clique.feature_pattern());
        pattern.cliques.insert(clique);
        pattern
    }

    pub fn feature_pattern(&self) -> &FeaturePattern {
        &self.features
    }

    /// Add a supporting clique. Returns `Ok(false)` if it was already present;
    /// fails if its feature types differ from this pattern's.
    pub fn add_clique(&mut self, clique: Clique) -> Result<bool> {
        let found = clique.feature_pattern();
        if found != self.features {
            return Err(JoinlessError::PatternMismatch {
                expected: self.features.to_string(),
                found: found.to_string(),
            });
        }
        Ok(self.cliques.insert(clique))
    }

    pub fn cliques(&self) -> impl Iterator<Item = &Clique> {
        self.cliques.iter()
    }

    pub fn clique_count(&self) -> usize {
        self.cliques.len()
    }

    pub fn has_cliques(&self) -> bool {
        !self.cliques.is_empty()
    }

    /// Distinct instances of `feature` appearing in any supporting clique.
    pub fn participants(&self, feature: &str) -> AHashSet<&SpatialInstance> {
        self.cliques
            .iter()
            .flat_map(|c| c.instances())
            .filter(|inst| inst.feature == feature)
            .collect()
    }

    /// Feature -> number of distinct participating instances. Empty when the
    /// pattern has no cliques.
    pub fn participating_instances(&self) -> BTreeMap<String, usize> {
        if !self.has_cliques() {
            return BTreeMap::new();
        }
        self.features
            .iter()
            .map(|f| (f.to_string(), self.participants(f).len()))
            .collect()
    }

    pub fn participation_ratio<T: FeatureTotals + ?Sized>(&self, feature: &str, totals: &T) -> f64 {
        prevalence::participation_ratio(self, feature, totals)
    }

    pub fn participation_index<T: FeatureTotals + ?Sized>(&self, totals: &T) -> f64 {
        prevalence::participation_index(self, totals)
    }

    pub fn prevalence<T: FeatureTotals + ?Sized>(&self, totals: &T) -> PrevalenceReport {
        prevalence::report(self, totals)
    }
}

impl PartialEq for ColocationPattern {
    fn eq(&self, other: &Self) -> bool {
        self.features == other.features
    }
}

impl Eq for ColocationPattern {}

impl Hash for ColocationPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.features.hash(state);
    }
}

/// Patterns keyed by feature tuple; cliques are routed to the pattern that
/// matches their feature types.
#[derive(Debug, Clone, Default)]
pub struct PatternCatalog {
    patterns: AHashMap<FeaturePattern, ColocationPattern>,
}

impl PatternCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `clique` to its pattern, creating the pattern on first sight.
    /// Returns whether the clique was new.
    pub fn insert_clique(&mut self, clique: Clique) -> bool {
        let key = clique.feature_pattern();
        match self.patterns.get_mut(&key) {
            Some(pattern) => pattern.cliques.insert(clique),
            None => {
                self.patterns.insert(key, ColocationPattern::from_clique(clique));
                true
            }
        }
    }

    pub fn get(&self, features: &FeaturePattern) -> Option<&ColocationPattern> {
        self.patterns.get(features)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns ordered by size, then by feature tuple.
    pub fn patterns(&self) -> Vec<&ColocationPattern> {
        let mut out: Vec<&ColocationPattern> = self.patterns.values().collect();
        out.sort_by(|a, b| {
            a.features
                .len()
                .cmp(&b.features.len())
                .then_with(|| a.features.cmp(&b.features))
        });
        out
    }

    /// Patterns whose participation index reaches `min_prevalence`, with their index.
    pub fn prevalent<T: FeatureTotals + ?Sized>(
        &self,
        totals: &T,
        min_prevalence: f64,
    ) -> Vec<(&ColocationPattern, f64)> {
        self.patterns()
            .into_iter()
            .map(|p| (p, p.participation_index(totals)))
            .filter(|&(_, pi)| pi >= min_prevalence)
            .collect()
    }
}
