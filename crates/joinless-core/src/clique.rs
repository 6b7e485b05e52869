//! Cliques (pairwise-neighboring instance groups) and feature patterns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{JoinlessError, Result};
use crate::instance::{InstanceKey, SpatialInstance};
use crate::neighbor::Threshold;

// ============================================================================
// Feature patterns
// ============================================================================

/// A sorted, de-duplicated tuple of feature-type names.
///
/// Deserialization re-sorts and de-duplicates, so any list of names is
/// accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FeaturePattern(Vec<String>);

impl FeaturePattern {
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut features: Vec<String> = features.into_iter().map(Into::into).collect();
        features.sort();
        features.dedup();
        Self(features)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.0
            .binary_search_by(|f| f.as_str().cmp(feature))
            .is_ok()
    }

    /// This pattern extended by one feature type.
    pub fn with_feature(&self, feature: impl Into<String>) -> Self {
        Self::new(self.0.iter().cloned().chain(std::iter::once(feature.into())))
    }
}

impl From<Vec<String>> for FeaturePattern {
    fn from(features: Vec<String>) -> Self {
        Self::new(features)
    }
}

impl From<FeaturePattern> for Vec<String> {
    fn from(pattern: FeaturePattern) -> Self {
        pattern.0
    }
}

impl fmt::Display for FeaturePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.join(", "))
    }
}

// ============================================================================
// Cliques
// ============================================================================

/// A set of distinct instances that are pairwise within a threshold.
///
/// Stored in canonical (identity-sorted) order; equality and hashing use
/// that order, so insertion order never matters. Serialize-only: a clique
/// can't be checked without its threshold.
#[derive(Debug, Clone, Serialize)]
pub struct Clique {
    instances: Vec<SpatialInstance>,
}

impl Clique {
    /// Build a clique, checking it is non-empty, has no repeated identity and
    /// that every pair is within `threshold`.
    pub fn new(mut instances: Vec<SpatialInstance>, threshold: Threshold) -> Result<Self> {
        if instances.is_empty() {
            return Err(JoinlessError::EmptyClique);
        }
        instances.sort();
        if let Some(dup) = instances.windows(2).find(|w| w[0] == w[1]) {
            return Err(JoinlessError::DuplicateCliqueMember(dup[0].key()));
        }

        for (i, a) in instances.iter().enumerate() {
            for b in &instances[i + 1..] {
                let distance = a.distance_to(b);
                if !threshold.admits(distance) {
                    return Err(JoinlessError::CliqueNotConnected {
                        first: a.key(),
                        second: b.key(),
                        distance,
                        threshold: threshold.get(),
                    });
                }
            }
        }

        Ok(Self { instances })
    }

    /// Members in identity order.
    pub fn instances(&self) -> &[SpatialInstance] {
        &self.instances
    }

    pub fn keys(&self) -> impl Iterator<Item = InstanceKey> + '_ {
        self.instances.iter().map(SpatialInstance::key)
    }

    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.instances.iter().any(|i| i.has_key(key))
    }

    pub fn size(&self) -> usize {
        self.instances.len()
    }

    /// Sorted, de-duplicated feature types of the members.
    pub fn feature_pattern(&self) -> FeaturePattern {
        FeaturePattern::new(self.instances.iter().map(|i| i.feature.as_str()))
    }
}

impl PartialEq for Clique {
    fn eq(&self, other: &Self) -> bool {
        self.instances == other.instances
    }
}

impl Eq for Clique {}

impl Hash for Clique {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instances.hash(state);
    }
}
