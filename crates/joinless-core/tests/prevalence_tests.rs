//! Clique, pattern and prevalence tests over built datasets

use approx::assert_relative_eq;
use joinless_core::*;
use std::collections::{BTreeMap, HashMap};

fn key(feature: &str, id: u64) -> InstanceKey {
    InstanceKey::new(feature, id)
}

fn dataset(points: &[(&str, u64, f64, f64)], threshold: f64) -> SpatialDataset {
    let mut r = InstanceRegistry::new();
    for &(feature, id, x, y) in points {
        r.add_instance(SpatialInstance::new(feature, id, x, y, 0)).unwrap();
    }
    SpatialDataset::build(r, threshold, &BuildOptions::default()).unwrap()
}

fn totals(entries: &[(&str, usize)]) -> HashMap<String, usize> {
    entries.iter().map(|&(f, n)| (f.to_string(), n)).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_all_instances_participate() {
    let ds = dataset(&[("A", 1, 0.0, 0.0), ("A", 2, 1.0, 0.0), ("B", 1, 0.5, 0.5)], 2.0);

    let mut pattern = ColocationPattern::new(FeaturePattern::new(["A", "B"]));
    pattern.add_clique(ds.clique(&[key("A", 1), key("B", 1)]).unwrap()).unwrap();
    pattern.add_clique(ds.clique(&[key("A", 2), key("B", 1)]).unwrap()).unwrap();
    assert_eq!(pattern.clique_count(), 2);

    let t = totals(&[("A", 2), ("B", 1)]);
    assert_relative_eq!(pattern.participation_ratio("A", &t), 1.0);
    assert_relative_eq!(pattern.participation_ratio("B", &t), 1.0);
    assert_relative_eq!(pattern.participation_index(&t), 1.0);

    // registry totals agree with the explicit map
    assert_relative_eq!(pattern.participation_index(ds.registry()), 1.0);
}

#[test]
fn test_partial_participation_takes_minimum() {
    let ds = dataset(&[("A", 1, 0.0, 0.0), ("A", 2, 5.0, 0.0), ("B", 1, 1.0, 0.0)], 2.0);

    assert!(ds.graph().contains(&key("A", 1), &key("B", 1)));
    assert!(!ds.graph().contains(&key("A", 2), &key("B", 1)));

    let pattern = ColocationPattern::from_clique(ds.clique(&[key("A", 1), key("B", 1)]).unwrap());
    let t = totals(&[("A", 2), ("B", 1)]);

    assert_relative_eq!(pattern.participation_ratio("A", &t), 0.5);
    assert_relative_eq!(pattern.participation_ratio("B", &t), 1.0);
    assert_relative_eq!(pattern.participation_index(&t), 0.5);

    let report = pattern.prevalence(&t);
    assert_eq!(report.pattern, vec!["A".to_string(), "B".to_string()]);
    assert_relative_eq!(report.participation_index, 0.5);
    assert!(report.is_prevalent(0.5));
    assert!(!report.is_prevalent(0.6));
}

#[test]
fn test_unconnected_clique_is_rejected() {
    let ds = dataset(&[("A", 2, 5.0, 0.0), ("B", 1, 1.0, 0.0)], 2.0);
    let err = ds.clique(&[key("A", 2), key("B", 1)]).unwrap_err();
    assert!(matches!(err, JoinlessError::CliqueNotConnected { .. }));

    let err = ds.clique(&[key("A", 9)]).unwrap_err();
    assert!(matches!(err, JoinlessError::UnknownInstance(_)));
}

// ============================================================================
// Degenerate totals
// ============================================================================

#[test]
fn test_missing_or_zero_totals_yield_zero() {
    let ds = dataset(&[("A", 1, 0.0, 0.0), ("B", 1, 1.0, 0.0)], 2.0);
    let pattern = ColocationPattern::from_clique(ds.clique(&[key("A", 1), key("B", 1)]).unwrap());

    let missing = totals(&[("A", 1)]);
    assert_eq!(pattern.participation_ratio("B", &missing), 0.0);
    assert_eq!(pattern.participation_index(&missing), 0.0);

    let zero: BTreeMap<String, usize> = [("A".to_string(), 1), ("B".to_string(), 0)].into();
    assert_eq!(pattern.participation_ratio("B", &zero), 0.0);
    assert_eq!(pattern.participation_index(&zero), 0.0);
}

#[test]
fn test_feature_outside_pattern_and_empty_pattern() {
    let ds = dataset(&[("A", 1, 0.0, 0.0), ("B", 1, 1.0, 0.0)], 2.0);
    let pattern = ColocationPattern::from_clique(ds.clique(&[key("A", 1), key("B", 1)]).unwrap());
    let t = totals(&[("A", 1), ("B", 1), ("C", 4)]);
    assert_eq!(pattern.participation_ratio("C", &t), 0.0);

    let empty = ColocationPattern::new(FeaturePattern::default());
    assert_eq!(empty.participation_index(&t), 0.0);

    let no_cliques = ColocationPattern::new(FeaturePattern::new(["A", "B"]));
    assert_eq!(no_cliques.participation_index(&t), 0.0);
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn test_catalog_prevalent_filter() {
    let ds = dataset(
        &[
            ("A", 1, 0.0, 0.0),
            ("A", 2, 8.0, 0.0),
            ("B", 1, 1.0, 0.0),
            ("C", 1, 0.0, 1.0),
        ],
        2.0,
    );
    let mut catalog = PatternCatalog::new();
    catalog.insert_clique(ds.clique(&[key("A", 1), key("B", 1)]).unwrap());
    catalog.insert_clique(ds.clique(&[key("B", 1), key("C", 1)]).unwrap());
    catalog.insert_clique(ds.clique(&[key("A", 1), key("B", 1), key("C", 1)]).unwrap());

    let prevalent: Vec<String> = catalog
        .prevalent(ds.registry(), 0.6)
        .into_iter()
        .map(|(p, _)| p.feature_pattern().to_string())
        .collect();
    assert_eq!(prevalent, vec!["{B, C}".to_string()]);

    let all = catalog.prevalent(ds.registry(), 0.0);
    assert_eq!(all.len(), 3);
    assert_relative_eq!(all[0].1, 0.5);
}
