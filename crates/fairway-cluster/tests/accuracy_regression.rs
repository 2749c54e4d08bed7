//! Regression and property tests for fairway-cluster.
//!
//! Fixed matrices check exact labelings; random matrices check that DBSCAN
//! is deterministic and that its labels respect the core/border/noise rules.

use fairway_cluster::{Assignment, DbscanConfig, silhouette};
use fairway_dtw::DistanceMatrix;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn planar(points: &[(f64, f64)]) -> DistanceMatrix {
    let dense: Vec<Vec<f64>> = points
        .iter()
        .map(|a| {
            points
                .iter()
                .map(|b| (a.0 - b.0).hypot(a.1 - b.1))
                .collect()
        })
        .collect();
    DistanceMatrix::from_dense(&dense).unwrap()
}

// ---------------------------------------------------------------------------
// a) fixed scenarios
// ---------------------------------------------------------------------------

/// Three dense blobs of five voyages each plus two stragglers.
#[test]
fn blobs_and_stragglers() {
    let mut points = Vec::new();
    for (cx, cy) in [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)] {
        for k in 0..5 {
            let angle = k as f64 * std::f64::consts::TAU / 5.0;
            points.push((cx + 0.5 * angle.cos(), cy + 0.5 * angle.sin()));
        }
    }
    points.push((5.0, 5.0));
    points.push((-8.0, -8.0));

    let m = planar(&points);
    let result = DbscanConfig::new(1.5).unwrap().fit(&m);

    assert_eq!(result.n_clusters(), 3);
    assert_eq!(result.cluster_sizes(), vec![5, 5, 5]);
    assert_eq!(result.noise(), vec![15, 16]);
    assert_eq!(
        result.partition(),
        vec![
            (0..5).collect::<Vec<_>>(),
            (5..10).collect::<Vec<_>>(),
            (10..15).collect::<Vec<_>>(),
        ]
    );
    assert_eq!(result.size_histogram().get(&5), Some(&3));
    assert!(result.core[..15].iter().all(|&c| c));

    let score = silhouette(&m, &result).unwrap();
    assert!(score.mean_score > 0.8, "got {}", score.mean_score);
}

/// With the default `min_points` a pair of similar voyages is not dense enough.
#[test]
fn default_min_points_needs_five_voyages() {
    let m = planar(&[(0.0, 0.0), (0.1, 0.0), (0.2, 0.0), (0.3, 0.0)]);
    let result = DbscanConfig::new(1.0).unwrap().fit(&m);
    assert!(result.assignments.iter().all(|a| a.is_noise()));

    let m = planar(&[(0.0, 0.0), (0.1, 0.0), (0.2, 0.0), (0.3, 0.0), (0.4, 0.0)]);
    let result = DbscanConfig::new(1.0).unwrap().fit(&m);
    assert!(
        result
            .assignments
            .iter()
            .all(|&a| a == Assignment::Cluster(result.assignments[0].label().unwrap()))
    );
}

#[test]
fn labels_are_numbered_by_lowest_core_index() {
    // Voyage 0 is noise; the cluster containing voyage 1 must be label 0.
    let m = planar(&[(50.0, 50.0), (0.0, 0.0), (10.0, 0.0), (0.2, 0.0), (10.2, 0.0)]);
    let result = DbscanConfig::new(0.5).unwrap().with_min_points(1).fit(&m);
    let raw: Vec<i64> = result.assignments.iter().map(|&a| i64::from(a)).collect();
    assert_eq!(raw, vec![-1, 0, 1, 0, 1]);
    assert_eq!(result.members(result.assignments[2].label().unwrap()), vec![2, 4]);
}

// ---------------------------------------------------------------------------
// b) properties over random matrices
// ---------------------------------------------------------------------------

fn point_cloud() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0.0..20.0_f64, 0.0..20.0_f64), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn fit_twice_gives_identical_partition(points in point_cloud(), eps in 0.5..5.0_f64, min_points in 0usize..6) {
        let m = planar(&points);
        let config = DbscanConfig::new(eps).unwrap().with_min_points(min_points);
        let first = config.fit(&m);
        let second = config.fit(&m);
        prop_assert_eq!(first.partition(), second.partition());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn labels_respect_density_rules(points in point_cloud(), eps in 0.5..5.0_f64, min_points in 0usize..6) {
        let m = planar(&points);
        let result = DbscanConfig::new(eps).unwrap().with_min_points(min_points).fit(&m);
        let n = points.len();

        for i in 0..n {
            let neighbours: Vec<usize> = (0..n)
                .filter(|&j| j != i && m.get(i, j).value() <= eps)
                .collect();
            prop_assert_eq!(result.core[i], neighbours.len() >= min_points);

            if result.core[i] {
                // Core voyages share a label with every neighbour that is core.
                for &j in neighbours.iter().filter(|&&j| result.core[j]) {
                    prop_assert_eq!(result.assignments[i], result.assignments[j]);
                }
                prop_assert!(!result.assignments[i].is_noise());
            } else {
                // A non-core voyage is noise exactly when no core voyage reaches it.
                let reachable = neighbours.iter().any(|&j| result.core[j]);
                prop_assert_eq!(result.assignments[i].is_noise(), !reachable);
            }
        }

        // Labels are contiguous from zero.
        prop_assert!(result.cluster_sizes().iter().all(|&size| size > 0));
    }
}
