//! Silhouette score for evaluating clustering quality.
//!
//! The silhouette score measures how similar a voyage is to its own cluster
//! compared to other clusters. Values range from -1 (poor) to +1 (perfect).
//! Noise voyages take no part in the score.

use fairway_dtw::DistanceMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;
use crate::label::ClusterLabel;
use crate::result::ClusterResult;

/// Silhouette score for a single clustered voyage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSilhouette {
    /// Voyage index in the distance matrix.
    pub index: usize,
    /// Cluster the voyage belongs to.
    pub cluster: ClusterLabel,
    /// Mean intra-cluster distance (a(i)).
    pub a: f64,
    /// Mean nearest-cluster distance (b(i)).
    pub b: f64,
    /// Silhouette coefficient: (b - a) / max(a, b). In [-1, 1].
    pub score: f64,
}

/// Result of silhouette score computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilhouetteScore {
    /// Per-voyage scores for every non-noise voyage, in index order.
    pub per_sample: Vec<SampleSilhouette>,
    /// Mean score across all non-noise voyages.
    pub mean_score: f64,
    /// Mean score per cluster, indexed by label.
    pub per_cluster: Vec<f64>,
}

/// Compute silhouette scores for a clustering of `matrix`.
///
/// For each clustered voyage `i`:
/// - `a(i)` = mean distance from `i` to the other members of its cluster
/// - `b(i)` = min over other clusters c of the mean distance from `i` to members of c
/// - `s(i)` = `(b(i) - a(i)) / max(a(i), b(i))`, and 0 for singleton clusters
///
/// Per-voyage computation is parallelized with rayon.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ClusterError::LengthMismatch`] | `result` and `matrix` describe different voyage counts |
/// | [`ClusterError::SingleCluster`] | Fewer than 2 clusters |
pub fn silhouette(
    matrix: &DistanceMatrix,
    result: &ClusterResult,
) -> Result<SilhouetteScore, ClusterError> {
    if result.len() != matrix.len() {
        return Err(ClusterError::LengthMismatch {
            assignments: result.len(),
            matrix: matrix.len(),
        });
    }
    let k = result.n_clusters();
    let members: Vec<Vec<usize>> = (0..k)
        .map(|c| result.members(ClusterLabel::new(c)))
        .collect();
    let n_nonempty = members.iter().filter(|g| !g.is_empty()).count();
    if n_nonempty < 2 {
        return Err(ClusterError::SingleCluster {
            n_clusters: n_nonempty,
        });
    }
    let mean_distance = |i: usize, group: &[usize]| {
        group.iter().map(|&j| matrix.get(i, j).value()).sum::<f64>() / group.len() as f64
    };

    let per_sample: Vec<SampleSilhouette> = result
        .assignments
        .par_iter()
        .enumerate()
        .filter_map(|(i, a)| a.label().map(|label| (i, label)))
        .map(|(i, cluster)| {
            let own = &members[cluster.index()];
            if own.len() <= 1 {
                return SampleSilhouette {
                    index: i,
                    cluster,
                    a: 0.0,
                    b: 0.0,
                    score: 0.0,
                };
            }

            let a = own
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| matrix.get(i, j).value())
                .sum::<f64>()
                / (own.len() - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != cluster.index() && !members[c].is_empty())
                .map(|c| mean_distance(i, &members[c]))
                .fold(f64::INFINITY, f64::min);

            let score = if a.max(b) == 0.0 { 0.0 } else { (b - a) / a.max(b) };
            SampleSilhouette {
                index: i,
                cluster,
                a,
                b,
                score,
            }
        })
        .collect();

    let mean_score = per_sample.iter().map(|s| s.score).sum::<f64>() / per_sample.len() as f64;
    let per_cluster = members
        .iter()
        .map(|group| {
            if group.is_empty() {
                return 0.0;
            }
            let sum: f64 = per_sample
                .iter()
                .filter(|s| group.binary_search(&s.index).is_ok())
                .map(|s| s.score)
                .sum();
            sum / group.len() as f64
        })
        .collect();

    Ok(SilhouetteScore {
        per_sample,
        mean_score,
        per_cluster,
    })
}
