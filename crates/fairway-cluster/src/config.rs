//! Configuration builder for DBSCAN clustering.

use fairway_dtw::{DistanceMatrix, DtwDistance};
use tracing::{info, instrument};

use crate::dbscan;
use crate::error::ClusterError;
use crate::label::Assignment;
use crate::result::ClusterResult;

/// Configuration for DBSCAN over a precomputed distance matrix.
///
/// Construct via [`DbscanConfig::new`], then chain `with_*` methods to override defaults.
///
/// # Defaults
///
/// | Parameter    | Default |
/// |--------------|---------|
/// | `min_points` | 4       |
///
/// `min_points` counts *other* voyages: a voyage is core when at least
/// `min_points` others lie within `eps`, so the default matches a
/// `min_samples` of 5 in implementations that count the point itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanConfig {
    eps: f64,
    min_points: usize,
}

impl DbscanConfig {
    /// Create a new configuration with neighbourhood radius `eps`, in DTW-distance units.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ClusterError::InvalidEpsilon`] | `eps` is not finite or not positive |
    pub fn new(eps: f64) -> Result<Self, ClusterError> {
        if !(eps.is_finite() && eps > 0.0) {
            return Err(ClusterError::InvalidEpsilon { eps });
        }
        Ok(Self { eps, min_points: 4 })
    }

    /// Set how many other voyages must lie within `eps` for a voyage to be core.
    #[must_use]
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Return the neighbourhood radius.
    #[must_use]
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Return the core-point threshold.
    #[must_use]
    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// Cluster the voyages described by `matrix`.
    ///
    /// Deterministic: the same matrix and parameters always produce the
    /// same labels, with cluster IDs numbered in order of their lowest
    /// core voyage index.
    #[must_use]
    #[instrument(skip_all, fields(n = matrix.len(), eps = self.eps, min_points = self.min_points))]
    pub fn fit(&self, matrix: &DistanceMatrix) -> ClusterResult {
        let (assignments, core) = dbscan::run(matrix, self.eps, self.min_points);
        let result = ClusterResult { assignments, core };
        info!(
            clusters = result.n_clusters(),
            noise = result.noise_count(),
            "DBSCAN complete"
        );
        result
    }

    /// Assign a new voyage against an already clustered set.
    ///
    /// `distances[k]` is the DTW distance from the new voyage to voyage `k`
    /// of `base`. The new voyage is appended to the matrix and the whole
    /// set is refit, so the returned label is relative to that refit; a new
    /// voyage can bridge two existing clusters.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ClusterError::Matrix`] | `distances.len()` differs from the matrix size |
    pub fn predict(
        &self,
        base: &DistanceMatrix,
        distances: &[DtwDistance],
    ) -> Result<Assignment, ClusterError> {
        let extended = base.extended(distances)?;
        let (assignments, _) = dbscan::run(&extended, self.eps, self.min_points);
        Ok(assignments.last().copied().unwrap_or(Assignment::Noise))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(xs: &[f64]) -> DistanceMatrix {
        let dense: Vec<Vec<f64>> = xs
            .iter()
            .map(|a| xs.iter().map(|b| (a - b).abs()).collect())
            .collect();
        DistanceMatrix::from_dense(&dense).unwrap()
    }

    fn distances_to(xs: &[f64], x: f64) -> Vec<DtwDistance> {
        xs.iter()
            .map(|b| DtwDistance::try_new((x - b).abs()).unwrap())
            .collect()
    }

    #[test]
    fn rejects_bad_eps() {
        for eps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                DbscanConfig::new(eps),
                Err(ClusterError::InvalidEpsilon { .. })
            ));
        }
    }

    #[test]
    fn defaults() {
        let config = DbscanConfig::new(12.0).unwrap();
        assert_eq!(config.eps(), 12.0);
        assert_eq!(config.min_points(), 4);
    }

    #[test]
    fn fit_is_deterministic() {
        let m = line(&[0.0, 0.3, 5.0, 5.2, 5.4, 9.0, 0.6]);
        let config = DbscanConfig::new(0.5).unwrap().with_min_points(1);
        let first = config.fit(&m);
        let second = config.fit(&m);
        assert_eq!(first, second);
        assert_eq!(first.partition(), vec![vec![0, 1, 6], vec![2, 3, 4]]);
        assert_eq!(first.noise(), vec![5]);
    }

    #[test]
    fn predict_joins_nearby_cluster() {
        let xs = [0.0, 0.3, 0.6, 10.0, 10.2];
        let base = line(&xs);
        let config = DbscanConfig::new(0.5).unwrap().with_min_points(1);

        let near = config.predict(&base, &distances_to(&xs, 0.4)).unwrap();
        assert_eq!(near, config.fit(&base).assignments[0]);

        let far = config.predict(&base, &distances_to(&xs, 50.0)).unwrap();
        assert_eq!(far, Assignment::Noise);
    }

    #[test]
    fn predict_rejects_wrong_length() {
        let base = line(&[0.0, 1.0]);
        let config = DbscanConfig::new(0.5).unwrap();
        assert!(matches!(
            config.predict(&base, &distances_to(&[0.0], 0.1)),
            Err(ClusterError::Matrix(_))
        ));
    }
}
