//! Result type for DBSCAN clustering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::label::{Assignment, ClusterLabel};

/// Result of a DBSCAN run over `n` voyages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// Assignment for each voyage, in matrix order.
    pub assignments: Vec<Assignment>,
    /// Whether each voyage is a core point.
    pub core: Vec<bool>,
}

impl ClusterResult {
    /// Return the number of voyages clustered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Return true if no voyages were clustered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Return the number of clusters found (noise excluded).
    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.assignments
            .iter()
            .filter_map(|a| a.label())
            .map(|l| l.index() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Return the number of voyages in each cluster, indexed by label.
    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_clusters()];
        for label in self.assignments.iter().filter_map(|a| a.label()) {
            sizes[label.index()] += 1;
        }
        sizes
    }

    /// Return the indices of all voyages assigned to `label`.
    #[must_use]
    pub fn members(&self, label: ClusterLabel) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| (a.label() == Some(label)).then_some(i))
            .collect()
    }

    /// Return the indices of all noise voyages.
    #[must_use]
    pub fn noise(&self) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.is_noise().then_some(i))
            .collect()
    }

    /// Return the number of noise voyages.
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.is_noise()).count()
    }

    /// Map each cluster size to how many clusters have that size.
    #[must_use]
    pub fn size_histogram(&self) -> BTreeMap<usize, usize> {
        let mut histogram = BTreeMap::new();
        for size in self.cluster_sizes() {
            *histogram.entry(size).or_insert(0) += 1;
        }
        histogram
    }

    /// Return the clusters as groups of voyage indices, independent of label values.
    ///
    /// Each group is sorted and groups are ordered by their smallest index,
    /// so two results describe the same grouping exactly when their
    /// partitions are equal. Noise is not part of any group.
    #[must_use]
    pub fn partition(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); self.n_clusters()];
        for (i, label) in self.assignments.iter().enumerate() {
            if let Some(label) = label.label() {
                groups[label.index()].push(i);
            }
        }
        groups.retain(|g| !g.is_empty());
        groups.sort_by_key(|g| g[0]);
        groups
    }

    /// Flag every noise voyage as anomalous.
    #[must_use]
    pub fn anomaly_flags(&self) -> Vec<bool> {
        self.assignments.iter().map(|a| a.is_noise()).collect()
    }
}
