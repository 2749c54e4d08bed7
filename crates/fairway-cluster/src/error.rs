use fairway_dtw::DtwError;

/// Errors from DBSCAN clustering operations.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Returned when the neighbourhood radius is not a positive finite number.
    #[error("clustering epsilon must be finite and positive, got {eps}")]
    InvalidEpsilon {
        /// The rejected radius.
        eps: f64,
    },

    /// Returned when a serialized assignment is neither -1 nor a cluster index.
    #[error("invalid cluster assignment {value}; expected -1 (noise) or a non-negative index")]
    InvalidAssignment {
        /// The rejected value.
        value: i64,
    },

    /// Returned when assignments and matrix describe different voyage counts.
    #[error("{assignments} assignments do not match a distance matrix of size {matrix}")]
    LengthMismatch {
        /// Number of assignments.
        assignments: usize,
        /// Matrix dimension.
        matrix: usize,
    },

    /// Returned when fewer than two clusters are available for a silhouette score.
    #[error("silhouette needs at least 2 clusters, got {n_clusters}")]
    SingleCluster {
        /// Number of non-empty clusters found.
        n_clusters: usize,
    },

    /// Wraps a distance matrix error raised while extending the matrix.
    #[error("distance matrix error: {0}")]
    Matrix(#[from] DtwError),
}
