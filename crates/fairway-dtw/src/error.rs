//! Error types for DTW computation and distance matrices.

/// Errors from DTW alignment, local costs, and matrix construction.
#[derive(Debug, thiserror::Error)]
pub enum DtwError {
    /// Returned when a trajectory has no points.
    #[error("trajectory {index} is empty; every trajectory needs at least one point")]
    EmptyTrajectory {
        /// Position of the empty trajectory in the input.
        index: usize,
    },

    /// Returned when the local cost function yields a negative or non-finite value.
    #[error("local cost between points {a} and {b} is {value}; costs must be finite and non-negative")]
    InvalidLocalCost {
        /// Point index in the first trajectory.
        a: usize,
        /// Point index in the second trajectory.
        b: usize,
        /// The offending cost.
        value: f64,
    },

    /// Returned when a DTW alignment inside a pairwise computation fails.
    #[error("DTW failed between trajectories {i} and {j}")]
    Pair {
        /// Row trajectory index.
        i: usize,
        /// Column trajectory index.
        j: usize,
        /// The underlying failure.
        #[source]
        source: Box<DtwError>,
    },

    /// Returned when a cost weight is negative or non-finite.
    #[error("{name} weight must be finite and non-negative, got {value}")]
    InvalidWeight {
        /// Which weight was rejected.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Returned when every cost weight is zero, which would make all voyages identical.
    #[error("at least one cost weight must be positive")]
    ZeroWeights,

    /// Returned when a distance is negative or non-finite.
    #[error("distance must be finite and non-negative, got {value}")]
    InvalidDistance {
        /// The rejected value.
        value: f64,
    },

    /// Returned when a dense matrix row has the wrong length.
    #[error("matrix row {row} has {len} entries, expected {expected}")]
    NonSquareMatrix {
        /// Offending row.
        row: usize,
        /// Its length.
        len: usize,
        /// Number of rows.
        expected: usize,
    },

    /// Returned when a dense matrix is not symmetric.
    #[error("matrix is asymmetric at ({i}, {j}): {upper} vs {lower}")]
    AsymmetricMatrix {
        /// Row index.
        i: usize,
        /// Column index.
        j: usize,
        /// Value at `(i, j)`.
        upper: f64,
        /// Value at `(j, i)`.
        lower: f64,
    },

    /// Returned when a dense matrix has a non-zero diagonal entry.
    #[error("matrix diagonal at {index} is {value}, expected 0")]
    NonZeroDiagonal {
        /// Diagonal index.
        index: usize,
        /// The entry found.
        value: f64,
    },

    /// Returned when condensed storage does not hold `n*(n-1)/2` entries.
    #[error("condensed matrix for {n} trajectories needs {expected} entries, got {got}")]
    MatrixLength {
        /// Number of trajectories.
        n: usize,
        /// Expected entry count.
        expected: usize,
        /// Entries supplied.
        got: usize,
    },

    /// Returned when the worker pool cannot be started.
    #[error("failed to start DTW worker pool")]
    WorkerPool {
        /// Underlying rayon error.
        #[source]
        source: rayon::ThreadPoolBuildError,
    },

    /// Returned when the computation is cancelled before every pair is done.
    #[error("pairwise DTW cancelled after {completed} of {total} pairs")]
    Cancelled {
        /// Pairs finished before the abort was observed.
        completed: usize,
        /// Pairs requested.
        total: usize,
    },
}
