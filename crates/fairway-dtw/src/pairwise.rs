//! All-pairs DTW distances on a fixed worker pool.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use fairway_track::{CompressedTrajectory, TrackPoint};
use tracing::{info, instrument};

use crate::cancel::Cancellation;
use crate::cost::LocalCost;
use crate::distance::DtwDistance;
use crate::dtw::Dtw;
use crate::error::DtwError;
use crate::matrix::DistanceMatrix;

/// Computes the full symmetric DTW distance matrix for a set of trajectories.
///
/// Only the `N*(N-1)/2` unique pairs are aligned; the diagonal is zero by
/// construction. Pairs are split into contiguous chunks of the condensed
/// storage and each chunk is handed to one task on a dedicated rayon pool,
/// so no two workers ever write the same cell.
///
/// Cost is O(N² · L²) for N trajectories of typical length L (less with a
/// band constraint), which dominates a pipeline run.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | DTW | [`Dtw::unconstrained`] |
/// | workers | 0 (one per logical core) |
/// | chunk size | pairs / (4 × workers), at least 1 |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairwiseBuilder {
    dtw: Dtw,
    workers: usize,
    chunk_size: Option<usize>,
}

impl PairwiseBuilder {
    /// Create a builder around `dtw`.
    #[must_use]
    pub fn new(dtw: Dtw) -> Self {
        Self {
            dtw,
            ..Self::default()
        }
    }

    /// Set the worker count. Zero means one worker per logical core.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set how many pairs a single task computes. Zero is treated as one.
    #[must_use]
    pub fn with_chunk_size(mut self, pairs: usize) -> Self {
        self.chunk_size = Some(pairs.max(1));
        self
    }

    /// Return the DTW configuration.
    #[must_use]
    pub fn dtw(&self) -> Dtw {
        self.dtw
    }

    /// Build the distance matrix for compressed trajectories.
    ///
    /// Row and column `k` of the result belong to `trajectories[k]`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`build_sequences`](Self::build_sequences).
    pub fn build<C>(
        &self,
        trajectories: &[CompressedTrajectory],
        cost: &C,
        cancel: &Cancellation,
    ) -> Result<DistanceMatrix, DtwError>
    where
        C: LocalCost<TrackPoint>,
    {
        let sequences: Vec<&[TrackPoint]> = trajectories.iter().map(|t| t.points()).collect();
        self.build_sequences(&sequences, cost, cancel)
    }

    /// Build the distance matrix for arbitrary point sequences.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::EmptyTrajectory`] | a sequence has no points |
    /// | [`DtwError::Pair`] | an alignment failed, e.g. an invalid local cost |
    /// | [`DtwError::WorkerPool`] | the worker pool could not be started |
    /// | [`DtwError::Cancelled`] | `cancel` was raised before every pair finished |
    #[instrument(skip_all, fields(n = sequences.len()))]
    pub fn build_sequences<P, C>(
        &self,
        sequences: &[&[P]],
        cost: &C,
        cancel: &Cancellation,
    ) -> Result<DistanceMatrix, DtwError>
    where
        P: Sync,
        C: LocalCost<P>,
    {
        let n = sequences.len();
        if let Some(index) = sequences.iter().position(|s| s.is_empty()) {
            return Err(DtwError::EmptyTrajectory { index });
        }

        let total = n * n.saturating_sub(1) / 2;
        let mut data = vec![DtwDistance::ZERO; total];
        if total == 0 {
            return Ok(DistanceMatrix::from_raw(n, data));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("fairway-dtw-{i}"))
            .build()
            .map_err(|source| DtwError::WorkerPool { source })?;
        let workers = pool.current_num_threads();
        let chunk = self
            .chunk_size
            .unwrap_or_else(|| total.div_ceil(workers * 4))
            .max(1);

        let started = Instant::now();
        let completed = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let mut failures: Vec<Option<DtwError>> = (0..total.div_ceil(chunk)).map(|_| None).collect();

        pool.scope(|scope| {
            for (k, (cells, failure)) in data.chunks_mut(chunk).zip(failures.iter_mut()).enumerate() {
                let (completed, abort) = (&completed, &abort);
                scope.spawn(move |_| {
                    let first = k * chunk;
                    for (offset, cell) in cells.iter_mut().enumerate() {
                        if abort.load(Ordering::Relaxed) || cancel.is_cancelled() {
                            return;
                        }
                        let (i, j) = pair_of(first + offset);
                        match self.dtw.distance(sequences[j], sequences[i], cost) {
                            Ok(d) => *cell = d,
                            Err(source) => {
                                *failure = Some(DtwError::Pair {
                                    i: j,
                                    j: i,
                                    source: Box::new(source),
                                });
                                abort.store(true, Ordering::Relaxed);
                                return;
                            }
                        }
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        if let Some(err) = failures.into_iter().flatten().next() {
            return Err(err);
        }
        let completed = completed.into_inner();
        if completed < total {
            return Err(DtwError::Cancelled { completed, total });
        }

        info!(
            n,
            pairs = total,
            workers,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pairwise DTW complete"
        );
        Ok(DistanceMatrix::from_raw(n, data))
    }
}

/// Map a condensed index to `(row, col)` with `row > col`.
///
/// Solves `flat = row*(row-1)/2 + col`; the float estimate is corrected so
/// large indices stay exact.
fn pair_of(flat: usize) -> (usize, usize) {
    let mut row = ((1.0 + (1.0 + 8.0 * flat as f64).sqrt()) / 2.0).floor() as usize;
    while row * (row - 1) / 2 > flat {
        row -= 1;
    }
    while (row + 1) * row / 2 <= flat {
        row += 1;
    }
    (row, flat - row * (row - 1) / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }

    fn sequences() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0, 1.0, 2.0],
            vec![5.0, 5.0],
            vec![2.0, 1.0, 0.0],
            vec![3.0],
        ]
    }

    #[test]
    fn pair_of_inverts_layout() {
        let mut flat = 0;
        for row in 1..200 {
            for col in 0..row {
                assert_eq!(pair_of(flat), (row, col));
                flat += 1;
            }
        }
    }

    #[test]
    fn matches_individual_alignments() {
        let owned = sequences();
        let seqs: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let dtw = Dtw::unconstrained();
        let matrix = PairwiseBuilder::new(dtw)
            .with_workers(2)
            .with_chunk_size(1)
            .build_sequences(&seqs, &abs, &Cancellation::new())
            .unwrap();

        assert_eq!(matrix.len(), seqs.len());
        for i in 0..seqs.len() {
            assert_eq!(matrix.get(i, i), DtwDistance::ZERO);
            for j in 0..i {
                let expected = dtw.distance(seqs[j], seqs[i], &abs).unwrap();
                assert!((matrix.get(i, j).value() - expected.value()).abs() < 1e-12);
            }
        }
        // Duplicated point.
        assert_eq!(matrix.get(0, 1).value(), 0.0);
    }

    #[test]
    fn worker_count_does_not_change_result() {
        let owned = sequences();
        let seqs: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let one = PairwiseBuilder::default()
            .with_workers(1)
            .build_sequences(&seqs, &abs, &Cancellation::new())
            .unwrap();
        let four = PairwiseBuilder::default()
            .with_workers(4)
            .with_chunk_size(3)
            .build_sequences(&seqs, &abs, &Cancellation::new())
            .unwrap();
        assert_eq!(one, four);
    }

    #[test]
    fn trivial_sizes() {
        let empty: Vec<&[f64]> = Vec::new();
        let m = PairwiseBuilder::default()
            .build_sequences(&empty, &abs, &Cancellation::new())
            .unwrap();
        assert!(m.is_empty());

        let owned = [vec![1.0, 2.0]];
        let one: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let m = PairwiseBuilder::default()
            .build_sequences(&one, &abs, &Cancellation::new())
            .unwrap();
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn empty_sequence_rejected() {
        let owned = [vec![1.0], Vec::new(), vec![2.0]];
        let seqs: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        assert!(matches!(
            PairwiseBuilder::default().build_sequences(&seqs, &abs, &Cancellation::new()),
            Err(DtwError::EmptyTrajectory { index: 1 })
        ));
    }

    #[test]
    fn pre_cancelled_run_stops() {
        let owned = sequences();
        let seqs: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let cancel = Cancellation::new();
        cancel.cancel();
        let err = PairwiseBuilder::default()
            .build_sequences(&seqs, &abs, &cancel)
            .unwrap_err();
        assert!(matches!(err, DtwError::Cancelled { completed: 0, total: 10 }));
    }

    #[test]
    fn invalid_cost_reports_pair() {
        let owned = sequences();
        let seqs: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let picky = |a: &f64, b: &f64| if *a == 3.0 || *b == 3.0 { f64::INFINITY } else { 0.0 };
        let err = PairwiseBuilder::default()
            .with_workers(1)
            .build_sequences(&seqs, &picky, &Cancellation::new())
            .unwrap_err();
        match err {
            DtwError::Pair { j, source, .. } => {
                assert_eq!(j, 4);
                assert!(matches!(*source, DtwError::InvalidLocalCost { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
