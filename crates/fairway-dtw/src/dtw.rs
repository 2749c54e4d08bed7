//! DTW distance computation.

use tracing::instrument;

use crate::constraint::BandConstraint;
use crate::cost::LocalCost;
use crate::distance::DtwDistance;
use crate::error::DtwError;
use crate::path::{WarpingPath, WarpingStep};

/// Immutable DTW configuration. Thread-safe and copyable.
///
/// The accumulated cost is the plain sum of local costs along the optimal
/// monotone path from `(0, 0)` to `(n-1, m-1)`; no square root is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dtw {
    constraint: BandConstraint,
}

impl Dtw {
    /// Create an unconstrained DTW calculator.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self {
            constraint: BandConstraint::Unconstrained,
        }
    }

    /// Create a DTW calculator with a Sakoe-Chiba band constraint.
    #[must_use]
    pub fn with_sakoe_chiba(radius: usize) -> Self {
        Self {
            constraint: BandConstraint::SakoeChibaRadius(radius),
        }
    }

    /// Create a DTW calculator from an existing [`BandConstraint`].
    #[must_use]
    pub fn from_constraint(constraint: BandConstraint) -> Self {
        Self { constraint }
    }

    /// Return the band constraint configuration.
    #[must_use]
    pub fn constraint(&self) -> BandConstraint {
        self.constraint
    }

    /// Compute the DTW distance between two point sequences.
    ///
    /// Uses a rolling two-row buffer rather than the full cost matrix. Runs
    /// in O(n * bw) time and O(bw) space, where `bw` is the band width.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::EmptyTrajectory`] | `a` (index 0) or `b` (index 1) is empty |
    /// | [`DtwError::InvalidLocalCost`] | `cost` returned a negative or non-finite value |
    #[instrument(level = "trace", skip_all, fields(n = a.len(), m = b.len()))]
    pub fn distance<P, C>(&self, a: &[P], b: &[P], cost: &C) -> Result<DtwDistance, DtwError>
    where
        C: LocalCost<P> + ?Sized,
    {
        check_non_empty(a, b)?;
        let dist = self.rolling(a, b, cost)?;
        Ok(DtwDistance::new(dist))
    }

    /// Compute the DTW distance and the optimal warping path.
    ///
    /// Allocates the full banded cost matrix and a direction array for
    /// traceback. Ties prefer the diagonal, then the step from above.
    ///
    /// # Errors
    ///
    /// Same conditions as [`distance`](Self::distance).
    #[instrument(level = "trace", skip_all, fields(n = a.len(), m = b.len()))]
    pub fn align<P, C>(
        &self,
        a: &[P],
        b: &[P],
        cost: &C,
    ) -> Result<(DtwDistance, WarpingPath), DtwError>
    where
        C: LocalCost<P> + ?Sized,
    {
        check_non_empty(a, b)?;
        let (dist, steps) = self.full_band(a, b, cost)?;
        Ok((DtwDistance::new(dist), WarpingPath::new(steps)))
    }

    /// Rolling two-row buffer DTW.
    ///
    /// Each row buffer has `bw + 2` slots. Index 0 is the left sentinel (INF);
    /// active columns of row `i` occupy `j - start_i + 1`. Reads that fall
    /// outside the previous row's band resolve to INF.
    fn rolling<P, C>(&self, a: &[P], b: &[P], cost: &C) -> Result<f64, DtwError>
    where
        C: LocalCost<P> + ?Sized,
    {
        let n = a.len();
        let m = b.len();

        let bw = self.constraint.band_width(n, m);
        let buf_width = bw + 2;

        let mut prev = vec![f64::INFINITY; buf_width];
        let mut curr = vec![f64::INFINITY; buf_width];
        let mut prev_start = 0usize;

        for i in 0..n {
            curr.fill(f64::INFINITY);
            let cols = self.constraint.column_range(i, n, m);
            let curr_start = cols.start;

            for j in cols {
                let c = local_cost(cost, a, b, i, j)?;
                let cj = j - curr_start + 1;

                if i == 0 && j == 0 {
                    curr[cj] = c;
                    continue;
                }

                let left = curr[cj - 1];
                let (above, diag) = if i > 0 {
                    (
                        prev_slot(&prev, j, prev_start),
                        j.checked_sub(1)
                            .map_or(f64::INFINITY, |d| prev_slot(&prev, d, prev_start)),
                    )
                } else {
                    (f64::INFINITY, f64::INFINITY)
                };

                curr[cj] = c + diag.min(above).min(left);
            }

            prev_start = curr_start;
            std::mem::swap(&mut prev, &mut curr);
        }

        // After the final swap, `prev` holds the last completed row.
        Ok(prev[(m - 1) - prev_start + 1])
    }

    /// Full banded cost matrix DTW with traceback.
    ///
    /// Direction bits: 0 = diagonal, 1 = above, 2 = left. Cell `(i, j)` maps
    /// to flat index `i * bw + (j - start_i)`.
    fn full_band<P, C>(
        &self,
        a: &[P],
        b: &[P],
        cost: &C,
    ) -> Result<(f64, Vec<WarpingStep>), DtwError>
    where
        C: LocalCost<P> + ?Sized,
    {
        let n = a.len();
        let m = b.len();
        let bw = self.constraint.band_width(n, m);

        let mut acc = vec![f64::INFINITY; n * bw];
        let mut dirs = vec![0u8; n * bw];
        let mut prev_cols = 0..0;

        for i in 0..n {
            let cols = self.constraint.column_range(i, n, m);

            for j in cols.clone() {
                let c = local_cost(cost, a, b, i, j)?;
                let idx = i * bw + (j - cols.start);

                if i == 0 && j == 0 {
                    acc[idx] = c;
                    continue;
                }

                let at_prev = |col: usize| {
                    if prev_cols.contains(&col) {
                        acc[(i - 1) * bw + (col - prev_cols.start)]
                    } else {
                        f64::INFINITY
                    }
                };
                let diag = if i > 0 && j > 0 { at_prev(j - 1) } else { f64::INFINITY };
                let above = if i > 0 { at_prev(j) } else { f64::INFINITY };
                let left = if j > cols.start { acc[idx - 1] } else { f64::INFINITY };

                let (best, dir) = if diag <= above && diag <= left {
                    (diag, 0u8)
                } else if above <= left {
                    (above, 1u8)
                } else {
                    (left, 2u8)
                };
                acc[idx] = c + best;
                dirs[idx] = dir;
            }

            prev_cols = cols;
        }

        let mut path = Vec::with_capacity(n + m);
        let (mut i, mut j) = (n - 1, m - 1);
        loop {
            path.push(WarpingStep { a: i, b: j });
            if i == 0 && j == 0 {
                break;
            }
            let start = self.constraint.column_range(i, n, m).start;
            match dirs[i * bw + (j - start)] {
                0 => {
                    i -= 1;
                    j -= 1;
                }
                1 => i -= 1,
                _ => j -= 1,
            }
        }
        path.reverse();

        let last_start = self.constraint.column_range(n - 1, n, m).start;
        Ok((acc[(n - 1) * bw + (m - 1 - last_start)], path))
    }
}

fn check_non_empty<P>(a: &[P], b: &[P]) -> Result<(), DtwError> {
    if a.is_empty() {
        return Err(DtwError::EmptyTrajectory { index: 0 });
    }
    if b.is_empty() {
        return Err(DtwError::EmptyTrajectory { index: 1 });
    }
    Ok(())
}

fn local_cost<P, C>(cost: &C, a: &[P], b: &[P], i: usize, j: usize) -> Result<f64, DtwError>
where
    C: LocalCost<P> + ?Sized,
{
    let value = cost.cost(&a[i], &b[j]);
    if !(value.is_finite() && value >= 0.0) {
        return Err(DtwError::InvalidLocalCost { a: i, b: j, value });
    }
    Ok(value)
}

/// Read column `col` from a rolling row whose band starts at `start`.
fn prev_slot(row: &[f64], col: usize, start: usize) -> f64 {
    (col + 1)
        .checked_sub(start)
        .and_then(|slot| row.get(slot))
        .copied()
        .unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }

    #[test]
    fn identical_sequences_distance_zero() {
        let a = [1.0, 2.0, 3.0];
        let d = Dtw::unconstrained().distance(&a, &a, &abs).unwrap();
        assert!(d.value().abs() < 1e-10);
    }

    #[test]
    fn hand_computed_2x2() {
        // a=[0,1], b=[1,0]
        // C[0][0] = 1, C[0][1] = 0 + 1, C[1][0] = 0 + 1
        // C[1][1] = 1 + min(1, 1, 1) = 2
        let d = Dtw::unconstrained()
            .distance(&[0.0, 1.0], &[1.0, 0.0], &abs)
            .unwrap();
        assert!((d.value() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn single_point_pair_is_local_cost() {
        let d = Dtw::unconstrained().distance(&[5.0], &[3.0], &abs).unwrap();
        assert!((d.value() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn single_point_against_many_sums_costs() {
        let d = Dtw::with_sakoe_chiba(0)
            .distance(&[0.0], &[1.0, 2.0, 3.0], &abs)
            .unwrap();
        assert!((d.value() - 6.0).abs() < 1e-10);
    }

    #[test]
    fn band_constraint_forces_diagonal_on_constant_offset() {
        let d = Dtw::with_sakoe_chiba(0)
            .distance(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0], &abs)
            .unwrap();
        assert!((d.value() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn band_distance_geq_unconstrained() {
        let a = [0.0, 1.0, 0.0, 1.0, 0.0];
        let b = [1.0, 0.0, 1.0, 0.0, 1.0];
        let free = Dtw::unconstrained().distance(&a, &b, &abs).unwrap();
        let banded = Dtw::with_sakoe_chiba(1).distance(&a, &b, &abs).unwrap();
        assert!(banded.value() >= free.value() - 1e-10);
    }

    #[test]
    fn banded_unequal_lengths_reach_end() {
        let a = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let b = [0.0, 4.5, 9.0];
        for radius in 0..3 {
            let dtw = Dtw::with_sakoe_chiba(radius);
            let d = dtw.distance(&a, &b, &abs).unwrap();
            assert!(d.value().is_finite());
            let (d_path, path) = dtw.align(&a, &b, &abs).unwrap();
            assert!((d.value() - d_path.value()).abs() < 1e-10);
            assert_eq!(path.steps().last(), Some(&WarpingStep { a: 9, b: 2 }));
        }
    }

    #[test]
    fn duplicated_point_costs_nothing() {
        let a = [1.0, 4.0, 2.0, 7.0];
        let b = [1.0, 4.0, 4.0, 2.0, 7.0];
        let d = Dtw::unconstrained().distance(&a, &b, &abs).unwrap();
        assert_eq!(d.value(), 0.0);
    }

    #[test]
    fn symmetric_for_symmetric_cost() {
        let a = [1.0, 3.0, 5.0, 2.0];
        let b = [2.0, 4.0, 1.0];
        let ab = Dtw::unconstrained().distance(&a, &b, &abs).unwrap();
        let ba = Dtw::unconstrained().distance(&b, &a, &abs).unwrap();
        assert!((ab.value() - ba.value()).abs() < 1e-10);
    }

    #[test]
    fn warping_path_endpoints() {
        let (_, path) = Dtw::unconstrained()
            .align(&[1.0, 2.0, 3.0, 4.0], &[1.0, 3.0, 4.0], &abs)
            .unwrap();
        let steps = path.steps();
        assert_eq!(steps.first().unwrap(), &WarpingStep { a: 0, b: 0 });
        assert_eq!(steps.last().unwrap(), &WarpingStep { a: 3, b: 2 });
    }

    #[test]
    fn distance_matches_align() {
        let a = [1.0, 3.0, 5.0, 2.0];
        let b = [2.0, 4.0, 1.0];
        let dtw = Dtw::unconstrained();
        let only = dtw.distance(&a, &b, &abs).unwrap();
        let (with_path, _) = dtw.align(&a, &b, &abs).unwrap();
        assert!((only.value() - with_path.value()).abs() < 1e-10);
    }

    #[test]
    fn warping_path_continuity() {
        let (_, path) = Dtw::unconstrained()
            .align(&[1.0, 5.0, 2.0, 8.0, 3.0], &[2.0, 4.0, 7.0], &abs)
            .unwrap();
        for pair in path.steps().windows(2) {
            let da = pair[1].a - pair[0].a;
            let db = pair[1].b - pair[0].b;
            assert!(da <= 1 && db <= 1);
            assert!(da + db >= 1, "path must advance");
        }
    }

    #[test]
    fn path_cost_sums_to_distance() {
        let a = [1.0, 5.0, 2.0, 8.0, 3.0];
        let b = [2.0, 4.0, 7.0];
        let (d, path) = Dtw::unconstrained().align(&a, &b, &abs).unwrap();
        let along: f64 = path.steps().iter().map(|s| abs(&a[s.a], &b[s.b])).sum();
        assert!((d.value() - along).abs() < 1e-10);
    }

    #[test]
    fn empty_input_rejected() {
        let empty: [f64; 0] = [];
        assert!(matches!(
            Dtw::unconstrained().distance(&empty, &[1.0], &abs),
            Err(DtwError::EmptyTrajectory { index: 0 })
        ));
        assert!(matches!(
            Dtw::unconstrained().align(&[1.0], &empty, &abs),
            Err(DtwError::EmptyTrajectory { index: 1 })
        ));
    }

    #[test]
    fn invalid_local_cost_rejected() {
        let broken = |a: &f64, b: &f64| if a == b { f64::NAN } else { 1.0 };
        let err = Dtw::unconstrained()
            .distance(&[0.0, 1.0], &[2.0, 1.0], &broken)
            .unwrap_err();
        assert!(matches!(err, DtwError::InvalidLocalCost { a: 1, b: 1, .. }));

        let negative = |_: &f64, _: &f64| -1.0;
        assert!(Dtw::unconstrained().align(&[0.0], &[0.0], &negative).is_err());
    }
}
