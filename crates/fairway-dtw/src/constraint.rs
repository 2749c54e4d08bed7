//! Band constraint types for DTW computation.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Constraint on the DTW warping window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandConstraint {
    /// No constraint: the full cost matrix is computed.
    #[default]
    Unconstrained,

    /// Sakoe-Chiba corridor of the given radius around the diagonal.
    ///
    /// The diagonal is scaled to the two trajectory lengths, so row `i`
    /// centres on column `i * (m - 1) / (n - 1)`. Each row also reaches far
    /// enough right to touch the next row's centre, which keeps the end cell
    /// reachable when the lengths differ. For equal lengths this is the
    /// classic `|i - j| <= radius` band.
    SakoeChibaRadius(usize),
}

impl BandConstraint {
    /// Return the valid column range for `row` of an `n_rows` by `n_cols` cost matrix.
    #[must_use]
    pub fn column_range(&self, row: usize, n_rows: usize, n_cols: usize) -> Range<usize> {
        match *self {
            Self::Unconstrained => 0..n_cols,
            Self::SakoeChibaRadius(r) => {
                if n_rows <= 1 || n_cols == 0 {
                    return 0..n_cols;
                }
                let centre = |i: usize| i * (n_cols - 1) / (n_rows - 1);
                let c = centre(row);
                let reach = if row + 1 < n_rows {
                    centre(row + 1).saturating_sub(1)
                } else {
                    c
                };
                let start = c.saturating_sub(r);
                let end = (c + r).max(reach).min(n_cols - 1) + 1;
                start..end
            }
        }
    }

    /// Return the widest row of the banded cost matrix.
    ///
    /// For unconstrained DTW this is `n_cols`.
    #[must_use]
    pub fn band_width(&self, n_rows: usize, n_cols: usize) -> usize {
        match self {
            Self::Unconstrained => n_cols,
            Self::SakoeChibaRadius(_) => (0..n_rows)
                .map(|i| self.column_range(i, n_rows, n_cols).len())
                .max()
                .unwrap_or(0),
        }
    }
}
