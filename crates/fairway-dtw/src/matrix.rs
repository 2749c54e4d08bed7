//! Lower-triangular distance matrix for pairwise DTW distances.

use serde::{Deserialize, Serialize};

use crate::distance::DtwDistance;
use crate::error::DtwError;

/// Symmetric distance matrix stored as a lower-triangular flat vector.
///
/// For `n` trajectories, stores `n*(n-1)/2` distances. Access is symmetric:
/// `get(i, j) == get(j, i)`. Diagonal is always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CondensedRepr", into = "CondensedRepr")]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<DtwDistance>,
}

/// On-disk form. Length and values are checked by `from_condensed`.
#[derive(Serialize, Deserialize)]
struct CondensedRepr {
    n: usize,
    data: Vec<DtwDistance>,
}

impl From<DistanceMatrix> for CondensedRepr {
    fn from(m: DistanceMatrix) -> Self {
        Self { n: m.n, data: m.data }
    }
}

impl TryFrom<CondensedRepr> for DistanceMatrix {
    type Error = DtwError;

    fn try_from(repr: CondensedRepr) -> Result<Self, Self::Error> {
        Self::from_condensed(repr.n, repr.data)
    }
}

fn condensed_len(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

fn flat_index(row: usize, col: usize) -> usize {
    row * (row - 1) / 2 + col
}

impl DistanceMatrix {
    /// Create a new distance matrix from pre-computed lower-triangular data.
    ///
    /// `data` must contain exactly `n*(n-1)/2` elements, stored as
    /// `data[row*(row-1)/2 + col]` where `row > col`.
    pub(crate) fn from_raw(n: usize, data: Vec<DtwDistance>) -> Self {
        debug_assert_eq!(data.len(), condensed_len(n));
        Self { n, data }
    }

    /// Create a matrix from lower-triangular storage.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::MatrixLength`] | `data.len() != n*(n-1)/2` |
    /// | [`DtwError::InvalidDistance`] | an entry is negative or non-finite |
    pub fn from_condensed(n: usize, data: Vec<DtwDistance>) -> Result<Self, DtwError> {
        let expected = condensed_len(n);
        if data.len() != expected {
            return Err(DtwError::MatrixLength {
                n,
                expected,
                got: data.len(),
            });
        }
        for d in &data {
            DtwDistance::try_new(d.value())?;
        }
        Ok(Self { n, data })
    }

    /// Create a matrix from a dense `n x n` table.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::NonSquareMatrix`] | a row does not have `n` entries |
    /// | [`DtwError::NonZeroDiagonal`] | a diagonal entry is not zero |
    /// | [`DtwError::InvalidDistance`] | an entry is negative or non-finite |
    /// | [`DtwError::AsymmetricMatrix`] | `dense[i][j] != dense[j][i]` |
    pub fn from_dense(dense: &[Vec<f64>]) -> Result<Self, DtwError> {
        let n = dense.len();
        if let Some((row, r)) = dense.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(DtwError::NonSquareMatrix {
                row,
                len: r.len(),
                expected: n,
            });
        }

        let mut data = Vec::with_capacity(condensed_len(n));
        for i in 0..n {
            if dense[i][i] != 0.0 {
                return Err(DtwError::NonZeroDiagonal {
                    index: i,
                    value: dense[i][i],
                });
            }
            for j in 0..i {
                let (lower, upper) = (dense[i][j], dense[j][i]);
                if lower != upper {
                    return Err(DtwError::AsymmetricMatrix { i: j, j: i, upper, lower });
                }
                data.push(DtwDistance::try_new(lower)?);
            }
        }
        Ok(Self { n, data })
    }

    /// Return the number of trajectories in the matrix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Return true if the matrix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Return the distance between trajectory `i` and trajectory `j`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n` or `j >= n`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> DtwDistance {
        assert!(i < self.n, "row index {i} out of bounds for matrix of size {}", self.n);
        assert!(j < self.n, "column index {j} out of bounds for matrix of size {}", self.n);
        if i == j {
            return DtwDistance::ZERO;
        }
        let (row, col) = if i > j { (i, j) } else { (j, i) };
        self.data[flat_index(row, col)]
    }

    /// Iterate over all unique pairs `(i, j, distance)` where `i > j`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, DtwDistance)> + '_ {
        (1..self.n).flat_map(move |i| (0..i).map(move |j| (i, j, self.data[flat_index(i, j)])))
    }

    /// Return all distances from trajectory `i` to every trajectory, itself included.
    #[must_use]
    pub fn row(&self, i: usize) -> Vec<DtwDistance> {
        (0..self.n).map(|j| self.get(i, j)).collect()
    }

    /// Expand to a dense `n x n` table of raw values.
    #[must_use]
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        (0..self.n)
            .map(|i| self.row(i).into_iter().map(DtwDistance::value).collect())
            .collect()
    }

    /// Return a copy with one more trajectory appended as the last row.
    ///
    /// `distances[k]` is the distance from the new trajectory to trajectory `k`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::MatrixLength`] | `distances.len() != n` |
    pub fn extended(&self, distances: &[DtwDistance]) -> Result<Self, DtwError> {
        if distances.len() != self.n {
            return Err(DtwError::MatrixLength {
                n: self.n + 1,
                expected: condensed_len(self.n + 1),
                got: self.data.len() + distances.len(),
            });
        }
        let mut data = Vec::with_capacity(condensed_len(self.n + 1));
        data.extend_from_slice(&self.data);
        data.extend_from_slice(distances);
        Ok(Self {
            n: self.n + 1,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_matrix() -> DistanceMatrix {
        // Layout: (1,0), (2,0), (2,1), (3,0), (3,1), (3,2)
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0].map(DtwDistance::new).to_vec();
        DistanceMatrix::from_raw(4, data)
    }

    #[test]
    fn diagonal_is_zero() {
        let m = make_matrix();
        for i in 0..4 {
            assert_eq!(m.get(i, i).value(), 0.0);
        }
    }

    #[test]
    fn symmetric_access() {
        let m = make_matrix();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }

    #[test]
    fn specific_values() {
        let m = make_matrix();
        assert_eq!(m.get(1, 0).value(), 1.0);
        assert_eq!(m.get(2, 1).value(), 3.0);
        assert_eq!(m.get(0, 3).value(), 4.0);
        assert_eq!(m.get(3, 2).value(), 6.0);
    }

    #[test]
    fn iter_yields_lower_triangle() {
        let pairs: Vec<_> = make_matrix().iter().collect();
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0], (1, 0, DtwDistance::new(1.0)));
        assert_eq!(pairs[5], (3, 2, DtwDistance::new(6.0)));
    }

    #[test]
    fn row_distances() {
        let row0: Vec<f64> = make_matrix().row(0).iter().map(|d| d.value()).collect();
        assert_eq!(row0, vec![0.0, 1.0, 2.0, 4.0]);
    }

    #[test]
    fn dense_round_trip() {
        let m = make_matrix();
        let back = DistanceMatrix::from_dense(&m.to_dense()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn from_dense_rejects_asymmetry() {
        let dense = vec![vec![0.0, 1.0], vec![2.0, 0.0]];
        assert!(matches!(
            DistanceMatrix::from_dense(&dense),
            Err(DtwError::AsymmetricMatrix { i: 0, j: 1, .. })
        ));
    }

    #[test]
    fn from_dense_rejects_diagonal_and_shape() {
        let diag = vec![vec![0.5, 1.0], vec![1.0, 0.0]];
        assert!(matches!(
            DistanceMatrix::from_dense(&diag),
            Err(DtwError::NonZeroDiagonal { index: 0, .. })
        ));
        let ragged = vec![vec![0.0, 1.0], vec![1.0]];
        assert!(matches!(
            DistanceMatrix::from_dense(&ragged),
            Err(DtwError::NonSquareMatrix { row: 1, len: 1, expected: 2 })
        ));
        let negative = vec![vec![0.0, -1.0], vec![-1.0, 0.0]];
        assert!(matches!(
            DistanceMatrix::from_dense(&negative),
            Err(DtwError::InvalidDistance { .. })
        ));
    }

    #[test]
    fn extended_appends_last_row() {
        let m = make_matrix();
        let new_row = [7.0, 8.0, 9.0, 10.0].map(DtwDistance::new);
        let bigger = m.extended(&new_row).unwrap();
        assert_eq!(bigger.len(), 5);
        assert_eq!(bigger.get(4, 2).value(), 9.0);
        assert_eq!(bigger.get(3, 1), m.get(3, 1));
        assert!(m.extended(&new_row[..2]).is_err());
    }

    #[test]
    fn empty_and_single() {
        let empty = DistanceMatrix::from_condensed(0, Vec::new()).unwrap();
        assert!(empty.is_empty());
        let single = DistanceMatrix::from_condensed(1, Vec::new()).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.get(0, 0), DtwDistance::ZERO);
        assert_eq!(single.iter().count(), 0);
    }

    #[test]
    fn deserialization_validates_length() {
        let json = serde_json::to_string(&make_matrix()).unwrap();
        let back: DistanceMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, make_matrix());

        let broken = r#"{"n":3,"data":[1.0]}"#;
        assert!(serde_json::from_str::<DistanceMatrix>(broken).is_err());
    }

    #[test]
    fn deserialization_rejects_invalid_distances() {
        let negative = r#"{"n":3,"data":[1.0,-2.0,3.0]}"#;
        assert!(serde_json::from_str::<DistanceMatrix>(negative).is_err());
        let nan_bits = bincode::serialize(&(2usize, vec![f64::NAN])).unwrap();
        assert!(bincode::deserialize::<DistanceMatrix>(&nan_bits).is_err());
    }
}
