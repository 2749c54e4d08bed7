//! Point correspondences found by [`Dtw::align`](crate::Dtw::align).

use serde::{Deserialize, Serialize};

/// Point `a` of the first trajectory matched with point `b` of the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpingStep {
    /// Point index in the first trajectory.
    pub a: usize,
    /// Point index in the second trajectory.
    pub b: usize,
}

impl WarpingStep {
    /// Index offset between the matched points.
    #[must_use]
    pub fn lag(self) -> usize {
        self.a.abs_diff(self.b)
    }
}

/// Monotone correspondence from `(0, 0)` to `(n-1, m-1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpingPath(Vec<WarpingStep>);

impl WarpingPath {
    pub(crate) fn new(steps: Vec<WarpingStep>) -> Self {
        Self(steps)
    }

    #[must_use]
    pub fn steps(&self) -> &[WarpingStep] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Largest index offset along the path.
    ///
    /// A Sakoe-Chiba band of at least this radius admits the same path.
    #[must_use]
    pub fn max_lag(&self) -> usize {
        self.0.iter().map(|s| s.lag()).max().unwrap_or(0)
    }

    /// Points of the second trajectory matched with point `a` of the first.
    pub fn partners_of(&self, a: usize) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().filter(move |s| s.a == a).map(|s| s.b)
    }
}

impl<'a> IntoIterator for &'a WarpingPath {
    type Item = &'a WarpingStep;
    type IntoIter = std::slice::Iter<'a, WarpingStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(pairs: &[(usize, usize)]) -> WarpingPath {
        WarpingPath::new(pairs.iter().map(|&(a, b)| WarpingStep { a, b }).collect())
    }

    #[test]
    fn diagonal_path_has_no_lag() {
        assert_eq!(path(&[(0, 0), (1, 1), (2, 2)]).max_lag(), 0);
        assert_eq!(WarpingPath::new(Vec::new()).max_lag(), 0);
    }

    #[test]
    fn lag_and_partners_follow_the_steps() {
        let p = path(&[(0, 0), (0, 1), (0, 2), (1, 3), (2, 3)]);
        assert_eq!(p.max_lag(), 2);
        assert_eq!(p.partners_of(0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(p.partners_of(2).collect::<Vec<_>>(), vec![3]);
        assert_eq!(p.partners_of(7).count(), 0);
    }
}
