//! Line simplification of voyages into compressed trajectories.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::TrackError;
use crate::features::{AnnotatedPoint, FeatureAnnotatedVoyage};
use crate::geo::segment_deviation;
use crate::voyage::VoyageId;

/// The projection of an annotated point that downstream distance stages need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Report time.
    pub timestamp: DateTime<Utc>,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Heading in radians, when defined.
    pub heading: Option<f64>,
}

impl TrackPoint {
    /// Return `(longitude, latitude)`, the planar frame used for simplification.
    #[must_use]
    pub fn planar(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }
}

impl From<&AnnotatedPoint> for TrackPoint {
    fn from(point: &AnnotatedPoint) -> Self {
        Self {
            timestamp: point.report.timestamp,
            longitude: point.report.longitude,
            latitude: point.report.latitude,
            heading: point.heading,
        }
    }
}

/// An order-preserving subsequence of a voyage's points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedTrajectory {
    voyage_id: VoyageId,
    points: Vec<TrackPoint>,
}

impl CompressedTrajectory {
    /// Wrap an already simplified point sequence.
    #[must_use]
    pub fn new(voyage_id: VoyageId, points: Vec<TrackPoint>) -> Self {
        Self { voyage_id, points }
    }

    /// Return the identifier of the source voyage.
    #[must_use]
    pub fn voyage_id(&self) -> &VoyageId {
        &self.voyage_id
    }

    /// Return the retained points.
    #[must_use]
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Return the number of retained points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Return true if no point was retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Ramer-Douglas-Peucker simplification in the longitude/latitude plane.
///
/// The first and last points are always kept. Within a segment, the point
/// farthest from the chord is kept when its deviation exceeds `epsilon`
/// (degrees), and both halves are processed again. Ties go to the earliest
/// index. Inputs with fewer than three points, or whose first and last
/// points coincide, are returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryCompressor {
    epsilon: f64,
}

impl TrajectoryCompressor {
    /// Create a compressor with the given tolerance.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::InvalidEpsilon`] | `epsilon` is zero, negative, or non-finite |
    pub fn new(epsilon: f64) -> Result<Self, TrackError> {
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(TrackError::InvalidEpsilon { epsilon });
        }
        Ok(Self { epsilon })
    }

    /// Return the tolerance.
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Return the indices of the points to keep, ascending.
    ///
    /// Segments are processed from an explicit worklist, so stack depth does
    /// not grow with voyage length.
    #[must_use]
    pub fn compress_indices(&self, coords: &[(f64, f64)]) -> Vec<usize> {
        let n = coords.len();
        if n < 3 || coords[0] == coords[n - 1] {
            return (0..n).collect();
        }

        let mut keep = vec![false; n];
        keep[0] = true;
        keep[n - 1] = true;

        let mut worklist = vec![(0, n - 1)];
        while let Some((start, end)) = worklist.pop() {
            if end - start < 2 {
                continue;
            }
            let (a, b) = (coords[start], coords[end]);
            let mut farthest = (start + 1, segment_deviation(coords[start + 1], a, b));
            for (i, &p) in coords.iter().enumerate().take(end).skip(start + 2) {
                let d = segment_deviation(p, a, b);
                if d > farthest.1 {
                    farthest = (i, d);
                }
            }
            if farthest.1 > self.epsilon {
                let split = farthest.0;
                keep[split] = true;
                worklist.push((split, end));
                worklist.push((start, split));
            }
        }

        keep.iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect()
    }

    /// Simplify a point sequence.
    #[must_use]
    pub fn compress_points(&self, points: &[TrackPoint]) -> Vec<TrackPoint> {
        let coords: Vec<(f64, f64)> = points.iter().map(TrackPoint::planar).collect();
        self.compress_indices(&coords)
            .into_iter()
            .map(|i| points[i])
            .collect()
    }

    /// Simplify one annotated voyage.
    #[must_use]
    pub fn compress(&self, voyage: &FeatureAnnotatedVoyage) -> CompressedTrajectory {
        let points: Vec<TrackPoint> = voyage.points().iter().map(TrackPoint::from).collect();
        CompressedTrajectory::new(voyage.id().clone(), self.compress_points(&points))
    }

    /// Simplify an already compressed trajectory again.
    #[must_use]
    pub fn recompress(&self, trajectory: &CompressedTrajectory) -> CompressedTrajectory {
        CompressedTrajectory::new(
            trajectory.voyage_id().clone(),
            self.compress_points(trajectory.points()),
        )
    }

    /// Simplify many voyages in parallel, preserving their order.
    #[instrument(skip_all, fields(n_voyages = voyages.len(), epsilon = self.epsilon))]
    pub fn compress_all(&self, voyages: &[FeatureAnnotatedVoyage]) -> Vec<CompressedTrajectory> {
        let compressed: Vec<CompressedTrajectory> =
            voyages.par_iter().map(|v| self.compress(v)).collect();
        let before: usize = voyages.iter().map(FeatureAnnotatedVoyage::len).sum();
        let after: usize = compressed.iter().map(CompressedTrajectory::len).sum();
        info!(points_before = before, points_after = after, "voyages compressed");
        compressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressor(epsilon: f64) -> TrajectoryCompressor {
        TrajectoryCompressor::new(epsilon).unwrap()
    }

    #[test]
    fn rejects_non_positive_epsilon() {
        for eps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                TrajectoryCompressor::new(eps),
                Err(TrackError::InvalidEpsilon { .. })
            ));
        }
    }

    #[test]
    fn collinear_points_collapse_to_endpoints() {
        let coords: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64)).collect();
        assert_eq!(compressor(1e-9).compress_indices(&coords), vec![0, 9]);
    }

    #[test]
    fn keeps_corner_above_epsilon() {
        let coords = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (2.0, 2.0)];
        assert_eq!(compressor(0.1).compress_indices(&coords), vec![0, 2, 4]);
    }

    #[test]
    fn small_bump_below_epsilon_is_dropped() {
        let coords = [(0.0, 0.0), (1.0, 0.05), (2.0, 0.0)];
        assert_eq!(compressor(0.1).compress_indices(&coords), vec![0, 2]);
        assert_eq!(compressor(0.01).compress_indices(&coords), vec![0, 1, 2]);
    }

    #[test]
    fn ties_break_to_earliest_index() {
        let coords = [(0.0, 0.0), (1.0, 1.0), (2.0, 1.0), (3.0, 0.0)];
        let kept = compressor(0.4).compress_indices(&coords);
        // Index 1 wins the tie, then index 2 is 0.447 from the chord (1,1)-(3,0).
        assert_eq!(kept, vec![0, 1, 2, 3]);
        let kept = compressor(0.8).compress_indices(&coords);
        assert_eq!(kept, vec![0, 1, 3]);
    }

    #[test]
    fn degenerate_inputs_are_unchanged() {
        let c = compressor(10.0);
        assert!(c.compress_indices(&[]).is_empty());
        assert_eq!(c.compress_indices(&[(0.0, 0.0)]), vec![0]);
        assert_eq!(c.compress_indices(&[(0.0, 0.0), (5.0, 5.0)]), vec![0, 1]);
        let closed = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)];
        assert_eq!(c.compress_indices(&closed), vec![0, 1, 2, 3]);
    }

    #[test]
    fn long_input_does_not_recurse() {
        // A zig-zag keeps every point and peels one split per segment.
        let coords: Vec<(f64, f64)> = (0..10_000)
            .map(|i| (i as f64, if i % 2 == 0 { 0.0 } else { 1.0 }))
            .collect();
        let kept = compressor(0.1).compress_indices(&coords);
        assert_eq!(kept.len(), coords.len());
    }
}
