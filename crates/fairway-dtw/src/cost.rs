//! Local cost functions between trajectory points.

use fairway_track::TrackPoint;
use fairway_track::geo::{haversine_m, heading_difference};
use serde::{Deserialize, Serialize};

use crate::error::DtwError;

/// Cost of matching one point of a trajectory against one point of another.
///
/// Implementations must return a finite, non-negative value; the DTW kernels
/// reject anything else with [`DtwError::InvalidLocalCost`]. Any
/// `Fn(&P, &P) -> f64 + Sync` closure is a local cost.
pub trait LocalCost<P>: Sync {
    /// Return the cost of aligning `a` with `b`.
    fn cost(&self, a: &P, b: &P) -> f64;
}

impl<P, F> LocalCost<P> for F
where
    F: Fn(&P, &P) -> f64 + Sync,
{
    fn cost(&self, a: &P, b: &P) -> f64 {
        self(a, b)
    }
}

/// How the spatial part of [`GeoCost`] measures two positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialMetric {
    /// Planar distance in raw degrees, `hypot(Δlon, Δlat)`.
    #[default]
    Euclidean,
    /// Great-circle distance in kilometres.
    Haversine,
}

/// Weighted sum of spatial distance and heading difference.
///
/// The heading term only contributes when both points carry a heading.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | metric | [`SpatialMetric::Euclidean`] |
/// | spatial weight | 1.0 |
/// | heading weight | 0.0 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCost {
    metric: SpatialMetric,
    spatial_weight: f64,
    heading_weight: f64,
}

impl Default for GeoCost {
    fn default() -> Self {
        Self::new(SpatialMetric::default())
    }
}

impl GeoCost {
    /// Create a purely spatial cost using `metric`.
    #[must_use]
    pub fn new(metric: SpatialMetric) -> Self {
        Self {
            metric,
            spatial_weight: 1.0,
            heading_weight: 0.0,
        }
    }

    /// Set the spatial and heading weights.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::InvalidWeight`] | either weight is negative or non-finite |
    /// | [`DtwError::ZeroWeights`] | both weights are zero |
    pub fn with_weights(mut self, spatial: f64, heading: f64) -> Result<Self, DtwError> {
        for (name, value) in [("spatial", spatial), ("heading", heading)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(DtwError::InvalidWeight { name, value });
            }
        }
        if spatial == 0.0 && heading == 0.0 {
            return Err(DtwError::ZeroWeights);
        }
        self.spatial_weight = spatial;
        self.heading_weight = heading;
        Ok(self)
    }

    /// Return the spatial metric.
    #[must_use]
    pub fn metric(&self) -> SpatialMetric {
        self.metric
    }

    /// Return `(spatial, heading)` weights.
    #[must_use]
    pub fn weights(&self) -> (f64, f64) {
        (self.spatial_weight, self.heading_weight)
    }

    fn spatial(&self, a: &TrackPoint, b: &TrackPoint) -> f64 {
        match self.metric {
            SpatialMetric::Euclidean => (a.longitude - b.longitude).hypot(a.latitude - b.latitude),
            SpatialMetric::Haversine => {
                haversine_m(a.latitude, a.longitude, b.latitude, b.longitude) / 1000.0
            }
        }
    }
}

impl LocalCost<TrackPoint> for GeoCost {
    fn cost(&self, a: &TrackPoint, b: &TrackPoint) -> f64 {
        let mut total = 0.0;
        if self.spatial_weight > 0.0 {
            total += self.spatial_weight * self.spatial(a, b);
        }
        if self.heading_weight > 0.0
            && let (Some(ha), Some(hb)) = (a.heading, b.heading)
        {
            total += self.heading_weight * heading_difference(ha, hb);
        }
        total
    }
}
