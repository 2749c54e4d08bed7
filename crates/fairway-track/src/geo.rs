//! Geodesy helpers on decimal-degree WGS84 coordinates.
//!
//! Headings and angle differences are in radians. Step distances use the
//! haversine formula on a spherical earth. Compression works in the planar
//! longitude/latitude degree plane, see [`segment_deviation`].

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// Mean earth radius used for haversine distances, in metres.
pub const EARTH_RADIUS_M: f64 = 6_373_000.0;

/// Great-circle distance between two positions, in metres.
#[must_use]
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial great-circle bearing from the first position towards the second.
///
/// Returned in radians, clockwise from true north, normalised to `[0, 2π)`.
#[must_use]
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    y.atan2(x).rem_euclid(TAU)
}

/// Smallest absolute angle between two headings, folded into `[0, π]`.
#[must_use]
pub fn heading_difference(a: f64, b: f64) -> f64 {
    let delta = (a - b).rem_euclid(TAU);
    if delta > PI { TAU - delta } else { delta }
}

/// Distance of `p` from the segment `a`–`b`, in the planar `(x, y)` frame of
/// the inputs.
///
/// Points projecting inside the segment get their perpendicular distance;
/// points beyond either end get the distance to that end. A segment with
/// coincident ends degenerates to the distance from `a`.
#[must_use]
pub fn segment_deviation(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return (p.0 - a.0).hypot(p.1 - a.1);
    }
    let t = (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0);
    (p.0 - (a.0 + t * dx)).hypot(p.1 - (a.1 + t * dy))
}

/// A longitude/latitude rectangle limiting the region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl BoundingBox {
    /// Create a bounding box from its edges in decimal degrees.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::InvalidBoundingBox`] | any edge non-finite, `west >= east`, or `south >= north` |
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, TrackError> {
        let finite = [west, south, east, north].iter().all(|v| v.is_finite());
        if !finite || west >= east || south >= north {
            return Err(TrackError::InvalidBoundingBox {
                west,
                south,
                east,
                north,
            });
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Return true if the position lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }

    /// Return the edges as `[west, south, east, north]`.
    #[must_use]
    pub fn edges(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn bearing_cardinal_directions() {
        assert!(initial_bearing(57.0, 10.0, 57.1, 10.0).abs() < 1e-10);
        assert!((initial_bearing(57.0, 10.0, 56.9, 10.0) - PI).abs() < 1e-10);
        let east = initial_bearing(0.0, 10.0, 0.0, 10.1);
        assert!((east - FRAC_PI_2).abs() < 1e-10);
        let west = initial_bearing(0.0, 10.1, 0.0, 10.0);
        assert!((west - 3.0 * FRAC_PI_2).abs() < 1e-10);
    }

    #[test]
    fn bearing_is_normalised() {
        let b = initial_bearing(57.0, 10.0, 57.1, 9.9);
        assert!((0.0..TAU).contains(&b));
        assert!(b > 3.0 * FRAC_PI_2);
    }

    #[test]
    fn heading_difference_folds() {
        assert!((heading_difference(0.1, TAU - 0.1) - 0.2).abs() < 1e-12);
        assert!((heading_difference(TAU - 0.1, 0.1) - 0.2).abs() < 1e-12);
        assert!((heading_difference(0.0, PI) - PI).abs() < 1e-12);
        assert!(heading_difference(1.0, 1.0).abs() < 1e-12);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_m(57.0, 10.0, 58.0, 10.0);
        let expected = EARTH_RADIUS_M * 1.0_f64.to_radians();
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_m(57.0, 10.0, 57.0, 10.0), 0.0);
    }

    #[test]
    fn segment_deviation_inside_chord() {
        let d = segment_deviation((1.0, 2.0), (0.0, 0.0), (4.0, 0.0));
        assert!((d - 2.0).abs() < 1e-12);
        let d = segment_deviation((1.0, 1.0), (0.0, 0.0), (2.0, 2.0));
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn segment_deviation_beyond_chord_end() {
        let d = segment_deviation((10.0, 1.0), (0.0, 0.0), (4.0, 0.0));
        assert!((d - 37.0_f64.sqrt()).abs() < 1e-12);
        let d = segment_deviation((-3.0, 4.0), (0.0, 0.0), (4.0, 0.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn segment_deviation_degenerate_chord() {
        let d = segment_deviation((3.0, 4.0), (0.0, 0.0), (0.0, 0.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn bounding_box_validation_and_contains() {
        assert!(BoundingBox::new(25.7, 56.0, 9.0, 66.0).is_err());
        assert!(BoundingBox::new(9.0, 66.0, 25.7, 56.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 56.0, 25.7, 66.0).is_err());

        let bbox = BoundingBox::new(9.0, 56.0, 25.7, 66.0).unwrap();
        assert!(bbox.contains(57.0, 10.0));
        assert!(bbox.contains(56.0, 9.0));
        assert!(!bbox.contains(55.9, 10.0));
        assert!(!bbox.contains(57.0, 26.0));
        assert_eq!(bbox.edges(), [9.0, 56.0, 25.7, 66.0]);
    }
}
