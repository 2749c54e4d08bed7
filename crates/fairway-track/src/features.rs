//! Per-point kinematic features over a voyage.
//!
//! Every feature is computed within one voyage in point order. Voyages are
//! independent, so [`FeatureExtractor::annotate_all`] fans out across them.

use std::f64::consts::PI;

use chrono::Duration;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::TrackError;
use crate::geo::{haversine_m, heading_difference, initial_bearing};
use crate::report::{PositionReport, ShipId};
use crate::voyage::{Voyage, VoyageId};

/// Rolling aggregates over one trailing window `(t - window, t]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    /// Window length in seconds.
    pub window_seconds: i64,
    /// Sum of `heading_delta` over points in the window.
    pub heading_delta_sum: f64,
    /// Sum of `step_distance_m` over points in the window.
    pub distance_m: f64,
    /// Path length from the earliest in-window point to this one, divided by
    /// the straight-line distance between them.
    pub loitering_ratio: Option<f64>,
}

/// One voyage report plus its derived features.
///
/// Features without a predecessor (the first point, or the first point after
/// a zero-length step for headings) are `None`, never a numeric default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedPoint {
    /// The underlying report.
    pub report: PositionReport,
    /// Bearing from the previous point, radians in `[0, 2π)`.
    pub heading: Option<f64>,
    /// Turn relative to the most recent defined heading, radians in `[0, π]`.
    pub heading_delta: Option<f64>,
    /// Haversine distance from the previous point, metres.
    pub step_distance_m: Option<f64>,
    /// One entry per configured window, primary window first.
    pub rolling: Vec<WindowFeatures>,
    /// True when the previous report is more than the gap threshold earlier.
    pub time_gap: bool,
    /// Squared Mahalanobis distance, set by [`OutlierScorer`](crate::OutlierScorer).
    pub mahalanobis: Option<f64>,
}

impl AnnotatedPoint {
    /// Aggregates of the window with the given length.
    #[must_use]
    pub fn rolling_for(&self, window: Duration) -> Option<&WindowFeatures> {
        let seconds = window.num_seconds();
        self.rolling.iter().find(|w| w.window_seconds == seconds)
    }

    /// Heading-delta sum of the primary window.
    #[must_use]
    pub fn rolling_heading_delta(&self) -> f64 {
        self.rolling.first().map_or(0.0, |w| w.heading_delta_sum)
    }
}

/// A voyage whose points carry kinematic features.
///
/// Holds the same invariants as [`Voyage`]; deserialization re-checks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnnotatedVoyageRecord")]
pub struct FeatureAnnotatedVoyage {
    id: VoyageId,
    ship_id: ShipId,
    points: Vec<AnnotatedPoint>,
}

#[derive(Deserialize)]
struct AnnotatedVoyageRecord {
    id: VoyageId,
    ship_id: ShipId,
    points: Vec<AnnotatedPoint>,
}

impl TryFrom<AnnotatedVoyageRecord> for FeatureAnnotatedVoyage {
    type Error = TrackError;

    fn try_from(record: AnnotatedVoyageRecord) -> Result<Self, Self::Error> {
        let reports: Vec<PositionReport> =
            record.points.iter().map(|p| p.report.clone()).collect();
        let voyage = Voyage::new(record.id.clone(), reports)?;
        if voyage.ship_id() != &record.ship_id {
            return Err(TrackError::MixedShips {
                expected: record.ship_id,
                found: voyage.ship_id().clone(),
            });
        }
        let windows = record.points[0].rolling.len();
        if let Some(index) = record.points.iter().position(|p| p.rolling.len() != windows) {
            return Err(TrackError::InconsistentWindows {
                index,
                expected: windows,
                found: record.points[index].rolling.len(),
            });
        }
        Ok(Self {
            id: record.id,
            ship_id: record.ship_id,
            points: record.points,
        })
    }
}

impl FeatureAnnotatedVoyage {
    /// Return the voyage identifier.
    #[must_use]
    pub fn id(&self) -> &VoyageId {
        &self.id
    }

    /// Return the ship that sailed this voyage.
    #[must_use]
    pub fn ship_id(&self) -> &ShipId {
        &self.ship_id
    }

    /// Return the annotated points in time order.
    #[must_use]
    pub fn points(&self) -> &[AnnotatedPoint] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [AnnotatedPoint] {
        &mut self.points
    }

    /// Return the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Return true if the voyage has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Computes heading, turn density, and distance features per voyage.
///
/// Rolling aggregates are evaluated for every configured window by
/// timestamp, in O(n) per window using prefix sums and a trailing pointer.
///
/// # Defaults
///
/// | Parameter           | Default              |
/// |---------------------|----------------------|
/// | windows             | the primary only     |
/// | `time_gap`          | 30 minutes           |
/// | `heading_delta_cap` | none                 |
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureExtractor {
    windows: Vec<Duration>,
    time_gap: Duration,
    heading_delta_cap: Option<f64>,
}

impl FeatureExtractor {
    /// Create an extractor with the given primary trailing window.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::NonPositiveWindow`] | `window` is zero or negative |
    pub fn new(window: Duration) -> Result<Self, TrackError> {
        check_window(window)?;
        Ok(Self {
            windows: vec![window],
            time_gap: Duration::minutes(30),
            heading_delta_cap: None,
        })
    }

    /// Add further trailing windows after the primary one.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::NonPositiveWindow`] | a window is zero or negative |
    /// | [`TrackError::DuplicateWindow`] | a window is already configured |
    pub fn with_extra_windows(
        mut self,
        windows: impl IntoIterator<Item = Duration>,
    ) -> Result<Self, TrackError> {
        for window in windows {
            check_window(window)?;
            if self.windows.contains(&window) {
                return Err(TrackError::DuplicateWindow {
                    seconds: window.num_seconds(),
                });
            }
            self.windows.push(window);
        }
        Ok(self)
    }

    /// Set the gap above which a point is flagged with `time_gap`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::NonPositiveWindow`] | `time_gap` is zero or negative |
    pub fn with_time_gap(mut self, time_gap: Duration) -> Result<Self, TrackError> {
        if time_gap <= Duration::zero() {
            return Err(TrackError::NonPositiveWindow {
                name: "time gap",
                seconds: time_gap.num_seconds(),
            });
        }
        self.time_gap = time_gap;
        Ok(self)
    }

    /// Zero out heading deltas above `cap` radians.
    ///
    /// Sharp manoeuvres in harbours otherwise dominate the turn-density signal.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::InvalidHeadingCap`] | `cap` outside `(0, π]` |
    pub fn with_heading_delta_cap(mut self, cap: Option<f64>) -> Result<Self, TrackError> {
        if let Some(cap) = cap
            && !(cap > 0.0 && cap <= PI)
        {
            return Err(TrackError::InvalidHeadingCap { cap });
        }
        self.heading_delta_cap = cap;
        Ok(self)
    }

    /// Return the primary trailing window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.windows[0]
    }

    /// Return every configured window, primary first.
    #[must_use]
    pub fn windows(&self) -> &[Duration] {
        &self.windows
    }

    /// Annotate one voyage.
    #[must_use]
    pub fn annotate(&self, voyage: &Voyage) -> FeatureAnnotatedVoyage {
        let reports = voyage.reports();
        let n = reports.len();

        let mut headings: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut deltas: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut steps: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut gaps: Vec<bool> = Vec::with_capacity(n);
        let mut last_heading: Option<f64> = None;

        for (k, curr) in reports.iter().enumerate() {
            let Some(prev) = k.checked_sub(1).map(|p| &reports[p]) else {
                headings.push(None);
                deltas.push(None);
                steps.push(None);
                gaps.push(false);
                continue;
            };

            let step = haversine_m(prev.latitude, prev.longitude, curr.latitude, curr.longitude);
            // A stationary step has no direction.
            let heading = (step > 0.0).then(|| {
                initial_bearing(prev.latitude, prev.longitude, curr.latitude, curr.longitude)
            });
            let delta = match (last_heading, heading) {
                (Some(a), Some(b)) => Some(self.capped(heading_difference(a, b))),
                _ => None,
            };
            if heading.is_some() {
                last_heading = heading;
            }

            headings.push(heading);
            deltas.push(delta);
            steps.push(Some(step));
            gaps.push(curr.timestamp - prev.timestamp > self.time_gap);
        }

        // prefix[k] is the sum over the first k points.
        let delta_prefix = prefix_sums(&deltas);
        let step_prefix = prefix_sums(&steps);

        let mut rolling: Vec<Vec<WindowFeatures>> = vec![Vec::with_capacity(self.windows.len()); n];
        for &window in &self.windows {
            let mut start = 0;
            for (k, curr) in reports.iter().enumerate() {
                let cutoff = curr.timestamp - window;
                while reports[start].timestamp <= cutoff {
                    start += 1;
                }

                let distance_m = step_prefix[k + 1] - step_prefix[start];
                // The step into the earliest point lies outside its own path.
                let path_m = (step_prefix[k + 1] - step_prefix[start + 1]).max(0.0);
                let first = &reports[start];
                let displacement_m =
                    haversine_m(first.latitude, first.longitude, curr.latitude, curr.longitude);

                rolling[k].push(WindowFeatures {
                    window_seconds: window.num_seconds(),
                    heading_delta_sum: delta_prefix[k + 1] - delta_prefix[start],
                    distance_m,
                    loitering_ratio: (displacement_m > 0.0).then(|| path_m / displacement_m),
                });
            }
        }

        let points = reports
            .iter()
            .zip(rolling)
            .enumerate()
            .map(|(k, (curr, rolling))| AnnotatedPoint {
                report: curr.clone(),
                heading: headings[k],
                heading_delta: deltas[k],
                step_distance_m: steps[k],
                rolling,
                time_gap: gaps[k],
                mahalanobis: None,
            })
            .collect();

        FeatureAnnotatedVoyage {
            id: voyage.id().clone(),
            ship_id: voyage.ship_id().clone(),
            points,
        }
    }

    /// Annotate many voyages in parallel, preserving their order.
    #[instrument(skip_all, fields(n_voyages = voyages.len(), n_windows = self.windows.len()))]
    pub fn annotate_all(&self, voyages: &[Voyage]) -> Vec<FeatureAnnotatedVoyage> {
        let annotated: Vec<FeatureAnnotatedVoyage> =
            voyages.par_iter().map(|v| self.annotate(v)).collect();
        info!(
            n_points = annotated.iter().map(FeatureAnnotatedVoyage::len).sum::<usize>(),
            "features computed"
        );
        annotated
    }

    fn capped(&self, delta: f64) -> f64 {
        match self.heading_delta_cap {
            Some(cap) if delta > cap => 0.0,
            _ => delta,
        }
    }
}

fn check_window(window: Duration) -> Result<(), TrackError> {
    if window <= Duration::zero() {
        return Err(TrackError::NonPositiveWindow {
            name: "rolling",
            seconds: window.num_seconds(),
        });
    }
    Ok(())
}

fn prefix_sums(values: &[Option<f64>]) -> Vec<f64> {
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for v in values {
        acc += v.unwrap_or(0.0);
        prefix.push(acc);
    }
    prefix
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::report::NavigationalStatus;

    fn voyage(points: &[(i64, f64, f64)]) -> Voyage {
        let t0 = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        let ship = ShipId::new("A");
        let reports = points
            .iter()
            .map(|&(minute, lat, lon)| {
                PositionReport::new(
                    ship.clone(),
                    t0 + Duration::minutes(minute),
                    lat,
                    lon,
                    NavigationalStatus::UnderWayUsingEngine,
                )
            })
            .collect();
        Voyage::new(VoyageId::new(&ship, 0), reports).unwrap()
    }

    fn extractor(minutes: i64) -> FeatureExtractor {
        FeatureExtractor::new(Duration::minutes(minutes)).unwrap()
    }

    #[test]
    fn first_point_has_no_heading() {
        let v = voyage(&[(0, 0.0, 0.0), (10, 0.0, 0.1), (20, 0.1, 0.1)]);
        let a = extractor(60).annotate(&v);
        let p0 = &a.points()[0];
        assert!(p0.heading.is_none());
        assert!(p0.heading_delta.is_none());
        assert!(p0.step_distance_m.is_none());
        assert_eq!(p0.rolling_heading_delta(), 0.0);
        // Second point has a heading but nothing to compare it with.
        assert!(a.points()[1].heading.is_some());
        assert!(a.points()[1].heading_delta.is_none());
    }

    #[test]
    fn right_angle_turn() {
        // East along the equator, then due north.
        let v = voyage(&[(0, 0.0, 0.0), (10, 0.0, 0.1), (20, 0.1, 0.1)]);
        let a = extractor(60).annotate(&v);
        let p2 = &a.points()[2];
        assert!((p2.heading.unwrap() - 0.0).abs() < 1e-10);
        assert!((p2.heading_delta.unwrap() - FRAC_PI_2).abs() < 1e-10);
        assert!((p2.rolling_heading_delta() - FRAC_PI_2).abs() < 1e-10);
    }

    #[test]
    fn rolling_window_is_half_open() {
        // Zig-zag with a turn at every point from the third on.
        let v = voyage(&[
            (0, 0.0, 0.0),
            (10, 0.0, 0.1),
            (20, 0.1, 0.1),
            (30, 0.1, 0.2),
            (40, 0.2, 0.2),
        ]);
        let a = extractor(20).annotate(&v);
        let deltas: Vec<f64> = a
            .points()
            .iter()
            .map(|p| p.heading_delta.unwrap_or(0.0))
            .collect();
        // Window (t-20, t] at t=40 covers t=30 and t=40 only.
        let expected = deltas[3] + deltas[4];
        assert!((a.points()[4].rolling_heading_delta() - expected).abs() < 1e-12);
    }

    #[test]
    fn stationary_step_has_no_heading() {
        let v = voyage(&[(0, 0.0, 0.0), (10, 0.0, 0.1), (20, 0.0, 0.1), (30, 0.1, 0.1)]);
        let a = extractor(60).annotate(&v);
        assert!(a.points()[2].heading.is_none());
        assert!(a.points()[2].heading_delta.is_none());
        assert_eq!(a.points()[2].step_distance_m, Some(0.0));
        // The turn after the stop compares against the last defined heading.
        assert!((a.points()[3].heading_delta.unwrap() - FRAC_PI_2).abs() < 1e-10);
    }

    #[test]
    fn heading_cap_zeroes_sharp_turns() {
        let v = voyage(&[(0, 0.0, 0.0), (10, 0.0, 0.1), (20, 0.1, 0.1)]);
        let a = extractor(60)
            .with_heading_delta_cap(Some(0.5))
            .unwrap()
            .annotate(&v);
        assert_eq!(a.points()[2].heading_delta, Some(0.0));
    }

    #[test]
    fn time_gap_flag() {
        let v = voyage(&[(0, 0.0, 0.0), (10, 0.0, 0.1), (55, 0.0, 0.2)]);
        let a = extractor(60).annotate(&v);
        assert!(!a.points()[1].time_gap);
        assert!(a.points()[2].time_gap);
    }

    #[test]
    fn loitering_ratio_of_straight_line_is_one() {
        let v = voyage(&[(0, 57.0, 10.0), (10, 57.0, 10.1), (20, 57.0, 10.2)]);
        let a = extractor(60).annotate(&v);
        assert!(a.points()[0].rolling[0].loitering_ratio.is_none());
        let ratio = a.points()[2].rolling[0].loitering_ratio.unwrap();
        assert!((ratio - 1.0).abs() < 1e-6);
    }

    #[test]
    fn loitering_ratio_grows_when_circling() {
        let v = voyage(&[
            (0, 57.0, 10.0),
            (10, 57.0, 10.1),
            (20, 57.05, 10.1),
            (30, 57.05, 10.0),
            (40, 57.001, 10.0),
        ]);
        let a = extractor(60).annotate(&v);
        assert!(a.points()[4].rolling[0].loitering_ratio.unwrap() > 10.0);
    }

    #[test]
    fn rolling_distance_sums_steps_in_window() {
        let v = voyage(&[(0, 57.0, 10.0), (10, 57.0, 10.1), (20, 57.0, 10.2)]);
        let a = extractor(60).annotate(&v);
        let steps: f64 = a.points().iter().filter_map(|p| p.step_distance_m).sum();
        assert!((a.points()[2].rolling[0].distance_m - steps).abs() < 1e-9);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            FeatureExtractor::new(Duration::zero()),
            Err(TrackError::NonPositiveWindow { .. })
        ));
        assert!(matches!(
            extractor(60).with_time_gap(Duration::minutes(-1)),
            Err(TrackError::NonPositiveWindow { .. })
        ));
        assert!(matches!(
            extractor(60).with_heading_delta_cap(Some(4.0)),
            Err(TrackError::InvalidHeadingCap { .. })
        ));
        assert!(matches!(
            extractor(60).with_extra_windows([Duration::minutes(120), Duration::minutes(60)]),
            Err(TrackError::DuplicateWindow { seconds: 3600 })
        ));
        assert!(matches!(
            extractor(60).with_extra_windows([Duration::zero()]),
            Err(TrackError::NonPositiveWindow { .. })
        ));
    }

    #[test]
    fn every_window_gets_its_own_aggregates() {
        let v = voyage(&[
            (0, 0.0, 0.0),
            (10, 0.0, 0.1),
            (20, 0.1, 0.1),
            (30, 0.1, 0.2),
            (40, 0.2, 0.2),
        ]);
        let a = extractor(20)
            .with_extra_windows([Duration::minutes(60)])
            .unwrap()
            .annotate(&v);
        let last = &a.points()[4];
        assert_eq!(last.rolling.len(), 2);
        assert_eq!(last.rolling[0].window_seconds, 1200);

        let wide = last.rolling_for(Duration::minutes(60)).unwrap();
        let all_deltas: f64 = a.points().iter().filter_map(|p| p.heading_delta).sum();
        let all_steps: f64 = a.points().iter().filter_map(|p| p.step_distance_m).sum();
        assert!((wide.heading_delta_sum - all_deltas).abs() < 1e-12);
        assert!((wide.distance_m - all_steps).abs() < 1e-6);
        assert!(wide.heading_delta_sum > last.rolling_heading_delta());
        assert!(last.rolling_for(Duration::minutes(30)).is_none());
        assert!(last.mahalanobis.is_none());
    }

    #[test]
    fn deserialization_rechecks_voyage_invariants() {
        let v = voyage(&[(0, 57.0, 10.0), (10, 57.0, 10.1), (20, 57.0, 10.2)]);
        let a = extractor(60).annotate(&v);
        let json = serde_json::to_string(&a).unwrap();
        let back: FeatureAnnotatedVoyage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);

        let mut reversed = serde_json::to_value(&a).unwrap();
        reversed["points"].as_array_mut().unwrap().reverse();
        assert!(serde_json::from_value::<FeatureAnnotatedVoyage>(reversed).is_err());

        let mut short = serde_json::to_value(&a).unwrap();
        short["points"].as_array_mut().unwrap().truncate(1);
        assert!(serde_json::from_value::<FeatureAnnotatedVoyage>(short).is_err());

        let mut ragged = serde_json::to_value(&a).unwrap();
        ragged["points"][1]["rolling"] = serde_json::json!([]);
        assert!(serde_json::from_value::<FeatureAnnotatedVoyage>(ragged).is_err());

        let mut renamed = serde_json::to_value(&a).unwrap();
        renamed["ship_id"] = serde_json::json!("B");
        assert!(serde_json::from_value::<FeatureAnnotatedVoyage>(renamed).is_err());
    }

    #[test]
    fn annotate_all_preserves_order() {
        let a = voyage(&[(0, 0.0, 0.0), (10, 0.0, 0.1)]);
        let ship = ShipId::new("B");
        let b = Voyage::new(VoyageId::new(&ship, 0), {
            let mut r = a.reports().to_vec();
            for report in &mut r {
                report.ship_id = ship.clone();
            }
            r
        })
        .unwrap();
        let out = extractor(60).annotate_all(&[a, b]);
        assert_eq!(out[0].id().as_str(), "A_0");
        assert_eq!(out[1].id().as_str(), "B_0");
    }
}
