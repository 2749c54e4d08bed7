//! Mahalanobis outlier scores over rolling window features.
//!
//! The feature vector of a point is the heading-delta sum and loitering ratio
//! of each scored window. Mean and covariance are fitted once over every point
//! of every voyage, so scores are comparable across the whole run.

use chrono::Duration;
use nalgebra::DMatrix;
use tracing::{debug, info, instrument};

use crate::error::TrackError;
use crate::features::{AnnotatedPoint, FeatureAnnotatedVoyage};

/// Singular values below this are treated as zero by the pseudo-inverse.
const PSEUDO_INVERSE_EPS: f64 = 1e-12;

/// Writes a squared Mahalanobis distance into every annotated point.
///
/// Missing or non-finite features enter the fit as `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierScorer {
    windows: Vec<Duration>,
}

impl OutlierScorer {
    /// Score on the features of the given windows, in this order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::NoOutlierWindows`] | `windows` is empty |
    pub fn new(windows: impl IntoIterator<Item = Duration>) -> Result<Self, TrackError> {
        let windows: Vec<Duration> = windows.into_iter().collect();
        if windows.is_empty() {
            return Err(TrackError::NoOutlierWindows);
        }
        Ok(Self { windows })
    }

    #[must_use]
    pub fn windows(&self) -> &[Duration] {
        &self.windows
    }

    /// Fit over all points and store each point's score.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::UnknownWindow`] | a point lacks one of the scored windows |
    /// | [`TrackError::CovarianceInversion`] | the pseudo-inverse fails |
    #[instrument(skip_all, fields(n_voyages = voyages.len(), n_windows = self.windows.len()))]
    pub fn score(&self, voyages: &mut [FeatureAnnotatedVoyage]) -> Result<(), TrackError> {
        let samples = voyages
            .iter()
            .flat_map(FeatureAnnotatedVoyage::points)
            .map(|p| self.sample(p))
            .collect::<Result<Vec<_>, _>>()?;

        let scores = squared_mahalanobis(&samples)?;
        let mut scores = scores.into_iter();
        for point in voyages.iter_mut().flat_map(FeatureAnnotatedVoyage::points_mut) {
            point.mahalanobis = scores.next();
        }

        info!(n_points = samples.len(), "outlier scores computed");
        Ok(())
    }

    fn sample(&self, point: &AnnotatedPoint) -> Result<Vec<f64>, TrackError> {
        let mut row = Vec::with_capacity(self.windows.len() * 2);
        for &window in &self.windows {
            let features = point.rolling_for(window).ok_or(TrackError::UnknownWindow {
                seconds: window.num_seconds(),
            })?;
            row.push(finite_or_zero(Some(features.heading_delta_sum)));
            row.push(finite_or_zero(features.loitering_ratio));
        }
        Ok(row)
    }
}

/// Squared Mahalanobis distance of every row to the sample mean.
///
/// Uses the maximum-likelihood covariance (divided by `n`) and its
/// Moore-Penrose pseudo-inverse, so constant columns contribute nothing.
/// Returns an empty vector for no rows. Every row must have the same length.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`TrackError::CovarianceInversion`] | the pseudo-inverse fails |
pub(crate) fn squared_mahalanobis(samples: &[Vec<f64>]) -> Result<Vec<f64>, TrackError> {
    let Some(dim) = samples.first().map(Vec::len) else {
        return Ok(Vec::new());
    };
    let n = samples.len();
    let data = DMatrix::from_fn(n, dim, |i, j| samples[i][j]);
    let mean = data.row_mean();
    let centered = DMatrix::from_fn(n, dim, |i, j| data[(i, j)] - mean[j]);
    let covariance = centered.transpose() * &centered / n as f64;
    let precision = covariance
        .pseudo_inverse(PSEUDO_INVERSE_EPS)
        .map_err(|reason| TrackError::CovarianceInversion {
            reason: reason.to_owned(),
        })?;
    debug!(n, dim, "covariance pseudo-inverted");

    Ok(centered
        .row_iter()
        .map(|row| (&row * &precision).dot(&row))
        .collect())
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}
