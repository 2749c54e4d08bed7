//! Error types for voyage construction, feature extraction, and compression.

use chrono::{DateTime, Utc};

use crate::report::ShipId;

/// Errors raised while validating report streams or track hyperparameters.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// Returned when a report has a NaN or infinite latitude/longitude.
    #[error("report {index} for ship {ship_id} has non-finite coordinates ({latitude}, {longitude})")]
    NonFiniteCoordinate {
        /// Position of the report in the input stream.
        index: usize,
        /// Ship that produced the report.
        ship_id: ShipId,
        /// Raw latitude value.
        latitude: f64,
        /// Raw longitude value.
        longitude: f64,
    },

    /// Returned when a report's timestamp is earlier than its predecessor for the same ship.
    #[error("report {index} for ship {ship_id} at {timestamp} precedes the previous report at {previous}")]
    UnsortedTimestamps {
        /// Position of the offending report in the input stream.
        index: usize,
        /// Ship that produced the report.
        ship_id: ShipId,
        /// Timestamp of the offending report.
        timestamp: DateTime<Utc>,
        /// Timestamp of the preceding report.
        previous: DateTime<Utc>,
    },

    /// Returned when two consecutive reports of one ship carry the same timestamp.
    #[error("report {index} for ship {ship_id} duplicates timestamp {timestamp}")]
    DuplicateTimestamp {
        /// Position of the second report in the input stream.
        index: usize,
        /// Ship that produced the report.
        ship_id: ShipId,
        /// The repeated timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Returned when a ship's reports are not contiguous in the input stream.
    #[error("report {index}: ship {ship_id} reappears after other ships; input must be sorted by ship then timestamp")]
    UnsortedShips {
        /// Position of the report where the ship reappears.
        index: usize,
        /// The ship that reappeared.
        ship_id: ShipId,
    },

    /// Returned when a voyage is constructed from fewer than two reports.
    #[error("voyage needs at least 2 reports, got {len}")]
    TooFewReports {
        /// Number of reports supplied.
        len: usize,
    },

    /// Returned when a voyage is constructed from reports of more than one ship.
    #[error("voyage mixes ships {expected} and {found}")]
    MixedShips {
        /// Ship of the first report.
        expected: ShipId,
        /// First differing ship encountered.
        found: ShipId,
    },

    /// Returned when a rolling or gap window is zero or negative.
    #[error("{name} window must be positive, got {seconds} s")]
    NonPositiveWindow {
        /// Which window was rejected.
        name: &'static str,
        /// Window length in seconds.
        seconds: i64,
    },

    /// Returned when the compression epsilon is not a positive finite number.
    #[error("compression epsilon must be positive and finite, got {epsilon}")]
    InvalidEpsilon {
        /// The rejected epsilon.
        epsilon: f64,
    },

    /// Returned when the heading-delta cap is outside (0, π].
    #[error("heading delta cap must lie in (0, π] radians, got {cap}")]
    InvalidHeadingCap {
        /// The rejected cap.
        cap: f64,
    },

    /// Returned when a bounding box has inverted or non-finite edges.
    #[error("invalid bounding box: west {west}, south {south}, east {east}, north {north}")]
    InvalidBoundingBox {
        /// Western edge (longitude).
        west: f64,
        /// Southern edge (latitude).
        south: f64,
        /// Eastern edge (longitude).
        east: f64,
        /// Northern edge (latitude).
        north: f64,
    },

    /// Returned when the same rolling window is configured twice.
    #[error("rolling window of {seconds} s is configured twice")]
    DuplicateWindow {
        /// Window length in seconds.
        seconds: i64,
    },

    /// Returned when annotated points disagree on how many windows they carry.
    #[error("point {index} carries {found} rolling windows, expected {expected}")]
    InconsistentWindows {
        /// Position of the offending point.
        index: usize,
        /// Window count of the first point.
        expected: usize,
        /// Window count of the offending point.
        found: usize,
    },

    /// Returned when outlier scoring asks for a window the features lack.
    #[error("no rolling window of {seconds} s on the annotated points")]
    UnknownWindow {
        /// Window length in seconds.
        seconds: i64,
    },

    /// Returned when outlier scoring is configured without any window.
    #[error("outlier scoring needs at least one window")]
    NoOutlierWindows,

    /// Returned when the feature covariance cannot be pseudo-inverted.
    #[error("feature covariance could not be inverted: {reason}")]
    CovarianceInversion {
        /// Message from the linear-algebra backend.
        reason: String,
    },
}
