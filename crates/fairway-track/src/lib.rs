//! Voyage segmentation, kinematic features, and trajectory compression.
//!
//! Pure computation over AIS position reports with zero I/O. Groups an ordered
//! report stream into per-ship voyages, annotates every point with heading and
//! turn-density features over several windows, scores those features for
//! outliers, and simplifies each voyage into a compressed trajectory suitable
//! for pairwise DTW.

mod builder;
mod compress;
mod error;
mod features;
pub mod geo;
mod outlier;
mod report;
mod voyage;

pub use builder::{BuildDiagnostics, BuildOutcome, VoyageBuilder};
pub use compress::{CompressedTrajectory, TrackPoint, TrajectoryCompressor};
pub use error::TrackError;
pub use features::{AnnotatedPoint, FeatureAnnotatedVoyage, FeatureExtractor, WindowFeatures};
pub use geo::BoundingBox;
pub use outlier::OutlierScorer;
pub use report::{NavigationalStatus, PositionReport, ShipId};
pub use voyage::{Voyage, VoyageId};
