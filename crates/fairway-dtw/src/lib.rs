//! DTW alignment of vessel trajectories.
//!
//! Pure math library with zero I/O. Provides Dynamic Time Warping over
//! compressed trajectories with a pluggable local cost, an optional
//! Sakoe-Chiba corridor, warping path extraction, and an all-pairs distance
//! matrix computed on a fixed worker pool with cooperative cancellation.

mod cancel;
mod constraint;
mod cost;
mod distance;
mod dtw;
mod error;
mod matrix;
mod pairwise;
mod path;

pub use cancel::Cancellation;
pub use constraint::BandConstraint;
pub use cost::{GeoCost, LocalCost, SpatialMetric};
pub use distance::DtwDistance;
pub use dtw::Dtw;
pub use error::DtwError;
pub use matrix::DistanceMatrix;
pub use pairwise::PairwiseBuilder;
pub use path::{WarpingPath, WarpingStep};
