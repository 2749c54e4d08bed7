//! Density-based clustering of voyages.
//!
//! Runs DBSCAN over a precomputed [`fairway_dtw::DistanceMatrix`]: a voyage
//! is a core point when enough other voyages lie within the neighbourhood
//! radius, clusters grow transitively from core points, and everything
//! unreachable is noise. Seeds are visited in ascending voyage index so the
//! labelling is reproducible.

mod config;
mod dbscan;
mod error;
mod label;
mod result;
mod silhouette;

pub use config::DbscanConfig;
pub use error::ClusterError;
pub use label::{Assignment, ClusterLabel};
pub use result::ClusterResult;
pub use silhouette::{SampleSilhouette, SilhouetteScore, silhouette};
