//! Error types for fairway-pipeline.

use std::path::PathBuf;

use fairway_cluster::ClusterError;
use fairway_dtw::DtwError;
use fairway_io::{ArtifactKind, IoError};
use fairway_track::TrackError;

use crate::stage::StageKind;

/// Failure raised inside one stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Voyage building, feature, or compression input was invalid.
    #[error(transparent)]
    Track(#[from] TrackError),

    /// DTW cost settings or a trajectory were invalid.
    #[error(transparent)]
    Dtw(#[from] DtwError),

    /// Clustering settings or inputs were invalid.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// An artifact could not be loaded or persisted.
    #[error(transparent)]
    Io(#[from] IoError),

    /// A consumed artifact was absent when the stage started.
    #[error("{artifact} not available")]
    MissingInput {
        /// The absent artifact.
        artifact: ArtifactKind,
    },

    /// The distance matrix does not describe the compressed trajectories in the context.
    #[error("distance matrix covers {matrix} voyages but {trajectories} compressed trajectories are loaded")]
    MatrixSize {
        /// Matrix dimension.
        matrix: usize,
        /// Number of compressed trajectories.
        trajectories: usize,
    },
}

/// Errors surfaced by [`Pipeline`](crate::Pipeline) and the settings loader.
///
/// Every run-time variant carries the number of non-fatal data warnings
/// recorded before the failure.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Returned when a stage fails on its input.
    #[error("stage {stage} failed ({warnings} warnings before failure)")]
    Stage {
        /// Stage that failed.
        stage: StageKind,
        /// Warnings recorded before the failure.
        warnings: usize,
        /// Underlying failure.
        source: StageError,
    },

    /// Returned when a stage needs an artifact that is neither in the run nor in the store.
    #[error("stage {stage} needs {artifact}, which no earlier stage produced and no store provides ({warnings} warnings before failure)")]
    MissingPrerequisite {
        /// Stage that needed the artifact.
        stage: StageKind,
        /// The missing artifact.
        artifact: ArtifactKind,
        /// Warnings recorded before the failure.
        warnings: usize,
    },

    /// Returned when cancellation is observed before or during a stage.
    #[error("run cancelled at stage {stage} ({warnings} warnings before cancellation)")]
    Cancelled {
        /// Stage that was about to run or was running.
        stage: StageKind,
        /// Warnings recorded before the cancellation.
        warnings: usize,
    },

    /// Returned when a stage name is not recognised.
    #[error("unknown stage \"{name}\": expected one of features, compression, dtw, clustering, plotting")]
    UnknownStage {
        /// The offending name.
        name: String,
    },

    /// Returned when a stage appears twice in the plan.
    #[error("stage {stage} is listed more than once")]
    DuplicateStage {
        /// The repeated stage.
        stage: StageKind,
    },

    /// Returned when a setting is out of range or inconsistent.
    #[error("invalid setting {field}: {reason}")]
    InvalidSettings {
        /// Setting name as written in the TOML file.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Returned when the settings file cannot be read.
    #[error("cannot read settings file {path}")]
    ReadSettings {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the settings file is not valid TOML for [`Settings`](crate::Settings).
    #[error("cannot parse settings file {path}")]
    ParseSettings {
        /// Path to the settings file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// Returned when predicting against a stored base set fails.
    #[error("prediction failed")]
    Prediction {
        /// Underlying failure.
        source: StageError,
    },
}
