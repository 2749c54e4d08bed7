//! Stage orchestration for the fairway voyage-clustering pipeline.
//!
//! A [`Pipeline`] resolves its configured stage names once into a
//! [`StagePlan`], then runs each stage against a [`RunContext`] owned by the
//! run. Missing upstream artifacts are loaded from an optional
//! [`ArtifactStore`](fairway_io::ArtifactStore) or reported as a missing
//! prerequisite.

mod context;
mod diagnostics;
mod error;
mod handlers;
mod handoff;
mod pipeline;
mod predict;
mod settings;
mod stage;

pub use context::{RunContext, VoyageClusters};
pub use diagnostics::{
    ClusteringSummary, CompressionSummary, DataWarning, DtwSummary, FeatureSummary,
    RunDiagnostics,
};
pub use error::{PipelineError, StageError};
pub use handoff::RenderHandoff;
pub use pipeline::{Pipeline, RunInputs, RunOutput};
pub use predict::{Prediction, predict, predict_reports};
pub use settings::Settings;
pub use stage::{StageKind, StagePlan};
