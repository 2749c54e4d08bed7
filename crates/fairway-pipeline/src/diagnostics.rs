//! Per-stage run summaries and non-fatal data warnings.

use std::collections::BTreeMap;

use fairway_track::BuildDiagnostics;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::stage::StageKind;

/// A degenerate-data condition: counted, reported, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// Voyages with fewer than two points, dropped before compression.
    DegenerateVoyages {
        /// Number of voyages dropped.
        count: usize,
    },
    /// In-scope ships with no under-way segment long enough to form a voyage.
    ShipsWithoutVoyages {
        /// Number of ships.
        count: usize,
    },
}

impl DataWarning {
    /// Number of voyages or ships the warning covers.
    #[must_use]
    pub fn count(self) -> usize {
        match self {
            Self::DegenerateVoyages { count } | Self::ShipsWithoutVoyages { count } => count,
        }
    }
}

/// Output of the features stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    /// What the voyage builder kept and dropped.
    pub build: BuildDiagnostics,
    /// Annotated voyages.
    pub voyages: usize,
    /// Annotated points across all voyages.
    pub points: usize,
    /// Largest squared Mahalanobis distance, when outlier scoring ran.
    pub max_mahalanobis: Option<f64>,
}

/// Output of the compression stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionSummary {
    /// Compressed trajectories.
    pub trajectories: usize,
    /// Points before compression.
    pub points_before: usize,
    /// Points after compression.
    pub points_after: usize,
}

/// Output of the DTW stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtwSummary {
    /// Matrix dimension N.
    pub dimension: usize,
    /// Pairs computed, N(N-1)/2.
    pub pairs: usize,
    /// Wall-clock time of the pairwise computation.
    pub elapsed_ms: u128,
}

/// Output of the clustering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringSummary {
    /// Clusters found.
    pub n_clusters: usize,
    /// Voyages labelled noise.
    pub noise: usize,
    /// Cluster size -> number of clusters of that size.
    pub size_histogram: BTreeMap<usize, usize>,
    /// Mean silhouette, when at least two clusters exist.
    pub silhouette: Option<f64>,
}

/// Everything a run reports besides its artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Run name.
    pub run: String,
    /// Stages completed, in order.
    pub stages_run: Vec<StageKind>,
    /// Artifacts loaded from the store instead of computed.
    pub loaded: Vec<fairway_io::ArtifactKind>,
    /// Features stage summary.
    pub features: Option<FeatureSummary>,
    /// Compression stage summary.
    pub compression: Option<CompressionSummary>,
    /// DTW stage summary.
    pub dtw: Option<DtwSummary>,
    /// Clustering stage summary.
    pub clustering: Option<ClusteringSummary>,
    /// Non-fatal warnings in the order they were raised.
    pub warnings: Vec<DataWarning>,
}

impl RunDiagnostics {
    pub(crate) fn new(run: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            ..Self::default()
        }
    }

    /// Record a warning and log it.
    pub(crate) fn warn(&mut self, warning: DataWarning) {
        warn!(?warning, "degenerate data");
        self.warnings.push(warning);
    }

    /// Degenerate voyages and ships counted across all warnings so far.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.iter().map(|w| w.count()).sum()
    }
}
