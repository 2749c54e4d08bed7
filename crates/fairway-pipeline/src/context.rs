//! Run-scoped artifact context, owned by one pipeline run.

use std::collections::HashSet;

use fairway_cluster::ClusterResult;
use fairway_dtw::DistanceMatrix;
use fairway_io::{ArtifactKind, ArtifactStore, IoError};
use fairway_track::{CompressedTrajectory, FeatureAnnotatedVoyage, PositionReport, ShipId, VoyageId};
use serde::{Deserialize, Serialize};

use crate::diagnostics::RunDiagnostics;
use crate::handoff::RenderHandoff;

/// The clustering artifact: voyage IDs in matrix order plus their assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoyageClusters {
    /// Voyage ID of each matrix row.
    pub voyage_ids: Vec<VoyageId>,
    /// DBSCAN labels and core flags, aligned with `voyage_ids`.
    pub result: ClusterResult,
}

/// Artifacts produced or loaded during one run.
///
/// Created by [`Pipeline::run`](crate::Pipeline::run) and passed `&mut` to
/// each stage. Each slot is filled only with a complete artifact.
#[derive(Debug, Default)]
pub struct RunContext {
    /// Input reports from the ingestion collaborator.
    pub reports: Option<Vec<PositionReport>>,
    /// Ships in scope; `None` keeps every ship.
    pub ship_filter: Option<HashSet<ShipId>>,
    /// Feature-annotated voyages.
    pub voyages: Option<Vec<FeatureAnnotatedVoyage>>,
    /// Compressed trajectories.
    pub compressed: Option<Vec<CompressedTrajectory>>,
    /// Pairwise DTW distances over `compressed`.
    pub matrix: Option<DistanceMatrix>,
    /// Cluster assignment over `compressed`.
    pub clusters: Option<VoyageClusters>,
    /// Render hand-off, when plotting ran.
    pub handoff: Option<RenderHandoff>,
    /// Summaries and warnings.
    pub diagnostics: RunDiagnostics,
    /// Artifacts computed by stages of this run, in order.
    pub(crate) computed: Vec<ArtifactKind>,
}

impl RunContext {
    /// Return true when the artifact of `kind` is present.
    #[must_use]
    pub fn has(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Reports => self.reports.is_some(),
            ArtifactKind::Voyages => self.voyages.is_some(),
            ArtifactKind::Compressed => self.compressed.is_some(),
            ArtifactKind::DistanceMatrix => self.matrix.is_some(),
            ArtifactKind::Clusters => self.clusters.is_some(),
        }
    }

    /// Return true when this run recomputed an artifact upstream of `kind`,
    /// so a stored copy of `kind` no longer matches the context.
    #[must_use]
    pub fn outdated_in_store(&self, kind: ArtifactKind) -> bool {
        self.computed.iter().any(|&c| c < kind)
    }

    /// Record that `kind` was just computed and drop everything derived from
    /// an older version of it.
    pub(crate) fn commit(&mut self, kind: ArtifactKind) {
        if kind < ArtifactKind::Compressed {
            self.compressed = None;
        }
        if kind < ArtifactKind::DistanceMatrix {
            self.matrix = None;
        }
        if kind < ArtifactKind::Clusters {
            self.clusters = None;
        }
        self.handoff = None;
        self.computed.push(kind);
    }

    /// Load the artifact of `kind` from `store` into its slot.
    pub(crate) fn load(&mut self, store: &ArtifactStore, kind: ArtifactKind) -> Result<(), IoError> {
        match kind {
            ArtifactKind::Reports => return Err(IoError::NotPersisted { kind }),
            ArtifactKind::Voyages => self.voyages = Some(store.load(kind)?),
            ArtifactKind::Compressed => self.compressed = Some(store.load(kind)?),
            ArtifactKind::DistanceMatrix => self.matrix = Some(store.load(kind)?),
            ArtifactKind::Clusters => self.clusters = Some(store.load(kind)?),
        }
        self.diagnostics.loaded.push(kind);
        Ok(())
    }

    /// Save the artifact of `kind` to `store`. Absent artifacts are skipped.
    pub(crate) fn save(&self, store: &ArtifactStore, kind: ArtifactKind) -> Result<(), IoError> {
        let saved = match kind {
            ArtifactKind::Reports => return Err(IoError::NotPersisted { kind }),
            ArtifactKind::Voyages => self.voyages.as_ref().map(|v| store.save(kind, v)),
            ArtifactKind::Compressed => self.compressed.as_ref().map(|v| store.save(kind, v)),
            ArtifactKind::DistanceMatrix => self.matrix.as_ref().map(|v| store.save(kind, v)),
            ArtifactKind::Clusters => self.clusters.as_ref().map(|v| store.save(kind, v)),
        };
        saved.transpose()?;
        Ok(())
    }
}
