//! Stage handlers: one per [`StageKind`], each a thin adapter from settings and
//! context artifacts to the component that does the work.

use std::time::Instant;

use fairway_cluster::{ClusterError, silhouette};
use fairway_dtw::Cancellation;
use fairway_io::ArtifactKind;
use tracing::{debug, info, instrument};

use crate::context::{RunContext, VoyageClusters};
use crate::diagnostics::{
    ClusteringSummary, CompressionSummary, DataWarning, DtwSummary, FeatureSummary,
};
use crate::error::StageError;
use crate::handoff::RenderHandoff;
use crate::settings::Settings;
use crate::stage::{Stage, StageKind};

/// Resolve a stage kind to its handler.
pub(crate) fn handler(kind: StageKind) -> &'static dyn Stage {
    match kind {
        StageKind::Features => &Features,
        StageKind::Compression => &Compression,
        StageKind::Dtw => &DtwStage,
        StageKind::Clustering => &Clustering,
        StageKind::Plotting => &Plotting,
    }
}

/// Reads a slot the orchestrator has already filled.
macro_rules! required {
    ($ctx:expr, $slot:ident, $kind:expr) => {
        $ctx.$slot
            .as_ref()
            .ok_or(StageError::MissingInput { artifact: $kind })?
    };
}

struct Features;

impl Stage for Features {
    fn kind(&self) -> StageKind {
        StageKind::Features
    }

    fn consumes(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::Reports]
    }

    fn produces(&self) -> Option<ArtifactKind> {
        Some(ArtifactKind::Voyages)
    }

    #[instrument(skip_all, name = "features")]
    fn run(
        &self,
        ctx: &mut RunContext,
        settings: &Settings,
        _cancel: &Cancellation,
    ) -> Result<(), StageError> {
        let builder = settings
            .voyage_builder()?
            .with_ship_filter(ctx.ship_filter.clone());
        let extractor = settings.feature_extractor()?;
        let scorer = settings.outlier_scorer()?;
        let reports = required!(ctx, reports, ArtifactKind::Reports);

        let outcome = builder.build(reports)?;
        let mut voyages = extractor.annotate_all(&outcome.voyages);
        if let Some(scorer) = &scorer {
            scorer.score(&mut voyages)?;
        }
        let points = voyages.iter().map(|v| v.len()).sum();

        let build = outcome.diagnostics;
        if build.degenerate_voyages > 0 {
            ctx.diagnostics.warn(DataWarning::DegenerateVoyages {
                count: build.degenerate_voyages,
            });
        }
        if build.ships_without_voyage > 0 {
            ctx.diagnostics.warn(DataWarning::ShipsWithoutVoyages {
                count: build.ships_without_voyage,
            });
        }
        let max_mahalanobis = voyages
            .iter()
            .flat_map(|v| v.points())
            .filter_map(|p| p.mahalanobis)
            .max_by(f64::total_cmp);
        info!(voyages = voyages.len(), points, ?max_mahalanobis, "features complete");
        ctx.diagnostics.features = Some(FeatureSummary {
            build,
            voyages: voyages.len(),
            points,
            max_mahalanobis,
        });
        ctx.voyages = Some(voyages);
        Ok(())
    }
}

struct Compression;

impl Stage for Compression {
    fn kind(&self) -> StageKind {
        StageKind::Compression
    }

    fn consumes(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::Voyages]
    }

    fn produces(&self) -> Option<ArtifactKind> {
        Some(ArtifactKind::Compressed)
    }

    #[instrument(skip_all, name = "compression")]
    fn run(
        &self,
        ctx: &mut RunContext,
        settings: &Settings,
        _cancel: &Cancellation,
    ) -> Result<(), StageError> {
        let compressor = settings.compressor()?;
        let voyages = required!(ctx, voyages, ArtifactKind::Voyages);

        let compressed = compressor.compress_all(voyages);
        let summary = CompressionSummary {
            trajectories: compressed.len(),
            points_before: voyages.iter().map(|v| v.len()).sum(),
            points_after: compressed.iter().map(|c| c.len()).sum(),
        };
        info!(
            trajectories = summary.trajectories,
            points_before = summary.points_before,
            points_after = summary.points_after,
            "compression complete"
        );
        ctx.diagnostics.compression = Some(summary);
        ctx.compressed = Some(compressed);
        Ok(())
    }
}

struct DtwStage;

impl Stage for DtwStage {
    fn kind(&self) -> StageKind {
        StageKind::Dtw
    }

    fn consumes(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::Compressed]
    }

    fn produces(&self) -> Option<ArtifactKind> {
        Some(ArtifactKind::DistanceMatrix)
    }

    #[instrument(skip_all, name = "dtw")]
    fn run(
        &self,
        ctx: &mut RunContext,
        settings: &Settings,
        cancel: &Cancellation,
    ) -> Result<(), StageError> {
        let cost = settings.local_cost()?;
        let builder = settings.pairwise_builder();
        let compressed = required!(ctx, compressed, ArtifactKind::Compressed);

        let start = Instant::now();
        let matrix = builder.build(compressed, &cost, cancel)?;
        let n = matrix.len();
        ctx.diagnostics.dtw = Some(DtwSummary {
            dimension: n,
            pairs: n * n.saturating_sub(1) / 2,
            elapsed_ms: start.elapsed().as_millis(),
        });
        ctx.matrix = Some(matrix);
        Ok(())
    }
}

struct Clustering;

impl Stage for Clustering {
    fn kind(&self) -> StageKind {
        StageKind::Clustering
    }

    fn consumes(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::Compressed, ArtifactKind::DistanceMatrix]
    }

    fn produces(&self) -> Option<ArtifactKind> {
        Some(ArtifactKind::Clusters)
    }

    #[instrument(skip_all, name = "clustering")]
    fn run(
        &self,
        ctx: &mut RunContext,
        settings: &Settings,
        _cancel: &Cancellation,
    ) -> Result<(), StageError> {
        let config = settings.dbscan()?;
        let compressed = required!(ctx, compressed, ArtifactKind::Compressed);
        let matrix = required!(ctx, matrix, ArtifactKind::DistanceMatrix);
        if matrix.len() != compressed.len() {
            return Err(StageError::MatrixSize {
                matrix: matrix.len(),
                trajectories: compressed.len(),
            });
        }

        let result = config.fit(matrix);
        let silhouette = match silhouette(matrix, &result) {
            Ok(score) => Some(score.mean_score),
            Err(ClusterError::SingleCluster { n_clusters }) => {
                debug!(n_clusters, "silhouette undefined");
                None
            }
            Err(e) => return Err(e.into()),
        };
        ctx.diagnostics.clustering = Some(ClusteringSummary {
            n_clusters: result.n_clusters(),
            noise: result.noise_count(),
            size_histogram: result.size_histogram(),
            silhouette,
        });
        ctx.clusters = Some(VoyageClusters {
            voyage_ids: compressed.iter().map(|c| c.voyage_id().clone()).collect(),
            result,
        });
        Ok(())
    }
}

struct Plotting;

impl Stage for Plotting {
    fn kind(&self) -> StageKind {
        StageKind::Plotting
    }

    fn consumes(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::Voyages]
    }

    fn optional(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::Clusters]
    }

    fn produces(&self) -> Option<ArtifactKind> {
        None
    }

    #[instrument(skip_all, name = "plotting")]
    fn run(
        &self,
        ctx: &mut RunContext,
        _settings: &Settings,
        _cancel: &Cancellation,
    ) -> Result<(), StageError> {
        let voyages = required!(ctx, voyages, ArtifactKind::Voyages).clone();
        let handoff = RenderHandoff::new(voyages, ctx.clusters.as_ref());
        info!(
            voyages = handoff.voyages.len(),
            labelled = handoff.labels.is_some(),
            "render hand-off ready"
        );
        ctx.handoff = Some(handoff);
        Ok(())
    }
}
