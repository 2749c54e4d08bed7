//! The stage orchestrator.

use std::collections::HashSet;
use std::time::Instant;

use fairway_dtw::{Cancellation, DistanceMatrix, DtwError};
use fairway_io::{ArtifactKind, ArtifactStore};
use fairway_track::{CompressedTrajectory, FeatureAnnotatedVoyage, PositionReport, ShipId};
use tracing::{debug, info, instrument, warn};

use crate::context::{RunContext, VoyageClusters};
use crate::diagnostics::RunDiagnostics;
use crate::error::{PipelineError, StageError};
use crate::handlers;
use crate::handoff::RenderHandoff;
use crate::settings::Settings;
use crate::stage::{Stage, StageKind, StagePlan};

/// Inputs supplied by the collaborators around the pipeline.
#[derive(Debug, Default)]
pub struct RunInputs {
    /// Reports sorted by ship then timestamp; required only by the features stage.
    pub reports: Option<Vec<PositionReport>>,
    /// Ships in scope; `None` keeps every ship.
    pub ship_filter: Option<HashSet<ShipId>>,
    /// Where artifacts are persisted and missing prerequisites are loaded from.
    pub store: Option<ArtifactStore>,
    /// Abort flag checked between stages and per DTW pair.
    pub cancel: Cancellation,
}

/// Artifacts present at the end of a successful run, plus its diagnostics.
#[derive(Debug)]
pub struct RunOutput {
    /// Feature-annotated voyages.
    pub voyages: Option<Vec<FeatureAnnotatedVoyage>>,
    /// Compressed trajectories.
    pub compressed: Option<Vec<CompressedTrajectory>>,
    /// Pairwise DTW distances.
    pub matrix: Option<DistanceMatrix>,
    /// Cluster assignment.
    pub clusters: Option<VoyageClusters>,
    /// Render hand-off.
    pub handoff: Option<RenderHandoff>,
    /// Per-stage summaries and warnings.
    pub diagnostics: RunDiagnostics,
}

impl From<RunContext> for RunOutput {
    fn from(ctx: RunContext) -> Self {
        Self {
            voyages: ctx.voyages,
            compressed: ctx.compressed,
            matrix: ctx.matrix,
            clusters: ctx.clusters,
            handoff: ctx.handoff,
            diagnostics: ctx.diagnostics,
        }
    }
}

/// Runs a [`StagePlan`] with one set of [`Settings`].
///
/// Each stage first ensures its consumed artifacts: present in the run
/// context, else loaded from the store (when one is given and
/// `load_missing` is set), else [`PipelineError::MissingPrerequisite`].
/// A stage commits its output only once complete; with `persist` set the
/// output is then saved to the store. The first fatal error halts the run.
///
/// Committing an artifact drops every downstream artifact already in the
/// context, and stored copies of those are no longer loaded for the rest of
/// the run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Settings,
    plan: StagePlan,
}

impl Pipeline {
    /// Create a pipeline running the stages named in `settings`.
    ///
    /// # Errors
    ///
    /// Any error of [`Settings::validate`].
    pub fn new(settings: Settings) -> Result<Self, PipelineError> {
        settings.validate()?;
        let plan = settings.stage_plan()?;
        Ok(Self { settings, plan })
    }

    /// Replace the stage plan, e.g. from a command-line override.
    #[must_use]
    pub fn with_plan(mut self, plan: StagePlan) -> Self {
        self.plan = plan;
        self
    }

    /// Return the stage plan.
    #[must_use]
    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    /// Return the settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Execute the planned stages in order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PipelineError::Cancelled`] | `inputs.cancel` was set before or during a stage |
    /// | [`PipelineError::MissingPrerequisite`] | a consumed artifact is unavailable |
    /// | [`PipelineError::Stage`] | a stage rejected its input, or an artifact failed to load or save |
    #[instrument(skip_all, fields(stages = self.plan.stages().len()))]
    pub fn run(&self, inputs: RunInputs) -> Result<RunOutput, PipelineError> {
        let RunInputs {
            reports,
            ship_filter,
            store,
            cancel,
        } = inputs;
        let run_name = store.as_ref().map_or_else(String::new, |s| s.run().to_string());
        let mut ctx = RunContext {
            reports,
            ship_filter,
            diagnostics: RunDiagnostics::new(run_name),
            ..RunContext::default()
        };

        for &kind in self.plan.stages() {
            let stage = handlers::handler(kind);
            if cancel.is_cancelled() {
                warn!(stage = %kind, "run cancelled before stage");
                return Err(PipelineError::Cancelled {
                    stage: kind,
                    warnings: ctx.diagnostics.warning_count(),
                });
            }
            self.prepare(&mut ctx, stage, store.as_ref())?;

            let started = Instant::now();
            if let Err(source) = stage.run(&mut ctx, &self.settings, &cancel) {
                let warnings = ctx.diagnostics.warning_count();
                return Err(match source {
                    StageError::Dtw(DtwError::Cancelled { completed, total }) => {
                        warn!(stage = %kind, completed, total, "run cancelled inside stage");
                        PipelineError::Cancelled {
                            stage: kind,
                            warnings,
                        }
                    }
                    source => PipelineError::Stage {
                        stage: kind,
                        warnings,
                        source,
                    },
                });
            }

            if let Some(artifact) = stage.produces() {
                ctx.commit(artifact);
            }
            if self.settings.persist
                && let (Some(store), Some(artifact)) = (store.as_ref(), stage.produces())
            {
                ctx.save(store, artifact)
                    .map_err(|e| PipelineError::Stage {
                        stage: kind,
                        warnings: ctx.diagnostics.warning_count(),
                        source: e.into(),
                    })?;
            }
            ctx.diagnostics.stages_run.push(kind);
            info!(
                stage = %kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage complete"
            );
        }

        Ok(ctx.into())
    }

    /// Make every consumed artifact of `stage` available in `ctx`.
    fn prepare(
        &self,
        ctx: &mut RunContext,
        stage: &dyn Stage,
        store: Option<&ArtifactStore>,
    ) -> Result<(), PipelineError> {
        let kind = stage.kind();
        // A stored artifact derived from something this run recomputed is outdated.
        let loadable = |ctx: &RunContext, artifact: ArtifactKind| {
            let store = store.filter(|s| self.settings.load_missing && s.exists(artifact))?;
            if ctx.outdated_in_store(artifact) {
                debug!(stage = %kind, %artifact, "stored artifact outdated by this run");
                return None;
            }
            Some(store)
        };

        for &artifact in stage.consumes() {
            if ctx.has(artifact) {
                continue;
            }
            let Some(store) = loadable(ctx, artifact) else {
                return Err(PipelineError::MissingPrerequisite {
                    stage: kind,
                    artifact,
                    warnings: ctx.diagnostics.warning_count(),
                });
            };
            self.load(ctx, store, kind, artifact)?;
        }
        for &artifact in stage.optional() {
            if !ctx.has(artifact)
                && let Some(store) = loadable(ctx, artifact)
            {
                self.load(ctx, store, kind, artifact)?;
            }
        }
        Ok(())
    }

    fn load(
        &self,
        ctx: &mut RunContext,
        store: &ArtifactStore,
        stage: StageKind,
        artifact: ArtifactKind,
    ) -> Result<(), PipelineError> {
        ctx.load(store, artifact).map_err(|e| PipelineError::Stage {
            stage,
            warnings: ctx.diagnostics.warning_count(),
            source: e.into(),
        })?;
        debug!(%stage, %artifact, "prerequisite loaded from store");
        Ok(())
    }
}
