//! Stage kinds, the resolved stage plan, and the uniform stage contract.

use std::fmt;
use std::str::FromStr;

use fairway_dtw::Cancellation;
use fairway_io::ArtifactKind;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::{PipelineError, StageError};
use crate::settings::Settings;

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Build voyages from reports and annotate them with kinematic features.
    Features,
    /// Simplify each voyage into a compressed trajectory.
    Compression,
    /// Compute the pairwise DTW distance matrix.
    Dtw,
    /// Cluster the distance matrix with DBSCAN.
    Clustering,
    /// Assemble the render hand-off.
    Plotting,
}

impl StageKind {
    /// All stages in their natural order.
    pub const ALL: [StageKind; 5] = [
        Self::Features,
        Self::Compression,
        Self::Dtw,
        Self::Clustering,
        Self::Plotting,
    ];

    /// Return the configuration name of the stage.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Compression => "compression",
            Self::Dtw => "dtw",
            Self::Clustering => "clustering",
            Self::Plotting => "plotting",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| PipelineError::UnknownStage {
                name: s.to_string(),
            })
    }
}

/// An ordered, duplicate-free list of stages, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePlan(Vec<StageKind>);

impl StagePlan {
    /// Build a plan from stage kinds.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateStage`] if a kind appears twice.
    pub fn new(stages: impl IntoIterator<Item = StageKind>) -> Result<Self, PipelineError> {
        let mut plan = Vec::new();
        for stage in stages {
            if plan.contains(&stage) {
                return Err(PipelineError::DuplicateStage { stage });
            }
            plan.push(stage);
        }
        Ok(Self(plan))
    }

    /// Parse a plan from stage names.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PipelineError::UnknownStage`] | a name matches no stage |
    /// | [`PipelineError::DuplicateStage`] | a stage is named twice |
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, PipelineError> {
        let kinds = names
            .iter()
            .map(|name| name.as_ref().parse::<StageKind>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(kinds)
    }

    /// Return the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageKind] {
        &self.0
    }

    /// Return true if `stage` is planned.
    #[must_use]
    pub fn contains(&self, stage: StageKind) -> bool {
        self.0.contains(&stage)
    }

    /// Return true if no stage is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StagePlan {
    fn default() -> Self {
        Self(StageKind::ALL.to_vec())
    }
}

/// Uniform contract of a stage handler: consumes an artifact set, produces at most one artifact.
pub(crate) trait Stage {
    fn kind(&self) -> StageKind;

    /// Artifacts that must be present before the stage runs.
    fn consumes(&self) -> &'static [ArtifactKind];

    /// Artifacts used when present, never required.
    fn optional(&self) -> &'static [ArtifactKind] {
        &[]
    }

    /// The persisted artifact this stage commits, if any.
    fn produces(&self) -> Option<ArtifactKind>;

    fn run(
        &self,
        ctx: &mut RunContext,
        settings: &Settings,
        cancel: &Cancellation,
    ) -> Result<(), StageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names() {
        let plan = StagePlan::parse(&["Features", " dtw ", "clustering"]).unwrap();
        assert_eq!(
            plan.stages(),
            &[StageKind::Features, StageKind::Dtw, StageKind::Clustering]
        );
        assert!(!plan.contains(StageKind::Compression));
    }

    #[test]
    fn unknown_stage_is_rejected() {
        match StagePlan::parse(&["features", "plot"]) {
            Err(PipelineError::UnknownStage { name }) => assert_eq!(name, "plot"),
            other => panic!("expected UnknownStage, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_stage_is_rejected() {
        assert!(matches!(
            StagePlan::parse(&["dtw", "clustering", "DTW"]),
            Err(PipelineError::DuplicateStage {
                stage: StageKind::Dtw
            })
        ));
    }

    #[test]
    fn default_plan_runs_everything_in_order() {
        assert_eq!(StagePlan::default().stages(), &StageKind::ALL);
        assert!(StagePlan::new([]).unwrap().is_empty());
    }
}
