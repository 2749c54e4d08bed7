//! Assigning new voyages against a stored, already clustered base set.

use std::collections::HashSet;

use fairway_cluster::Assignment;
use fairway_dtw::{Cancellation, DistanceMatrix, DtwDistance, DtwError};
use fairway_io::{ArtifactKind, ArtifactStore};
use fairway_track::{CompressedTrajectory, PositionReport, ShipId, VoyageId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{PipelineError, StageError};
use crate::pipeline::{Pipeline, RunInputs};
use crate::settings::Settings;
use crate::stage::{StageKind, StagePlan};

/// Predicted assignment of one new voyage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The new voyage.
    pub voyage_id: VoyageId,
    /// Its assignment after joining the base set.
    pub assignment: Assignment,
    /// Most similar base voyage and its DTW distance.
    pub nearest: Option<(VoyageId, DtwDistance)>,
}

/// Predict an assignment for each trajectory in `new`.
///
/// Each new voyage is judged on its own against `base`: its DTW distances
/// to every base voyage are appended to `matrix` and DBSCAN is refit with
/// the settings' `clustering_eps` and `min_points`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`StageError::MatrixSize`] | `matrix` does not describe `base` |
/// | [`StageError::Dtw`] | invalid cost settings, an empty trajectory, or cancellation |
/// | [`StageError::Cluster`] | invalid clustering settings |
#[instrument(skip_all, fields(base = base.len(), new = new.len()))]
pub fn predict(
    settings: &Settings,
    base: &[CompressedTrajectory],
    matrix: &DistanceMatrix,
    new: &[CompressedTrajectory],
    cancel: &Cancellation,
) -> Result<Vec<Prediction>, StageError> {
    if matrix.len() != base.len() {
        return Err(StageError::MatrixSize {
            matrix: matrix.len(),
            trajectories: base.len(),
        });
    }
    let dtw = settings.dtw();
    let cost = settings.local_cost()?;
    let config = settings.dbscan()?;

    let mut predictions = Vec::with_capacity(new.len());
    for (k, trajectory) in new.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(DtwError::Cancelled {
                completed: k,
                total: new.len(),
            }
            .into());
        }
        let distances = base
            .par_iter()
            .map(|b| dtw.distance(trajectory.points(), b.points(), &cost))
            .collect::<Result<Vec<_>, _>>()?;
        let assignment = config.predict(matrix, &distances)?;
        let nearest = distances
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(j, &d)| (base[j].voyage_id().clone(), d));
        predictions.push(Prediction {
            voyage_id: trajectory.voyage_id().clone(),
            assignment,
            nearest,
        });
    }

    info!(
        predicted = predictions.len(),
        noise = predictions.iter().filter(|p| p.assignment.is_noise()).count(),
        "prediction complete"
    );
    Ok(predictions)
}

/// Build and compress voyages from `reports`, then predict them against the
/// compressed set and distance matrix saved in `store`.
///
/// Nothing is persisted for the new voyages.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | any [`Pipeline::run`] error | building or compressing the new voyages failed |
/// | [`PipelineError::Prediction`] | the base set could not be loaded, or [`predict`] failed |
pub fn predict_reports(
    settings: &Settings,
    reports: Vec<PositionReport>,
    ship_filter: Option<HashSet<ShipId>>,
    store: &ArtifactStore,
    cancel: &Cancellation,
) -> Result<Vec<Prediction>, PipelineError> {
    let settings = Settings {
        persist: false,
        ..settings.clone()
    };
    let output = Pipeline::new(settings.clone())?
        .with_plan(StagePlan::new([StageKind::Features, StageKind::Compression])?)
        .run(RunInputs {
            reports: Some(reports),
            ship_filter,
            store: None,
            cancel: cancel.clone(),
        })?;
    let new = output.compressed.unwrap_or_default();

    let failed = |source: StageError| PipelineError::Prediction { source };
    let base: Vec<CompressedTrajectory> = store
        .load(ArtifactKind::Compressed)
        .map_err(|e| failed(e.into()))?;
    let matrix: DistanceMatrix = store
        .load(ArtifactKind::DistanceMatrix)
        .map_err(|e| failed(e.into()))?;
    predict(&settings, &base, &matrix, &new, cancel).map_err(failed)
}
