//! Run settings loaded from a TOML file with a `[global]` table.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fairway_cluster::DbscanConfig;
use fairway_dtw::{BandConstraint, Dtw, GeoCost, PairwiseBuilder, SpatialMetric};
use fairway_io::RunName;
use fairway_track::{
    BoundingBox, FeatureExtractor, OutlierScorer, TrackError, TrajectoryCompressor, VoyageBuilder,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;
use crate::stage::{StageKind, StagePlan};

/// Settings for one pipeline run.
///
/// Every field is optional in the TOML file.
///
/// # Defaults
///
/// | Field                       | Default                                   |
/// |-----------------------------|-------------------------------------------|
/// | `ais_data_path`             | none                                      |
/// | `meta_data_path`            | none                                      |
/// | `ship_id_column`            | `imo_chemical`                            |
/// | `output_folder`             | `output`                                  |
/// | `run_name`                  | `timestamp` (current UTC `%Y%m%d_%H%M`)   |
/// | `stages`                    | all five, in natural order                |
/// | `compression_eps`           | 0.003 (degrees)                           |
/// | `clustering_eps`            | 12.0 (DTW units)                          |
/// | `min_points`                | 4                                         |
/// | `rolling_window_minutes`    | 60                                        |
/// | `extra_window_minutes`      | `[120, 240, 480]`                         |
/// | `outlier_window_minutes`    | `[120, 240]` (empty disables scoring)     |
/// | `max_gap_hours`             | 24 (0 disables the gap split)             |
/// | `time_gap_minutes`          | 30                                        |
/// | `heading_delta_cap_degrees` | none                                      |
/// | `bbox`                      | none (`[west, south, east, north]`)       |
/// | `spatial_metric`            | `euclidean`                               |
/// | `spatial_weight`            | 1.0                                       |
/// | `heading_weight`            | 0.0                                       |
/// | `dtw_window`                | none (full DTW)                           |
/// | `workers`                   | 0 (all cores)                             |
/// | `persist`                   | true                                      |
/// | `load_missing`              | true                                      |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// AIS position-report CSV.
    pub ais_data_path: Option<PathBuf>,
    /// Ship metadata CSV that scopes the run.
    pub meta_data_path: Option<PathBuf>,
    /// Column of `meta_data_path` holding ship identifiers.
    pub ship_id_column: String,
    /// Directory for artifacts and JSON outputs.
    pub output_folder: PathBuf,
    /// Run name, or `timestamp` for the current UTC time.
    pub run_name: String,
    /// Stage names in execution order.
    pub stages: Vec<String>,
    /// Trajectory compression tolerance, degrees.
    pub compression_eps: f64,
    /// DBSCAN neighbourhood radius, DTW units.
    pub clustering_eps: f64,
    /// Other voyages within `clustering_eps` needed for a core voyage.
    pub min_points: usize,
    /// Primary trailing window of the rolling features.
    pub rolling_window_minutes: i64,
    /// Further trailing windows, each with its own rolling features.
    pub extra_window_minutes: Vec<i64>,
    /// Windows whose features feed the Mahalanobis outlier score.
    pub outlier_window_minutes: Vec<i64>,
    /// Longest silence inside one voyage.
    pub max_gap_hours: i64,
    /// Gap that sets the per-point `time_gap` flag.
    pub time_gap_minutes: i64,
    /// Heading deltas above this are zeroed.
    pub heading_delta_cap_degrees: Option<f64>,
    /// Region of interest.
    pub bbox: Option<[f64; 4]>,
    /// Spatial term of the DTW local cost.
    pub spatial_metric: SpatialMetric,
    /// Weight of the spatial term.
    pub spatial_weight: f64,
    /// Weight of the heading term.
    pub heading_weight: f64,
    /// Sakoe-Chiba radius; none runs full DTW.
    pub dtw_window: Option<usize>,
    /// DTW worker threads; 0 uses every core.
    pub workers: usize,
    /// Save each produced artifact to the store.
    pub persist: bool,
    /// Load missing prerequisites from the store.
    pub load_missing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ais_data_path: None,
            meta_data_path: None,
            ship_id_column: "imo_chemical".to_string(),
            output_folder: PathBuf::from("output"),
            run_name: "timestamp".to_string(),
            stages: StageKind::ALL.iter().map(|s| s.name().to_string()).collect(),
            compression_eps: 0.003,
            clustering_eps: 12.0,
            min_points: 4,
            rolling_window_minutes: 60,
            extra_window_minutes: vec![120, 240, 480],
            outlier_window_minutes: vec![120, 240],
            max_gap_hours: 24,
            time_gap_minutes: 30,
            heading_delta_cap_degrees: None,
            bbox: None,
            spatial_metric: SpatialMetric::Euclidean,
            spatial_weight: 1.0,
            heading_weight: 0.0,
            dtw_window: None,
            workers: 0,
            persist: true,
            load_missing: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    global: Settings,
}

impl Settings {
    /// Parse settings from TOML text and validate them.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PipelineError::ParseSettings`] | not TOML, or a field has the wrong type |
    /// | see [`Settings::validate`] | |
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, PipelineError> {
        let file: SettingsFile = toml::from_str(text).map_err(|e| PipelineError::ParseSettings {
            path: origin.to_path_buf(),
            source: e,
        })?;
        file.global.validate()?;
        Ok(file.global)
    }

    /// Read, parse, and validate a settings file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PipelineError::ReadSettings`] | file missing or unreadable |
    /// | [`PipelineError::ParseSettings`] | not TOML, or a field has the wrong type |
    /// | see [`Settings::validate`] | |
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::ReadSettings {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings = Self::from_toml_str(&text, path)?;
        debug!(path = %path.display(), stages = ?settings.stages, "settings loaded");
        Ok(settings)
    }

    /// Check the settings that are not owned by a single stage.
    ///
    /// Stage hyperparameters (epsilons, windows, weights) are checked by the
    /// component constructors when the owning stage runs.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PipelineError::UnknownStage`] | a stage name matches no stage |
    /// | [`PipelineError::DuplicateStage`] | a stage is named twice |
    /// | [`PipelineError::InvalidSettings`] | malformed `bbox`, or negative `max_gap_hours` |
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.stage_plan()?;
        self.bounding_box().map_err(|e| PipelineError::InvalidSettings {
            field: "bbox",
            reason: e.to_string(),
        })?;
        if self.max_gap_hours < 0 {
            return Err(PipelineError::InvalidSettings {
                field: "max_gap_hours",
                reason: format!("must be >= 0, got {}", self.max_gap_hours),
            });
        }
        Ok(())
    }

    /// Resolve the configured stage names.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PipelineError::UnknownStage`] | a stage name matches no stage |
    /// | [`PipelineError::DuplicateStage`] | a stage is named twice |
    pub fn stage_plan(&self) -> Result<StagePlan, PipelineError> {
        StagePlan::parse(&self.stages)
    }

    /// Resolve the run name, expanding `timestamp` to `now` as `%Y%m%d_%H%M`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] if the name is not `[a-zA-Z0-9_-]+`.
    pub fn resolve_run_name(&self, now: DateTime<Utc>) -> Result<RunName, PipelineError> {
        let name = if self.run_name == "timestamp" {
            now.format("%Y%m%d_%H%M").to_string()
        } else {
            self.run_name.clone()
        };
        RunName::new(name).map_err(|e| PipelineError::InvalidSettings {
            field: "run_name",
            reason: e.to_string(),
        })
    }

    pub(crate) fn bounding_box(&self) -> Result<Option<BoundingBox>, TrackError> {
        self.bbox
            .map(|[west, south, east, north]| BoundingBox::new(west, south, east, north))
            .transpose()
    }

    pub(crate) fn voyage_builder(&self) -> Result<VoyageBuilder, TrackError> {
        let max_gap = (self.max_gap_hours > 0).then(|| Duration::hours(self.max_gap_hours));
        Ok(VoyageBuilder::new()
            .with_max_gap(max_gap)
            .with_bounding_box(self.bounding_box()?))
    }

    pub(crate) fn feature_extractor(&self) -> Result<FeatureExtractor, TrackError> {
        FeatureExtractor::new(Duration::minutes(self.rolling_window_minutes))?
            .with_extra_windows(self.extra_window_minutes.iter().map(|&m| Duration::minutes(m)))?
            .with_time_gap(Duration::minutes(self.time_gap_minutes))?
            .with_heading_delta_cap(self.heading_delta_cap_degrees.map(f64::to_radians))
    }

    /// `None` when `outlier_window_minutes` is empty.
    pub(crate) fn outlier_scorer(&self) -> Result<Option<OutlierScorer>, TrackError> {
        if self.outlier_window_minutes.is_empty() {
            return Ok(None);
        }
        OutlierScorer::new(self.outlier_window_minutes.iter().map(|&m| Duration::minutes(m))).map(Some)
    }

    pub(crate) fn compressor(&self) -> Result<TrajectoryCompressor, TrackError> {
        TrajectoryCompressor::new(self.compression_eps)
    }

    pub(crate) fn dtw(&self) -> Dtw {
        Dtw::from_constraint(
            self.dtw_window
                .map_or(BandConstraint::Unconstrained, BandConstraint::SakoeChibaRadius),
        )
    }

    pub(crate) fn local_cost(&self) -> Result<GeoCost, fairway_dtw::DtwError> {
        GeoCost::new(self.spatial_metric).with_weights(self.spatial_weight, self.heading_weight)
    }

    pub(crate) fn pairwise_builder(&self) -> PairwiseBuilder {
        PairwiseBuilder::new(self.dtw()).with_workers(self.workers)
    }

    pub(crate) fn dbscan(&self) -> Result<DbscanConfig, fairway_cluster::ClusterError> {
        Ok(DbscanConfig::new(self.clustering_eps)?.with_min_points(self.min_points))
    }
}
