//! JSON result writer for cluster assignments, run summaries, and render hand-offs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fairway_cluster::ClusterResult;
use fairway_track::VoyageId;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::RunName;

/// Writes human-facing run outputs as pretty JSON.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{run}_clusters.json`, `{run}_summary.json`, and
/// `{run}_handoff.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    run: RunName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and run name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), run = %run))]
    pub fn new(output_dir: &Path, run: RunName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            run,
        })
    }

    /// Write cluster assignments to `{run}_clusters.json`.
    ///
    /// Assignments are keyed by voyage ID; noise is written as `-1`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::LengthMismatch`] | `voyage_ids` and `result` differ in length |
    /// | [`IoError::SerializeJson`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | file write failed |
    #[instrument(skip_all, fields(n = voyage_ids.len()))]
    pub fn write_clusters(
        &self,
        voyage_ids: &[VoyageId],
        result: &ClusterResult,
    ) -> Result<PathBuf, IoError> {
        if voyage_ids.len() != result.len() {
            return Err(IoError::LengthMismatch {
                ids: voyage_ids.len(),
                assignments: result.len(),
            });
        }
        let assignments: BTreeMap<&str, i64> = voyage_ids
            .iter()
            .zip(&result.assignments)
            .map(|(id, &a)| (id.as_str(), i64::from(a)))
            .collect();

        let artifact = ClustersArtifact {
            run: self.run.as_str(),
            n_voyages: voyage_ids.len(),
            n_clusters: result.n_clusters(),
            noise: result.noise_count(),
            assignments,
            cluster_sizes: result.cluster_sizes(),
            size_histogram: result.size_histogram(),
        };
        self.write_json("clusters", "cluster assignments", &artifact)
    }

    /// Write the run summary to `{run}_summary.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::SerializeJson`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | file write failed |
    #[instrument(skip_all)]
    pub fn write_summary<T: Serialize>(&self, summary: &T) -> Result<PathBuf, IoError> {
        self.write_json("summary", "run summary", summary)
    }

    /// Write the render hand-off to `{run}_handoff.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::SerializeJson`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | file write failed |
    #[instrument(skip_all)]
    pub fn write_handoff<T: Serialize>(&self, handoff: &T) -> Result<PathBuf, IoError> {
        self.write_json("handoff", "render hand-off", handoff)
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        suffix: &str,
        what: &'static str,
        value: &T,
    ) -> Result<PathBuf, IoError> {
        let path = self.output_dir.join(format!("{}_{suffix}.json", self.run));
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| IoError::SerializeJson { what, source: e })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        info!(path = %path.display(), "{what} written");
        Ok(path)
    }
}

// Shadow struct for JSON serialization.

#[derive(Serialize)]
struct ClustersArtifact<'a> {
    run: &'a str,
    n_voyages: usize,
    n_clusters: usize,
    noise: usize,
    assignments: BTreeMap<&'a str, i64>,
    cluster_sizes: Vec<usize>,
    size_histogram: BTreeMap<usize, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairway_cluster::DbscanConfig;
    use fairway_dtw::DistanceMatrix;
    use fairway_track::ShipId;
    use tempfile::TempDir;

    fn clustered() -> (Vec<VoyageId>, ClusterResult) {
        let xs = [0.0, 0.1, 0.2, 9.0];
        let dense: Vec<Vec<f64>> = xs
            .iter()
            .map(|a| xs.iter().map(|b| f64::abs(a - b)).collect())
            .collect();
        let m = DistanceMatrix::from_dense(&dense).unwrap();
        let result = DbscanConfig::new(0.5).unwrap().with_min_points(1).fit(&m);
        let ship = ShipId::new("9428217");
        let ids = (0..xs.len()).map(|k| VoyageId::new(&ship, k)).collect();
        (ids, result)
    }

    #[test]
    fn write_clusters_json() {
        let dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(dir.path(), RunName::new("r1").unwrap()).unwrap();
        let (ids, result) = clustered();
        let path = writer.write_clusters(&ids, &result).unwrap();
        assert_eq!(path.file_name().unwrap(), "r1_clusters.json");

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["run"], "r1");
        assert_eq!(json["n_voyages"], 4);
        assert_eq!(json["n_clusters"], 1);
        assert_eq!(json["noise"], 1);
        assert_eq!(json["assignments"]["9428217_0"], 0);
        assert_eq!(json["assignments"]["9428217_3"], -1);
        assert_eq!(json["cluster_sizes"], serde_json::json!([3]));
        assert_eq!(json["size_histogram"]["3"], 1);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(dir.path(), RunName::new("r1").unwrap()).unwrap();
        let (ids, result) = clustered();
        assert!(matches!(
            writer.write_clusters(&ids[..2], &result),
            Err(IoError::LengthMismatch {
                ids: 2,
                assignments: 4
            })
        ));
    }

    #[test]
    fn write_summary_and_handoff() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("out").join("deep");
        let writer = ResultWriter::new(&nested, RunName::new("r2").unwrap()).unwrap();

        let summary = BTreeMap::from([("voyages", 3)]);
        let path = writer.write_summary(&summary).unwrap();
        assert_eq!(path, nested.join("r2_summary.json"));

        let path = writer.write_handoff(&vec!["a", "b"]).unwrap();
        let back: Vec<String> = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, vec!["a", "b"]);
    }
}
