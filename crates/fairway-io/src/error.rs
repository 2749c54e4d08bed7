//! I/O error types for fairway-io.

use std::path::PathBuf;

use crate::domain::ArtifactKind;

/// Errors from file I/O, CSV parsing, artifact persistence, and result output.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file contains a header but no usable data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a required column is absent from the header.
    #[error("missing column \"{column}\" in {path}")]
    MissingColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// Name of the column that was expected.
        column: String,
    },

    /// Returned when a timestamp matches none of the accepted formats.
    #[error("invalid timestamp in {path}: row {row_index}, raw value \"{raw}\"")]
    InvalidTimestamp {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when a coordinate is NaN, Inf, or otherwise not a finite float.
    #[error("non-finite {column} in {path}: row {row_index}, raw value \"{raw}\"")]
    NonFiniteValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Column the value came from.
        column: &'static str,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when the run name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid run name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidRunName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a persisted artifact cannot be read.
    #[error("cannot read artifact {path}")]
    ReadArtifact {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact kind has no on-disk form.
    #[error("{kind} artifacts are not persisted")]
    NotPersisted {
        /// The offending kind.
        kind: ArtifactKind,
    },

    /// Returned when bincode encoding fails.
    #[error("cannot encode {kind} artifact")]
    SerializeArtifact {
        /// Kind being saved.
        kind: ArtifactKind,
        /// Underlying bincode error.
        source: bincode::Error,
    },

    /// Returned when bincode decoding fails.
    #[error("cannot decode artifact {path}")]
    DeserializeArtifact {
        /// Path to the artifact file.
        path: PathBuf,
        /// Underlying bincode error.
        source: bincode::Error,
    },

    /// Returned when the artifact was written by an incompatible format version.
    #[error("artifact {path} has format version {found}, expected {expected}")]
    IncompatibleArtifactVersion {
        /// Path to the artifact file.
        path: PathBuf,
        /// Version this build reads.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Returned when the file holds a different artifact kind than requested.
    #[error("artifact {path} holds {found}, expected {expected}")]
    ArtifactKindMismatch {
        /// Path to the artifact file.
        path: PathBuf,
        /// Kind requested.
        expected: ArtifactKind,
        /// Kind found in the file.
        found: ArtifactKind,
    },

    /// Returned when JSON encoding of a result fails.
    #[error("cannot encode {what} as JSON")]
    SerializeJson {
        /// What was being written.
        what: &'static str,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when voyage IDs and cluster assignments differ in length.
    #[error("{ids} voyage IDs but {assignments} cluster assignments")]
    LengthMismatch {
        /// Number of voyage IDs.
        ids: usize,
        /// Number of assignments.
        assignments: usize,
    },
}
