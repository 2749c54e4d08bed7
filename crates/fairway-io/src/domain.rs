//! Domain types for fairway-io.

use std::fmt;

use fairway_track::PositionReport;
use serde::{Deserialize, Serialize};

use crate::IoError;

/// A validated run name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunName(String);

impl RunName {
    /// Parse and validate a run name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidRunName`] if the name is empty or contains
    /// characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, IoError> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidRunName { name });
        }
        Ok(Self(name))
    }

    /// Return the run name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The artifacts that flow between pipeline stages.
///
/// Declared in pipeline order: each kind is derived from the kinds before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Raw position reports; supplied by ingestion, never persisted.
    Reports,
    /// Feature-annotated voyages.
    Voyages,
    /// Compressed trajectories.
    Compressed,
    /// Pairwise DTW distance matrix.
    DistanceMatrix,
    /// Voyage IDs with their cluster assignment.
    Clusters,
}

impl ArtifactKind {
    /// Return the file stem used when persisting, or `None` for kinds that are never stored.
    #[must_use]
    pub fn stem(self) -> Option<&'static str> {
        match self {
            Self::Reports => None,
            Self::Voyages => Some("voyages"),
            Self::Compressed => Some("compressed"),
            Self::DistanceMatrix => Some("proximity"),
            Self::Clusters => Some("clusters"),
        }
    }

    /// Return true when this kind can be saved to and loaded from an artifact store.
    #[must_use]
    pub fn is_persisted(self) -> bool {
        self.stem().is_some()
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reports => "reports",
            Self::Voyages => "voyages",
            Self::Compressed => "compressed trajectories",
            Self::DistanceMatrix => "distance matrix",
            Self::Clusters => "clusters",
        };
        f.write_str(name)
    }
}

/// Position reports read from an AIS CSV file.
///
/// Produced by [`ReportReader`](crate::ReportReader), sorted by ship then
/// timestamp with exact `(ship, timestamp)` duplicates removed.
#[derive(Debug, Clone)]
pub struct ReportDataset {
    /// Reports in `(ship, timestamp)` order.
    pub reports: Vec<PositionReport>,
    /// Rows dropped because they repeated an earlier `(ship, timestamp)`.
    pub duplicates_removed: usize,
    /// Rows dropped because the ship identifier was blank.
    pub missing_ship_id: usize,
}
