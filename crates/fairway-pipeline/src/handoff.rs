//! The artifact handed to the rendering collaborator.

use std::collections::HashMap;

use fairway_cluster::Assignment;
use fairway_track::{FeatureAnnotatedVoyage, VoyageId};
use serde::{Deserialize, Serialize};

use crate::context::VoyageClusters;

/// Annotated voyages plus, when clustering has run, their labels.
///
/// `labels[k]` and `anomalies[k]` describe `voyages[k]`. A voyage that was
/// not part of the clustered set has no label. Anomaly flags are only
/// filled when at least one voyage is noise; noise voyages are anomalous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderHandoff {
    /// Voyages to draw.
    pub voyages: Vec<FeatureAnnotatedVoyage>,
    /// Cluster assignment per voyage.
    pub labels: Option<Vec<Option<Assignment>>>,
    /// Noise flag per voyage.
    pub anomalies: Option<Vec<bool>>,
}

impl RenderHandoff {
    pub(crate) fn new(voyages: Vec<FeatureAnnotatedVoyage>, clusters: Option<&VoyageClusters>) -> Self {
        let Some(clusters) = clusters else {
            return Self {
                voyages,
                labels: None,
                anomalies: None,
            };
        };

        let by_id: HashMap<&VoyageId, Assignment> = clusters
            .voyage_ids
            .iter()
            .zip(&clusters.result.assignments)
            .map(|(id, &a)| (id, a))
            .collect();
        let labels: Vec<Option<Assignment>> = voyages
            .iter()
            .map(|v| by_id.get(v.id()).copied())
            .collect();
        let anomalies = labels
            .iter()
            .any(|l| l.is_some_and(Assignment::is_noise))
            .then(|| labels.iter().map(|l| l.is_some_and(Assignment::is_noise)).collect());

        Self {
            voyages,
            labels: Some(labels),
            anomalies,
        }
    }
}
