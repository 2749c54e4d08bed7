use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// A cluster assignment label. Wraps a zero-based cluster index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterLabel(usize);

impl ClusterLabel {
    /// Create a new cluster label from a zero-based index.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based cluster index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a voyage ended up: in a cluster, or noise.
///
/// Serialized as a plain integer, `-1` for noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Assignment {
    /// Member of a cluster.
    Cluster(ClusterLabel),
    /// Not density-reachable from any core voyage.
    Noise,
}

impl Assignment {
    /// Return the cluster label, or `None` for noise.
    #[must_use]
    pub fn label(self) -> Option<ClusterLabel> {
        match self {
            Self::Cluster(label) => Some(label),
            Self::Noise => None,
        }
    }

    /// Return true for noise.
    #[must_use]
    pub fn is_noise(self) -> bool {
        matches!(self, Self::Noise)
    }
}

impl From<Assignment> for i64 {
    fn from(assignment: Assignment) -> Self {
        match assignment {
            Assignment::Cluster(label) => label.index() as i64,
            Assignment::Noise => -1,
        }
    }
}

impl TryFrom<i64> for Assignment {
    type Error = ClusterError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Noise),
            v if v >= 0 => Ok(Self::Cluster(ClusterLabel::new(v as usize))),
            _ => Err(ClusterError::InvalidAssignment { value }),
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster(label) => write!(f, "{label}"),
            Self::Noise => f.write_str("noise"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let label = ClusterLabel::new(7);
        assert_eq!(label.index(), 7);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", ClusterLabel::new(3)), "3");
        assert_eq!(format!("{}", Assignment::Cluster(ClusterLabel::new(3))), "3");
        assert_eq!(format!("{}", Assignment::Noise), "noise");
    }

    #[test]
    fn ordering() {
        assert!(ClusterLabel::new(1) < ClusterLabel::new(5));
    }

    #[test]
    fn noise_serializes_as_minus_one() {
        let assignments = vec![
            Assignment::Cluster(ClusterLabel::new(0)),
            Assignment::Noise,
            Assignment::Cluster(ClusterLabel::new(2)),
        ];
        let json = serde_json::to_string(&assignments).unwrap();
        assert_eq!(json, "[0,-1,2]");
        let back: Vec<Assignment> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, assignments);
    }

    #[test]
    fn rejects_other_negatives() {
        assert!(matches!(
            Assignment::try_from(-2),
            Err(ClusterError::InvalidAssignment { value: -2 })
        ));
        assert!(serde_json::from_str::<Assignment>("-5").is_err());
    }

    #[test]
    fn accessors() {
        let a = Assignment::Cluster(ClusterLabel::new(4));
        assert_eq!(a.label(), Some(ClusterLabel::new(4)));
        assert!(!a.is_noise());
        assert_eq!(Assignment::Noise.label(), None);
        assert!(Assignment::Noise.is_noise());
    }
}
