//! DTW distance newtype wrapper.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DtwError;

/// A non-negative DTW distance value.
///
/// Serialized as a plain number; deserialization rejects negative and
/// non-finite values.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct DtwDistance(f64);

impl From<DtwDistance> for f64 {
    fn from(d: DtwDistance) -> Self {
        d.0
    }
}

impl TryFrom<f64> for DtwDistance {
    type Error = DtwError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl DtwDistance {
    /// Zero distance, the value on the matrix diagonal.
    pub const ZERO: Self = Self(0.0);

    /// Create a new DTW distance from a raw value known to be valid.
    pub(crate) fn new(value: f64) -> Self {
        debug_assert!(value >= 0.0, "DTW distance must be non-negative, got {value}");
        Self(value)
    }

    /// Create a DTW distance from an externally supplied value.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::InvalidDistance`] | `value` is negative, NaN, or infinite |
    pub fn try_new(value: f64) -> Result<Self, DtwError> {
        if !(value.is_finite() && value >= 0.0) {
            return Err(DtwError::InvalidDistance { value });
        }
        Ok(Self(value))
    }

    /// Return the raw distance value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Total ordering comparison using [`f64::total_cmp`].
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for DtwDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}
