//! Voyage types with construction-time invariants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TrackError;
use crate::report::{PositionReport, ShipId};

/// Identifier of one voyage: the ship plus a per-ship sequence number.
///
/// Rendered as `{ship}_{sequence}`, sequences counting from zero in time order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoyageId(String);

impl VoyageId {
    /// Build the identifier of the `sequence`-th voyage of `ship`.
    #[must_use]
    pub fn new(ship: &ShipId, sequence: usize) -> Self {
        Self(format!("{ship}_{sequence}"))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoyageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A continuous under-way segment of one ship's reports.
///
/// Guaranteed to hold at least two reports, all from the same ship, with
/// strictly increasing timestamps. Deserialization re-checks all of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VoyageRecord")]
pub struct Voyage {
    id: VoyageId,
    ship_id: ShipId,
    reports: Vec<PositionReport>,
}

#[derive(Deserialize)]
struct VoyageRecord {
    id: VoyageId,
    ship_id: ShipId,
    reports: Vec<PositionReport>,
}

impl TryFrom<VoyageRecord> for Voyage {
    type Error = TrackError;

    fn try_from(record: VoyageRecord) -> Result<Self, Self::Error> {
        let voyage = Self::new(record.id, record.reports)?;
        if voyage.ship_id != record.ship_id {
            return Err(TrackError::MixedShips {
                expected: record.ship_id,
                found: voyage.ship_id,
            });
        }
        Ok(voyage)
    }
}

impl Voyage {
    /// Create a voyage, validating its invariants.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::TooFewReports`] | fewer than two reports |
    /// | [`TrackError::MixedShips`] | reports from more than one ship |
    /// | [`TrackError::DuplicateTimestamp`] | two reports share a timestamp |
    /// | [`TrackError::UnsortedTimestamps`] | a timestamp precedes its predecessor |
    pub fn new(id: VoyageId, reports: Vec<PositionReport>) -> Result<Self, TrackError> {
        if reports.len() < 2 {
            return Err(TrackError::TooFewReports { len: reports.len() });
        }
        let ship_id = reports[0].ship_id.clone();
        for (index, pair) in reports.windows(2).enumerate() {
            let (prev, curr) = (&pair[0], &pair[1]);
            if curr.ship_id != ship_id {
                return Err(TrackError::MixedShips {
                    expected: ship_id,
                    found: curr.ship_id.clone(),
                });
            }
            if curr.timestamp == prev.timestamp {
                return Err(TrackError::DuplicateTimestamp {
                    index: index + 1,
                    ship_id,
                    timestamp: curr.timestamp,
                });
            }
            if curr.timestamp < prev.timestamp {
                return Err(TrackError::UnsortedTimestamps {
                    index: index + 1,
                    ship_id,
                    timestamp: curr.timestamp,
                    previous: prev.timestamp,
                });
            }
        }
        Ok(Self {
            id,
            ship_id,
            reports,
        })
    }

    /// Construct without validation. Callers must uphold the invariants.
    pub(crate) fn new_unchecked(id: VoyageId, ship_id: ShipId, reports: Vec<PositionReport>) -> Self {
        debug_assert!(reports.len() >= 2);
        Self {
            id,
            ship_id,
            reports,
        }
    }

    /// Return the voyage identifier.
    #[must_use]
    pub fn id(&self) -> &VoyageId {
        &self.id
    }

    /// Return the ship that sailed this voyage.
    #[must_use]
    pub fn ship_id(&self) -> &ShipId {
        &self.ship_id
    }

    /// Return the reports in time order.
    #[must_use]
    pub fn reports(&self) -> &[PositionReport] {
        &self.reports
    }

    /// Return the number of reports. Always at least two.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Always `false`; provided for the `len_without_is_empty` convention.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::report::NavigationalStatus;

    fn report(ship: &str, minute: i64) -> PositionReport {
        let t0 = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
        PositionReport::new(
            ShipId::new(ship),
            t0 + Duration::minutes(minute),
            57.0,
            10.0 + minute as f64 * 0.01,
            NavigationalStatus::UnderWayUsingEngine,
        )
    }

    #[test]
    fn voyage_id_format() {
        let id = VoyageId::new(&ShipId::new("9428217"), 3);
        assert_eq!(id.as_str(), "9428217_3");
    }

    #[test]
    fn valid_voyage() {
        let v = Voyage::new(
            VoyageId::new(&ShipId::new("A"), 0),
            vec![report("A", 0), report("A", 5)],
        )
        .unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v.ship_id().as_str(), "A");
    }

    #[test]
    fn rejects_single_report() {
        let result = Voyage::new(VoyageId::new(&ShipId::new("A"), 0), vec![report("A", 0)]);
        assert!(matches!(result, Err(TrackError::TooFewReports { len: 1 })));
    }

    #[test]
    fn rejects_mixed_ships() {
        let result = Voyage::new(
            VoyageId::new(&ShipId::new("A"), 0),
            vec![report("A", 0), report("B", 5)],
        );
        assert!(matches!(result, Err(TrackError::MixedShips { .. })));
    }

    #[test]
    fn rejects_duplicate_and_unsorted() {
        let id = VoyageId::new(&ShipId::new("A"), 0);
        let dup = Voyage::new(id.clone(), vec![report("A", 0), report("A", 0)]);
        assert!(matches!(dup, Err(TrackError::DuplicateTimestamp { index: 1, .. })));

        let back = Voyage::new(id, vec![report("A", 5), report("A", 0)]);
        assert!(matches!(back, Err(TrackError::UnsortedTimestamps { index: 1, .. })));
    }

    #[test]
    fn deserialization_rechecks_invariants() {
        let v = Voyage::new(
            VoyageId::new(&ShipId::new("A"), 0),
            vec![report("A", 0), report("A", 5), report("A", 10)],
        )
        .unwrap();
        let back: Voyage = serde_json::from_str(&serde_json::to_string(&v).unwrap()).unwrap();
        assert_eq!(back, v);

        let mut unsorted = serde_json::to_value(&v).unwrap();
        unsorted["reports"].as_array_mut().unwrap().swap(0, 2);
        assert!(serde_json::from_value::<Voyage>(unsorted).is_err());

        let mut single = serde_json::to_value(&v).unwrap();
        single["reports"].as_array_mut().unwrap().truncate(1);
        assert!(serde_json::from_value::<Voyage>(single).is_err());

        let mut relabelled = serde_json::to_value(&v).unwrap();
        relabelled["ship_id"] = serde_json::json!("B");
        assert!(serde_json::from_value::<Voyage>(relabelled).is_err());
    }
}
