//! Position report types as delivered by the ingestion collaborator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stable vessel identifier (IMO number in the AIS feed).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipId(String);

impl ShipId {
    /// Create a ship identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// AIS navigational status, parsed from its text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationalStatus {
    /// "Under way using engine".
    #[serde(rename = "Under way using engine")]
    UnderWayUsingEngine,
    /// "Under way sailing".
    #[serde(rename = "Under way sailing")]
    UnderWaySailing,
    /// "Engaged in fishing".
    #[serde(rename = "Engaged in fishing")]
    EngagedInFishing,
    /// "Restricted maneuverability".
    #[serde(rename = "Restricted maneuverability")]
    RestrictedManeuverability,
    /// "Constrained by her draught".
    #[serde(rename = "Constrained by her draught")]
    ConstrainedByDraught,
    /// "Not under command".
    #[serde(rename = "Not under command")]
    NotUnderCommand,
    /// "Moored".
    #[serde(rename = "Moored")]
    Moored,
    /// "At anchor" (some feeds write plain "Anchor").
    #[serde(rename = "At anchor")]
    AtAnchor,
    /// "Aground".
    #[serde(rename = "Aground")]
    Aground,
    /// "Unknown value" or an empty field.
    #[serde(rename = "Unknown value")]
    Unknown,
    /// Any other text, including the reserved codes.
    Other,
}

impl NavigationalStatus {
    /// Default "under way" predicate: every status except moored and at anchor.
    ///
    /// Reports with an unknown status still count as moving, so a feed that
    /// omits the status does not collapse into zero voyages.
    #[must_use]
    pub fn is_under_way(self) -> bool {
        !matches!(self, Self::Moored | Self::AtAnchor)
    }
}

impl FromStr for NavigationalStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_lowercase().as_str() {
            "under way using engine" => Self::UnderWayUsingEngine,
            "under way sailing" => Self::UnderWaySailing,
            "engaged in fishing" => Self::EngagedInFishing,
            "restricted maneuverability" | "restricted manoeuvrability" => {
                Self::RestrictedManeuverability
            }
            "constrained by her draught" => Self::ConstrainedByDraught,
            "not under command" => Self::NotUnderCommand,
            "moored" => Self::Moored,
            "at anchor" | "anchor" | "anchored" => Self::AtAnchor,
            "aground" => Self::Aground,
            "" | "unknown value" | "unknown" => Self::Unknown,
            _ => Self::Other,
        };
        Ok(status)
    }
}

/// One AIS position report. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    /// Stable vessel identifier.
    pub ship_id: ShipId,
    /// Radio identifier, when the feed carries one.
    pub mmsi: Option<String>,
    /// Report time.
    pub timestamp: DateTime<Utc>,
    /// WGS84 latitude in decimal degrees.
    pub latitude: f64,
    /// WGS84 longitude in decimal degrees.
    pub longitude: f64,
    /// Speed over ground in knots, when reported.
    pub speed_over_ground: Option<f64>,
    /// Navigational status at report time.
    pub status: NavigationalStatus,
}

impl PositionReport {
    /// Create a report without the optional MMSI and speed fields.
    pub fn new(
        ship_id: ShipId,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        status: NavigationalStatus,
    ) -> Self {
        Self {
            ship_id,
            mmsi: None,
            timestamp,
            latitude,
            longitude,
            speed_over_ground: None,
            status,
        }
    }

    /// Attach a speed over ground.
    #[must_use]
    pub fn with_speed_over_ground(mut self, knots: f64) -> Self {
        self.speed_over_ground = Some(knots);
        self
    }

    /// Attach an MMSI.
    #[must_use]
    pub fn with_mmsi(mut self, mmsi: impl Into<String>) -> Self {
        self.mmsi = Some(mmsi.into());
        self
    }
}
