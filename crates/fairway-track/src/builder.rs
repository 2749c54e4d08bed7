//! Segmentation of an ordered report stream into voyages.

use std::collections::HashSet;
use std::mem;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::TrackError;
use crate::geo::BoundingBox;
use crate::report::{NavigationalStatus, PositionReport, ShipId};
use crate::voyage::{Voyage, VoyageId};

/// Groups reports sorted by ship then timestamp into voyages.
///
/// A new voyage starts when the ship changes, when the under-way predicate
/// goes false and back to true, when consecutive in-voyage reports are more
/// than `max_gap` apart, or when the ship leaves and re-enters the bounding
/// box. Segments with a single report are dropped and counted.
///
/// Construct via [`VoyageBuilder::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter      | Default                              |
/// |----------------|--------------------------------------|
/// | `under_way`    | [`NavigationalStatus::is_under_way`] |
/// | `max_gap`      | 24 hours                             |
/// | `bounding_box` | none                                 |
/// | `ship_filter`  | none (all ships in scope)            |
#[derive(Debug, Clone)]
pub struct VoyageBuilder {
    under_way: fn(NavigationalStatus) -> bool,
    max_gap: Option<Duration>,
    bounding_box: Option<BoundingBox>,
    ship_filter: Option<HashSet<ShipId>>,
}

impl Default for VoyageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VoyageBuilder {
    /// Create a builder with the default segmentation rules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            under_way: NavigationalStatus::is_under_way,
            max_gap: Some(Duration::hours(24)),
            bounding_box: None,
            ship_filter: None,
        }
    }

    /// Replace the predicate deciding whether a status counts as under way.
    #[must_use]
    pub fn with_under_way(mut self, predicate: fn(NavigationalStatus) -> bool) -> Self {
        self.under_way = predicate;
        self
    }

    /// Set the largest gap tolerated inside one voyage. `None` disables the rule.
    #[must_use]
    pub fn with_max_gap(mut self, max_gap: Option<Duration>) -> Self {
        self.max_gap = max_gap;
        self
    }

    /// Restrict voyages to a region. Reports outside it end the current voyage.
    #[must_use]
    pub fn with_bounding_box(mut self, bounding_box: Option<BoundingBox>) -> Self {
        self.bounding_box = bounding_box;
        self
    }

    /// Keep only reports from the given ships.
    #[must_use]
    pub fn with_ship_filter(mut self, ships: Option<HashSet<ShipId>>) -> Self {
        self.ship_filter = ships;
        self
    }

    /// Split the report stream into voyages.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TrackError::NonPositiveWindow`] | `max_gap` is zero or negative |
    /// | [`TrackError::NonFiniteCoordinate`] | a report has NaN/infinite coordinates |
    /// | [`TrackError::UnsortedShips`] | a ship reappears after another ship |
    /// | [`TrackError::UnsortedTimestamps`] | a ship's timestamps go backwards |
    /// | [`TrackError::DuplicateTimestamp`] | a ship reports twice at one instant |
    #[instrument(skip_all, fields(n_reports = reports.len()))]
    pub fn build(&self, reports: &[PositionReport]) -> Result<BuildOutcome, TrackError> {
        if let Some(gap) = self.max_gap
            && gap <= Duration::zero()
        {
            return Err(TrackError::NonPositiveWindow {
                name: "max gap",
                seconds: gap.num_seconds(),
            });
        }

        let mut diagnostics = BuildDiagnostics {
            reports_read: reports.len(),
            ..BuildDiagnostics::default()
        };
        let mut voyages = Vec::new();
        let mut finished: HashSet<&ShipId> = HashSet::new();
        let mut cursor: Option<ShipCursor<'_>> = None;

        for (index, report) in reports.iter().enumerate() {
            if !report.latitude.is_finite() || !report.longitude.is_finite() {
                return Err(TrackError::NonFiniteCoordinate {
                    index,
                    ship_id: report.ship_id.clone(),
                    latitude: report.latitude,
                    longitude: report.longitude,
                });
            }

            if cursor.as_ref().is_some_and(|c| c.ship != &report.ship_id)
                && let Some(done) = cursor.take()
            {
                finished.insert(done.ship);
                done.finish(&mut voyages, &mut diagnostics);
            }
            if cursor.is_none() && finished.contains(&report.ship_id) {
                return Err(TrackError::UnsortedShips {
                    index,
                    ship_id: report.ship_id.clone(),
                });
            }
            let c = cursor.get_or_insert_with(|| {
                let in_scope = self
                    .ship_filter
                    .as_ref()
                    .is_none_or(|ships| ships.contains(&report.ship_id));
                ShipCursor::new(&report.ship_id, in_scope)
            });

            if let Some(previous) = c.last_timestamp {
                if report.timestamp == previous {
                    return Err(TrackError::DuplicateTimestamp {
                        index,
                        ship_id: report.ship_id.clone(),
                        timestamp: report.timestamp,
                    });
                }
                if report.timestamp < previous {
                    return Err(TrackError::UnsortedTimestamps {
                        index,
                        ship_id: report.ship_id.clone(),
                        timestamp: report.timestamp,
                        previous,
                    });
                }
            }
            c.last_timestamp = Some(report.timestamp);

            if !c.in_scope {
                diagnostics.filtered_out += 1;
                continue;
            }
            if !(self.under_way)(report.status) {
                diagnostics.not_under_way += 1;
                c.close_segment(&mut voyages, &mut diagnostics);
                continue;
            }
            if let Some(bbox) = &self.bounding_box
                && !bbox.contains(report.latitude, report.longitude)
            {
                diagnostics.outside_region += 1;
                c.close_segment(&mut voyages, &mut diagnostics);
                continue;
            }
            if let Some(gap) = self.max_gap
                && let Some(last) = c.segment.last()
                && report.timestamp - last.timestamp > gap
            {
                c.close_segment(&mut voyages, &mut diagnostics);
            }
            c.segment.push(report.clone());
        }

        if let Some(done) = cursor.take() {
            done.finish(&mut voyages, &mut diagnostics);
        }
        diagnostics.voyages = voyages.len();

        if diagnostics.degenerate_voyages > 0 {
            warn!(
                count = diagnostics.degenerate_voyages,
                "dropped single-report voyages"
            );
        }
        if diagnostics.ships_without_voyage > 0 {
            warn!(
                count = diagnostics.ships_without_voyage,
                "ships produced no under-way voyage"
            );
        }
        info!(
            voyages = diagnostics.voyages,
            ships = diagnostics.ships_seen,
            filtered_out = diagnostics.filtered_out,
            "voyages built"
        );

        Ok(BuildOutcome {
            voyages,
            diagnostics,
        })
    }
}

/// Per-ship state while walking the report stream.
struct ShipCursor<'a> {
    ship: &'a ShipId,
    in_scope: bool,
    last_timestamp: Option<DateTime<Utc>>,
    segment: Vec<PositionReport>,
    sequence: usize,
}

impl<'a> ShipCursor<'a> {
    fn new(ship: &'a ShipId, in_scope: bool) -> Self {
        Self {
            ship,
            in_scope,
            last_timestamp: None,
            segment: Vec::new(),
            sequence: 0,
        }
    }

    fn close_segment(&mut self, voyages: &mut Vec<Voyage>, diagnostics: &mut BuildDiagnostics) {
        let reports = mem::take(&mut self.segment);
        match reports.len() {
            0 => {}
            1 => {
                debug!(ship = %self.ship, "single-report segment dropped");
                diagnostics.degenerate_voyages += 1;
            }
            _ => {
                let id = VoyageId::new(self.ship, self.sequence);
                self.sequence += 1;
                voyages.push(Voyage::new_unchecked(id, self.ship.clone(), reports));
            }
        }
    }

    fn finish(mut self, voyages: &mut Vec<Voyage>, diagnostics: &mut BuildDiagnostics) {
        self.close_segment(voyages, diagnostics);
        if self.in_scope {
            diagnostics.ships_seen += 1;
            if self.sequence == 0 {
                diagnostics.ships_without_voyage += 1;
            }
        }
    }
}

/// Counters describing what the builder kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDiagnostics {
    /// Reports in the input stream.
    pub reports_read: usize,
    /// Reports skipped because their ship is out of scope.
    pub filtered_out: usize,
    /// Reports skipped because the ship was not under way.
    pub not_under_way: usize,
    /// Reports skipped because they fell outside the bounding box.
    pub outside_region: usize,
    /// Voyages kept.
    pub voyages: usize,
    /// Single-report segments dropped.
    pub degenerate_voyages: usize,
    /// In-scope ships encountered.
    pub ships_seen: usize,
    /// In-scope ships that produced no voyage.
    pub ships_without_voyage: usize,
}

/// Voyages plus the diagnostics of the pass that produced them.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Voyages in input order (ship, then time).
    pub voyages: Vec<Voyage>,
    /// What was kept and dropped.
    pub diagnostics: BuildDiagnostics,
}
