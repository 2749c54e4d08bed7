//! AIS position-report CSV reader with full input validation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use fairway_track::{NavigationalStatus, PositionReport, ShipId};
use tracing::{debug, info, instrument, warn};

use crate::IoError;
use crate::domain::ReportDataset;

const SHIP_COLUMN: &str = "IMO";
const LATITUDE_COLUMN: &str = "Latitude";
const LONGITUDE_COLUMN: &str = "Longitude";
const TIMESTAMP_COLUMN: &str = "Timestamp_datetime";
const STATUS_COLUMNS: [&str; 2] = ["Navigational status", "Navigational status (text)"];
const MMSI_COLUMN: &str = "MMSI";
const SOG_COLUMN: &str = "SOG";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Reads AIS position reports from a CSV file.
///
/// Columns are located by header name, so column order and extra columns
/// do not matter. Required: `IMO`, `Latitude`, `Longitude`,
/// `Timestamp_datetime`, and one of `Navigational status` /
/// `Navigational status (text)`. Optional: `MMSI`, `SOG`.
///
/// Rows with a blank `IMO` are skipped and counted. The output is sorted by
/// ship then timestamp, and rows repeating an earlier `(ship, timestamp)`
/// pair are dropped.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumn`] | A required header is absent |
/// | [`IoError::NonFiniteValue`] | Latitude or longitude is NaN, Inf, or unparseable |
/// | [`IoError::InvalidTimestamp`] | Timestamp matches no accepted format |
/// | [`IoError::EmptyDataset`] | No usable data rows |
pub struct ReportReader {
    path: PathBuf,
}

struct Columns {
    ship: usize,
    latitude: usize,
    longitude: usize,
    timestamp: usize,
    status: usize,
    mmsi: Option<usize>,
    sog: Option<usize>,
}

impl ReportReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`ReportDataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<ReportDataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let columns = self.locate_columns(&header)?;
        debug!(n_columns = header.len(), "read CSV header");

        let mut reports = Vec::new();
        let mut missing_ship_id = 0usize;

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

            let ship = normalize_ship_id(cell(columns.ship));
            if ship.is_empty() {
                missing_ship_id += 1;
                continue;
            }

            let latitude = self.coordinate(cell(columns.latitude), row_index, LATITUDE_COLUMN)?;
            let longitude =
                self.coordinate(cell(columns.longitude), row_index, LONGITUDE_COLUMN)?;
            let raw_ts = cell(columns.timestamp);
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| IoError::InvalidTimestamp {
                path: self.path.clone(),
                row_index,
                raw: raw_ts.to_string(),
            })?;
            let Ok(status) = cell(columns.status).parse::<NavigationalStatus>();

            let mut report =
                PositionReport::new(ShipId::new(ship), timestamp, latitude, longitude, status);
            if let Some(mmsi) = columns.mmsi.map(cell).filter(|s| !s.is_empty()) {
                report = report.with_mmsi(normalize_ship_id(mmsi));
            }
            if let Some(sog) = columns
                .sog
                .and_then(|idx| cell(idx).parse::<f64>().ok())
                .filter(|v| v.is_finite())
            {
                report = report.with_speed_over_ground(sog);
            }
            reports.push(report);
        }

        if reports.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        reports.sort_by(|a, b| {
            a.ship_id
                .cmp(&b.ship_id)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        let before = reports.len();
        reports.dedup_by(|later, earlier| {
            later.ship_id == earlier.ship_id && later.timestamp == earlier.timestamp
        });
        let duplicates_removed = before - reports.len();
        if duplicates_removed > 0 {
            warn!(duplicates_removed, "dropped duplicate (ship, timestamp) reports");
        }
        if missing_ship_id > 0 {
            warn!(missing_ship_id, "skipped rows without a ship identifier");
        }

        info!(n_reports = reports.len(), "reports loaded");

        Ok(ReportDataset {
            reports,
            duplicates_removed,
            missing_ship_id,
        })
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }

    fn locate_columns(&self, header: &csv::StringRecord) -> Result<Columns, IoError> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| IoError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
        };
        let status = STATUS_COLUMNS
            .iter()
            .find_map(|name| find(name))
            .ok_or_else(|| IoError::MissingColumn {
                path: self.path.clone(),
                column: STATUS_COLUMNS[0].to_string(),
            })?;

        Ok(Columns {
            ship: require(SHIP_COLUMN)?,
            latitude: require(LATITUDE_COLUMN)?,
            longitude: require(LONGITUDE_COLUMN)?,
            timestamp: require(TIMESTAMP_COLUMN)?,
            status,
            mmsi: find(MMSI_COLUMN),
            sog: find(SOG_COLUMN),
        })
    }

    fn coordinate(&self, raw: &str, row_index: usize, column: &'static str) -> Result<f64, IoError> {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| IoError::NonFiniteValue {
                path: self.path.clone(),
                row_index,
                column,
                raw: raw.to_string(),
            })
    }
}

/// Strip a trailing `.0` that spreadsheet exports add to integer IDs.
pub(crate) fn normalize_ship_id(raw: &str) -> String {
    let raw = raw.trim();
    match raw.split_once('.') {
        Some((int, frac))
            if !int.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b == b'0') =>
        {
            int.to_string()
        }
        _ => raw.to_string(),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}
