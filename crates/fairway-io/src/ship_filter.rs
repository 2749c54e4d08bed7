//! Reader for the ship-metadata file that scopes a run to a set of vessels.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use fairway_track::ShipId;
use tracing::{info, instrument};

use crate::IoError;
use crate::reader::normalize_ship_id;

/// Reads one column of ship identifiers from a metadata CSV.
///
/// # Defaults
///
/// | Parameter | Default        |
/// |-----------|----------------|
/// | `column`  | `imo_chemical` |
pub struct ShipFilterReader {
    path: PathBuf,
    column: String,
}

impl ShipFilterReader {
    /// Create a reader for the given metadata CSV.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            column: "imo_chemical".to_string(),
        }
    }

    /// Read identifiers from `column` instead of the default.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Read the identifier column. Blank cells are skipped.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
    /// | [`IoError::CsvParse`] | Malformed CSV record |
    /// | [`IoError::MissingColumn`] | The identifier column is absent |
    /// | [`IoError::EmptyDataset`] | No identifiers in the column |
    #[instrument(skip(self), fields(path = %self.path.display(), column = %self.column))]
    pub fn read(&self) -> Result<HashSet<ShipId>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let csv_error = |e: csv::Error| IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        };

        let idx = rdr
            .headers()
            .map_err(csv_error)?
            .iter()
            .position(|h| h.trim() == self.column)
            .ok_or_else(|| IoError::MissingColumn {
                path: self.path.clone(),
                column: self.column.clone(),
            })?;

        let mut ships = HashSet::new();
        for result in rdr.records() {
            let record = result.map_err(csv_error)?;
            let id = normalize_ship_id(record.get(idx).unwrap_or(""));
            if !id.is_empty() {
                ships.insert(ShipId::new(id));
            }
        }

        if ships.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }
        info!(n_ships = ships.len(), "ship filter loaded");
        Ok(ships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn reads_default_column() {
        let f = write_csv("name,imo_chemical\nA,9428217.0\nB,\nC,9000001\nD,9000001\n");
        let ships = ShipFilterReader::new(f.path()).read().unwrap();
        assert_eq!(ships.len(), 2);
        assert!(ships.contains(&ShipId::new("9428217")));
        assert!(ships.contains(&ShipId::new("9000001")));
    }

    #[test]
    fn custom_column() {
        let f = write_csv("imo,flag\n1,DK\n2,SE\n");
        let ships = ShipFilterReader::new(f.path())
            .with_column("imo")
            .read()
            .unwrap();
        assert_eq!(ships.len(), 2);
    }

    #[test]
    fn missing_column_returns_error() {
        let f = write_csv("imo\n1\n");
        assert!(matches!(
            ShipFilterReader::new(f.path()).read(),
            Err(IoError::MissingColumn { .. })
        ));
    }
}
