//! Versioned on-disk store for intermediate pipeline artifacts.
//!
//! Each artifact is one bincode file `{run}_{stem}.bin` holding an envelope
//! of format version, artifact kind, run name, and payload. Loading checks
//! the version and kind before decoding the payload.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{ArtifactKind, RunName};

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format_version: u32,
    kind: ArtifactKind,
    run: &'a str,
    payload: &'a T,
}

/// Envelope fields as decoded; bincode lays a struct out as a tuple of its fields.
type EnvelopeHeader = (u32, ArtifactKind, String);

/// Saves and loads pipeline artifacts for one run.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    run: RunName,
}

impl ArtifactStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    pub fn new(dir: &Path, run: RunName) -> Result<Self, IoError> {
        fs::create_dir_all(dir).map_err(|e| IoError::OutputDirCreate {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            run,
        })
    }

    /// Return the run this store belongs to.
    pub fn run(&self) -> &RunName {
        &self.run
    }

    /// Return the file path for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::NotPersisted`] for [`ArtifactKind::Reports`].
    pub fn path(&self, kind: ArtifactKind) -> Result<PathBuf, IoError> {
        let stem = kind.stem().ok_or(IoError::NotPersisted { kind })?;
        Ok(self.dir.join(format!("{}_{stem}.bin", self.run)))
    }

    /// Return true when an artifact of `kind` has been saved for this run.
    pub fn exists(&self, kind: ArtifactKind) -> bool {
        self.path(kind).is_ok_and(|p| p.is_file())
    }

    /// Save `payload` as the artifact of `kind`, replacing any earlier file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::NotPersisted`] | `kind` has no on-disk form |
    /// | [`IoError::SerializeArtifact`] | bincode encoding failed |
    /// | [`IoError::WriteFile`] | file write failed |
    #[instrument(skip(self, payload), fields(run = %self.run))]
    pub fn save<T: Serialize>(&self, kind: ArtifactKind, payload: &T) -> Result<PathBuf, IoError> {
        let path = self.path(kind)?;
        let envelope = EnvelopeRef {
            format_version: FORMAT_VERSION,
            kind,
            run: self.run.as_str(),
            payload,
        };
        let bytes = bincode::serialize(&envelope)
            .map_err(|e| IoError::SerializeArtifact { kind, source: e })?;
        fs::write(&path, &bytes).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        info!(size_bytes = bytes.len(), path = %path.display(), "artifact saved");
        Ok(path)
    }

    /// Load the artifact of `kind`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::NotPersisted`] | `kind` has no on-disk form |
    /// | [`IoError::ReadArtifact`] | file read failed |
    /// | [`IoError::DeserializeArtifact`] | bincode decoding failed |
    /// | [`IoError::IncompatibleArtifactVersion`] | format version mismatch |
    /// | [`IoError::ArtifactKindMismatch`] | file holds a different kind |
    #[instrument(skip(self), fields(run = %self.run))]
    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T, IoError> {
        let path = self.path(kind)?;
        let bytes = fs::read(&path).map_err(|e| IoError::ReadArtifact {
            path: path.clone(),
            source: e,
        })?;
        let decode_error = |e: bincode::Error| IoError::DeserializeArtifact {
            path: path.clone(),
            source: e,
        };

        let version: u32 = bincode::deserialize(&bytes).map_err(decode_error)?;
        if version != FORMAT_VERSION {
            return Err(IoError::IncompatibleArtifactVersion {
                path: path.clone(),
                expected: FORMAT_VERSION,
                found: version,
            });
        }
        let (_, found, stored_run): EnvelopeHeader =
            bincode::deserialize(&bytes).map_err(decode_error)?;
        if found != kind {
            return Err(IoError::ArtifactKindMismatch {
                path: path.clone(),
                expected: kind,
                found,
            });
        }

        let (_, _, _, payload): (u32, ArtifactKind, String, T) =
            bincode::deserialize(&bytes).map_err(decode_error)?;
        debug!(%stored_run, size_bytes = bytes.len(), "artifact loaded");
        Ok(payload)
    }
}
