//! Last-seen schema snapshot, used to notice schema edits made elsewhere.
//!
//! Persists a JSON record at `<root>/.propsync/last-seen.json`. The record
//! carries the SHA-256 of its snapshot; a record whose digest does not match
//! is ignored rather than trusted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use propsync_sync::{LastSeenCache, SyncError};

use crate::error::{io_err, StoreError};
use crate::layout::{last_seen_path, write_atomic};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastSeenRecord {
    pub saved_at: DateTime<Utc>,
    pub digest: String,
    pub snapshot: String,
}

/// SHA-256 hex digest of `content`.
pub fn digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct LastSeenFile {
    path: PathBuf,
}

impl LastSeenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_root(root: &Path) -> Self {
        Self::new(last_seen_path(root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored record, if the file exists.
    pub fn load_record(&self) -> Result<Option<LastSeenRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// The stored snapshot, if present and intact.
    pub fn load_snapshot(&self) -> Result<Option<String>, StoreError> {
        let Some(record) = self.load_record()? else {
            return Ok(None);
        };
        if digest(&record.snapshot) != record.digest {
            tracing::warn!(
                "{}: digest mismatch, ignoring last-seen snapshot",
                self.path.display()
            );
            return Ok(None);
        }
        Ok(Some(record.snapshot))
    }

    pub fn save_snapshot(&self, snapshot: &str) -> Result<(), StoreError> {
        let record = LastSeenRecord {
            saved_at: Utc::now(),
            digest: digest(snapshot),
            snapshot: snapshot.to_string(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        write_atomic(&self.path, &json)
    }
}

impl LastSeenCache for LastSeenFile {
    fn get(&self) -> Result<Option<String>, SyncError> {
        Ok(self.load_snapshot()?)
    }

    fn set(&mut self, snapshot: &str) -> Result<(), SyncError> {
        Ok(self.save_snapshot(snapshot)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_no_cache() {
        let tmp = TempDir::new().unwrap();
        let file = LastSeenFile::at_root(tmp.path());
        assert_eq!(file.get().unwrap(), None);
    }

    #[test]
    fn set_then_get() {
        let tmp = TempDir::new().unwrap();
        let mut file = LastSeenFile::at_root(tmp.path());
        file.set(r#"{"book":{"keys":["category"]}}"#).unwrap();
        assert_eq!(
            file.get().unwrap().as_deref(),
            Some(r#"{"book":{"keys":["category"]}}"#)
        );
        let record = file.load_record().unwrap().unwrap();
        assert_eq!(record.digest, digest(&record.snapshot));
    }

    #[test]
    fn tampered_snapshot_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let mut file = LastSeenFile::at_root(tmp.path());
        file.set("{}").unwrap();

        let mut record = file.load_record().unwrap().unwrap();
        record.snapshot = r#"{"other":{}}"#.into();
        std::fs::write(file.path(), serde_json::to_string(&record).unwrap()).unwrap();

        assert_eq!(file.get().unwrap(), None);
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
