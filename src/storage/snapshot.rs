//! Durable snapshots of the canonical dataset
//!
//! The whole dataset is stored as one JSON document together with the reset
//! baseline. [`FileSnapshotStore`] keeps it in `.curriculum/snapshot.json`
//! with file locking and atomic writes; [`MemorySnapshotStore`] is an
//! in-process sink for tests and embedding.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::domain::Dataset;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,

    pub dataset: Dataset,

    /// Last successfully loaded dataset; `None` means reset goes to the seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Dataset>,
}

impl Snapshot {
    pub fn new(dataset: Dataset, baseline: Option<Dataset>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            dataset,
            baseline,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize snapshot")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(content).context("Failed to parse snapshot")?;
        if snapshot.version > SNAPSHOT_VERSION {
            bail!(
                "Snapshot version {} is newer than supported version {}",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }
        Ok(snapshot)
    }
}

/// Durable key-value home for one snapshot
pub trait SnapshotSink {
    /// Returns `Ok(None)` if nothing has been stored yet
    fn load(&self) -> Result<Option<Snapshot>>;

    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Snapshot stored as a JSON file
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for FileSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open snapshot: {}", self.path.display()))?;

        file.lock_shared()
            .context("Failed to acquire read lock on snapshot")?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .with_context(|| format!("Failed to read snapshot: {}", self.path.display()))?;

        // Lock is released when file is dropped
        Snapshot::from_json(&content).map(Some)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("json.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on snapshot")?;

            let mut writer = BufWriter::new(&file);
            serde_json::to_writer(&mut writer, snapshot).context("Failed to serialize snapshot")?;
            writer.flush().context("Failed to flush snapshot")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

/// In-memory sink holding the serialized snapshot
///
/// Clones share the same slot, so a test can keep a handle and inspect what
/// the store persisted.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<String>>>,
    fail_writes: bool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose writes always fail, like a full disk
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Starts with raw content, valid or not
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(content.into()))),
            fail_writes: false,
        }
    }

    pub fn content(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SnapshotSink for MemorySnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        match self.content() {
            Some(content) => Snapshot::from_json(&content).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail_writes {
            bail!("Snapshot storage quota exceeded");
        }
        let json = snapshot.to_json()?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::seed_dataset;
    use tempfile::TempDir;

    #[test]
    fn file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path().join(".curriculum").join("snapshot.json"));

        assert!(store.load().unwrap().is_none());

        let dataset = seed_dataset().dataset;
        let snapshot = Snapshot::new(dataset.clone(), Some(dataset));
        store.save(&snapshot).unwrap();

        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, "{ broken").unwrap();

        assert!(FileSnapshotStore::new(&path).load().is_err());
    }

    #[test]
    fn newer_version_is_rejected() {
        let json = format!(r#"{{"version": {}, "dataset": {{}}}}"#, SNAPSHOT_VERSION + 1);
        assert!(Snapshot::from_json(&json).is_err());

        let json = format!(r#"{{"version": {}, "dataset": {{}}}}"#, SNAPSHOT_VERSION);
        let snapshot = Snapshot::from_json(&json).unwrap();
        assert!(snapshot.dataset.is_empty());
        assert!(snapshot.baseline.is_none());
    }

    #[test]
    fn memory_store_shares_slot_and_can_fail() {
        let store = MemorySnapshotStore::new();
        let handle = store.clone();
        store
            .save(&Snapshot::new(Dataset::default(), None))
            .unwrap();
        assert!(handle.content().is_some());

        let failing = MemorySnapshotStore::failing();
        assert!(failing.save(&Snapshot::new(Dataset::default(), None)).is_err());
        assert!(failing.content().is_none());
    }
}
