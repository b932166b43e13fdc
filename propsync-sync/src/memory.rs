//! In-memory ports for embedding hosts and tests.
//!
//! Each type is a cloneable handle over shared state, so a caller can hand
//! one clone to the controller and keep another to inspect or mutate.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use propsync_core::{SchemaTable, Settings};

use crate::error::SyncError;
use crate::ports::{DocumentStore, LastSeenCache, Persistence, StoredState};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Documents {
    files: BTreeMap<PathBuf, String>,
    writes: Vec<PathBuf>,
    failing: BTreeSet<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Documents>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: impl Into<PathBuf>, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    /// Change a document behind the engine's back, as an editor would.
    pub fn insert(&self, path: impl Into<PathBuf>, text: &str) {
        locked(&self.inner).files.insert(path.into(), text.to_string());
    }

    pub fn remove(&self, path: &Path) -> Option<String> {
        locked(&self.inner).files.remove(path)
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        locked(&self.inner).files.get(path.as_ref()).cloned()
    }

    /// Paths written through the [`DocumentStore`] port, in order.
    pub fn writes(&self) -> Vec<PathBuf> {
        locked(&self.inner).writes.clone()
    }

    pub fn clear_writes(&self) {
        locked(&self.inner).writes.clear();
    }

    /// Make every write to `path` fail.
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        locked(&self.inner).failing.insert(path.into());
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn read(&self, path: &Path) -> Result<String, SyncError> {
        locked(&self.inner)
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| SyncError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), SyncError> {
        let mut docs = locked(&self.inner);
        if docs.failing.contains(path) {
            return Err(SyncError::port(
                "documents",
                io::Error::new(io::ErrorKind::PermissionDenied, "write refused"),
            ));
        }
        docs.files.insert(path.to_path_buf(), text.to_string());
        docs.writes.push(path.to_path_buf());
        Ok(())
    }

    fn list(&self) -> Result<Vec<PathBuf>, SyncError> {
        Ok(locked(&self.inner).files.keys().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct State {
    stored: StoredState,
    saves: usize,
    failing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<Mutex<State>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(self, settings: Settings) -> Self {
        locked(&self.inner).stored.settings = settings;
        self
    }

    /// Seed a raw schema entry from YAML, exactly as a state file would hold it.
    pub fn with_raw_schema(self, category: &str, yaml: &str) -> Result<Self, SyncError> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        locked(&self.inner)
            .stored
            .schemas
            .insert(category.to_string(), value);
        Ok(self)
    }

    pub fn with_table(self, table: &SchemaTable) -> Result<Self, SyncError> {
        {
            let mut state = locked(&self.inner);
            for (category, schema) in table {
                state
                    .stored
                    .schemas
                    .insert(category.clone(), serde_yaml::to_value(schema)?);
            }
        }
        Ok(self)
    }

    pub fn stored(&self) -> StoredState {
        locked(&self.inner).stored.clone()
    }

    pub fn save_count(&self) -> usize {
        locked(&self.inner).saves
    }

    pub fn fail_saves(&self, failing: bool) {
        locked(&self.inner).failing = failing;
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<StoredState, SyncError> {
        Ok(locked(&self.inner).stored.clone())
    }

    fn save(&mut self, settings: &Settings, schemas: &SchemaTable) -> Result<(), SyncError> {
        let mut state = locked(&self.inner);
        if state.failing {
            return Err(SyncError::port(
                "persistence",
                io::Error::new(io::ErrorKind::Other, "save refused"),
            ));
        }
        let mut raw = BTreeMap::new();
        for (category, schema) in schemas {
            raw.insert(category.clone(), serde_yaml::to_value(schema)?);
        }
        state.stored = StoredState {
            settings: settings.clone(),
            schemas: raw,
        };
        state.saves += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Last-seen cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryLastSeen {
    inner: Arc<Mutex<Option<String>>>,
}

impl MemoryLastSeen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(self, snapshot: &str) -> Self {
        *locked(&self.inner) = Some(snapshot.to_string());
        self
    }

    pub fn snapshot(&self) -> Option<String> {
        locked(&self.inner).clone()
    }
}

impl LastSeenCache for MemoryLastSeen {
    fn get(&self) -> Result<Option<String>, SyncError> {
        Ok(self.snapshot())
    }

    fn set(&mut self, snapshot: &str) -> Result<(), SyncError> {
        *locked(&self.inner) = Some(snapshot.to_string());
        Ok(())
    }
}
