//! The YAML state file: settings plus the schema table.
//!
//! ```yaml
//! settings:
//!   category_key: category
//!   order_sync: true
//! schemas:
//!   book:
//!     keys: [category, title, author]
//!     revision:
//!       updated_at: 2024-01-01T00:00:00Z
//!       revision_id: 4f0c…
//! ```
//!
//! Schema entries are loaded as raw YAML values so that a damaged entry is
//! repaired by the engine instead of failing the whole load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use propsync_core::{SchemaTable, Settings};
use propsync_sync::{Persistence, StoredState, SyncError};

use crate::error::{io_err, StoreError};
use crate::layout::{state_file_path, write_atomic};

#[derive(Debug, Default, Deserialize)]
struct StateFileContents {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    schemas: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Serialize)]
struct StateFileRef<'a> {
    settings: &'a Settings,
    schemas: &'a SchemaTable,
}

#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The state file of the document root `root`.
    pub fn at_root(root: &Path) -> Self {
        Self::new(state_file_path(root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns defaults if the file does not exist, `StoreError::Parse` with
    /// the path if it is malformed.
    pub fn load_state(&self) -> Result<StoredState, StoreError> {
        if !self.path.exists() {
            return Ok(StoredState::default());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(StoredState::default());
        }
        let parsed: StateFileContents =
            serde_yaml::from_str(&contents).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(StoredState {
            settings: parsed.settings,
            schemas: parsed.schemas,
        })
    }

    pub fn save_state(&self, settings: &Settings, schemas: &SchemaTable) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(&StateFileRef { settings, schemas })?;
        write_atomic(&self.path, &yaml)?;
        tracing::debug!(
            "saved {} schema(s) to {}",
            schemas.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Write a state file with `settings` and no schemas unless one already
    /// exists. Returns whether a file was created.
    pub fn init(&self, settings: &Settings) -> Result<bool, StoreError> {
        if self.exists() {
            return Ok(false);
        }
        self.save_state(settings, &SchemaTable::new())?;
        tracing::info!("initialized {}", self.path.display());
        Ok(true)
    }
}

impl Persistence for StateFile {
    fn load(&self) -> Result<StoredState, SyncError> {
        Ok(self.load_state()?)
    }

    fn save(&mut self, settings: &Settings, schemas: &SchemaTable) -> Result<(), SyncError> {
        Ok(self.save_state(settings, schemas)?)
    }
}
