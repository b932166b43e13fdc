//! Document access with self-write suppression and snapshot tracking.
//!
//! Every write goes through [`Workspace::write`], which skips identical
//! content, marks the path suppressed *before* touching the store, and
//! records the written text's snapshot as the path's latest state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use propsync_core::{parse_document, Clock, ParsedDocument, ReservedKeys, Snapshot};

use crate::conform::{conform_parsed, ConformTarget};
use crate::error::SyncError;
use crate::ports::DocumentStore;
use crate::suppression::SuppressionWindow;

/// Outcome of an individual document write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Content changed and was written.
    Written { path: PathBuf },
    /// Content already matched; nothing was written.
    Unchanged { path: PathBuf },
}

pub struct Workspace {
    documents: Box<dyn DocumentStore>,
    suppression: SuppressionWindow,
    snapshots: HashMap<PathBuf, Snapshot>,
    reserved: ReservedKeys,
    clock: Arc<dyn Clock>,
}

impl Workspace {
    pub fn new(
        documents: Box<dyn DocumentStore>,
        reserved: ReservedKeys,
        suppression: SuppressionWindow,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            documents,
            suppression,
            snapshots: HashMap::new(),
            reserved,
            clock,
        }
    }

    pub fn reserved(&self) -> &ReservedKeys {
        &self.reserved
    }

    pub fn list(&self) -> Result<Vec<PathBuf>, SyncError> {
        self.documents.list()
    }

    pub fn read(&self, path: &Path) -> Result<String, SyncError> {
        self.documents.read(path)
    }

    pub fn parse(&self, path: &Path) -> Result<ParsedDocument, SyncError> {
        Ok(parse_document(&self.read(path)?, &self.reserved))
    }

    /// Write `text` unless the store already holds exactly that.
    pub fn write(&mut self, path: &Path, text: &str) -> Result<WriteResult, SyncError> {
        let current = match self.documents.read(path) {
            Ok(current) => Some(current),
            Err(SyncError::NotFound { .. }) => None,
            Err(err) => return Err(err),
        };
        let snapshot = parse_document(text, &self.reserved).snapshot;
        if current.as_deref() == Some(text) {
            tracing::debug!("unchanged: {}", path.display());
            self.snapshots.insert(path.to_path_buf(), snapshot);
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }

        self.suppression.suppress(path, self.clock.now());
        self.documents.write(path, text)?;
        self.snapshots.insert(path.to_path_buf(), snapshot);
        tracing::info!("wrote: {}", path.display());
        Ok(WriteResult::Written {
            path: path.to_path_buf(),
        })
    }

    /// Read `path` and rewrite it to `target`.
    pub fn conform(
        &mut self,
        path: &Path,
        target: &ConformTarget<'_>,
    ) -> Result<WriteResult, SyncError> {
        let parsed = self.parse(path)?;
        let text = conform_parsed(&parsed, target, &self.reserved)?;
        self.write(path, &text)
    }

    /// Paths whose current discriminator equals `category`, in list order.
    /// Unreadable documents are skipped with a warning.
    pub fn documents_in(&self, category: &str) -> Result<Vec<PathBuf>, SyncError> {
        let mut out = Vec::new();
        for path in self.list()? {
            match self.parse(&path) {
                Ok(doc) if doc.snapshot.category.as_deref() == Some(category) => out.push(path),
                Ok(_) => {}
                Err(err) => tracing::warn!("skipping {}: {err}", path.display()),
            }
        }
        Ok(out)
    }

    pub fn snapshot(&self, path: &Path) -> Option<&Snapshot> {
        self.snapshots.get(path)
    }

    pub fn remember(&mut self, path: &Path, snapshot: Snapshot) {
        self.snapshots.insert(path.to_path_buf(), snapshot);
    }

    pub fn forget(&mut self, path: &Path) -> Option<Snapshot> {
        self.snapshots.remove(path)
    }

    pub fn tracked(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_suppressed(&mut self, path: &Path) -> bool {
        let now = self.clock.now();
        self.suppression.is_suppressed(path, now)
    }

    pub fn suppression_mut(&mut self) -> &mut SuppressionWindow {
        &mut self.suppression
    }
}
