//! Documents on the local filesystem.

use std::path::{Component, Path, PathBuf};

use propsync_sync::{DocumentStore, SyncError};

use crate::error::{io_err, StoreError};
use crate::layout::write_atomic;

/// Every `*.<extension>` file below `root`, addressed relative to `root`.
/// Hidden directories (including `.propsync/`) are not governed.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    extension: String,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether a root-relative path names a governed document.
    pub fn is_document(&self, relative: &Path) -> bool {
        let hidden = relative.components().any(|c| match c {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        });
        !hidden
            && relative
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == self.extension)
    }

    /// Map an absolute path reported by a watcher back to the store's
    /// relative form. `None` when it lies outside the root.
    pub fn relativize(&self, absolute: &Path) -> Option<PathBuf> {
        absolute
            .strip_prefix(&self.root)
            .ok()
            .map(Path::to_path_buf)
    }

    fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    fn read_at(&self, relative: &Path) -> Result<String, StoreError> {
        let path = self.resolve(relative);
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound {
                path: relative.to_path_buf(),
            },
            _ => io_err(path, e),
        })
    }

    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StoreError> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| io_err(dir, e))?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                self.walk(&path, out)?;
            } else if let Some(relative) = self.relativize(&path) {
                if self.is_document(&relative) {
                    out.push(relative);
                }
            }
        }
        Ok(())
    }
}

impl DocumentStore for FsDocumentStore {
    fn read(&self, path: &Path) -> Result<String, SyncError> {
        Ok(self.read_at(path)?)
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), SyncError> {
        write_atomic(&self.resolve(path), text)?;
        tracing::debug!("wrote {}", path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<PathBuf>, SyncError> {
        let mut out = Vec::new();
        if self.root.is_dir() {
            self.walk(&self.root, &mut out)?;
        }
        out.sort();
        Ok(out)
    }
}
