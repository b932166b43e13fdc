//! On-disk layout of a document root.
//!
//! ```text
//! <root>/
//!   .propsync/
//!     state.yaml        (settings + schema table)
//!     last-seen.json    (schema table as of the last session)
//!   **/*.<extension>    (governed documents)
//! ```

use std::path::{Path, PathBuf};

use crate::error::{io_err, StoreError};

pub const STATE_DIR: &str = ".propsync";
pub const STATE_FILE: &str = "state.yaml";
pub const LAST_SEEN_FILE: &str = "last-seen.json";

/// `<root>/.propsync/`
pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

/// `<root>/.propsync/state.yaml`
pub fn state_file_path(root: &Path) -> PathBuf {
    state_dir(root).join(STATE_FILE)
}

/// `<root>/.propsync/last-seen.json`
pub fn last_seen_path(root: &Path) -> PathBuf {
    state_dir(root).join(LAST_SEEN_FILE)
}

/// Write `contents` to `path` through a `.tmp` sibling and a rename, so a
/// reader never observes a half-written file. Parent directories are
/// created as needed.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    let Some(name) = path.file_name() else {
        return Err(io_err(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let tmp = path.with_file_name(format!("{}.tmp", name.to_string_lossy()));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
