//! # propsync-store
//!
//! Filesystem adapters for the reconciliation engine's ports: documents
//! under a root directory, the YAML state file, and the last-seen cache.
//! See [`layout`] for where each lives.

pub mod error;
pub mod fs_documents;
pub mod last_seen;
pub mod layout;
pub mod state_file;

use std::path::Path;

use propsync_core::Settings;
use propsync_sync::{Ports, Presenter};

pub use error::StoreError;
pub use fs_documents::FsDocumentStore;
pub use last_seen::{LastSeenFile, LastSeenRecord};
pub use state_file::StateFile;

/// Filesystem ports for the document root `root`, answering prompts through
/// `presenter`. Also returns the persisted settings so callers can filter
/// events by extension before the engine is opened.
pub fn ports_at(
    root: &Path,
    presenter: Box<dyn Presenter>,
) -> Result<(Ports, Settings), StoreError> {
    let state = StateFile::at_root(root);
    let settings = state.load_state()?.settings;
    let ports = Ports {
        documents: Box::new(FsDocumentStore::new(root, settings.extension.clone())),
        persistence: Box::new(state),
        last_seen: Box::new(LastSeenFile::at_root(root)),
        presenter,
    };
    Ok((ports, settings))
}
