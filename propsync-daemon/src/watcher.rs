//! Filesystem notifications narrowed to governed documents.

use std::path::{Path, PathBuf};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use propsync_store::FsDocumentStore;
use propsync_sync::ReconcileLock;

use crate::error::DaemonError;

/// Decides which paths of a raw notify event reach the engine. Runs on the
/// watcher's thread.
#[derive(Debug, Clone)]
pub struct EventFilter {
    documents: FsDocumentStore,
    lock: ReconcileLock,
}

impl EventFilter {
    pub fn new(documents: FsDocumentStore, lock: ReconcileLock) -> Self {
        Self { documents, lock }
    }

    /// Root-relative document paths touched by `event`. Empty while the
    /// reconciliation lock is held.
    pub fn paths(&self, event: &Event) -> Vec<PathBuf> {
        if !is_relevant_event_kind(&event.kind) {
            return Vec::new();
        }
        if self.lock.is_held() {
            tracing::debug!(paths = ?event.paths, "dropped while reconciling");
            return Vec::new();
        }
        let mut out: Vec<PathBuf> = event
            .paths
            .iter()
            .filter_map(|path| self.documents.relativize(path))
            .filter(|relative| self.documents.is_document(relative))
            .collect();
        out.dedup();
        out
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Watch `root` recursively and forward filtered document paths to `tx`.
/// The returned watcher must be kept alive for events to flow.
pub fn watch(
    root: &Path,
    filter: EventFilter,
    tx: mpsc::UnboundedSender<PathBuf>,
) -> Result<RecommendedWatcher, DaemonError> {
    let mut watcher = recommended_watcher(move |event: notify::Result<Event>| match event {
        Ok(event) => {
            for path in filter.paths(&event) {
                let _ = tx.send(path);
            }
        }
        Err(err) => tracing::warn!(error = %err, "watcher event error"),
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "watching documents");
    Ok(watcher)
}
