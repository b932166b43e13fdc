pub mod diff;
pub mod init;
pub mod reconcile;
pub mod status;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use propsync_core::SystemClock;
use propsync_store::{ports_at, StateFile};
use propsync_sync::ReconciliationController;

use crate::presenter::TerminalPresenter;

/// Fail with a hint unless `root` has been initialized.
pub fn ensure_initialized(root: &Path) -> Result<()> {
    if !StateFile::at_root(root).exists() {
        bail!(
            "'{}' is not a propsync root; run `propsync init` first",
            root.display()
        );
    }
    Ok(())
}

/// Open the engine over the document root.
pub fn open(root: &Path, presenter: TerminalPresenter) -> Result<ReconciliationController> {
    ensure_initialized(root)?;
    let (ports, _) = ports_at(root, Box::new(presenter))
        .with_context(|| format!("failed to load state under '{}'", root.display()))?;
    ReconciliationController::open(ports, Arc::new(SystemClock))
        .with_context(|| format!("failed to open '{}'", root.display()))
}
