use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use propsync_store::{ports_at, FsDocumentStore};
use propsync_sync::{Outcome, Presenter, ReconciliationController, SyncError};

use crate::clock::TokioClock;
use crate::error::{io_err, DaemonError};
use crate::interrupt::Interrupt;
use crate::watcher::{watch, EventFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Start the watch loop for `root` and block the current thread until
/// Ctrl-C. The presenter should poll `interrupt` so a bulk run in progress
/// stops at the next document.
pub fn start_blocking(
    root: &Path,
    presenter: Box<dyn Presenter>,
    format: LogFormat,
    interrupt: Interrupt,
) -> Result<(), DaemonError> {
    init_tracing(format);
    interrupt.listen_for_ctrl_c()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(root.to_path_buf(), presenter, interrupt))
}

/// Open the engine over the filesystem at `root`, watch it, and process
/// changes until `interrupt` fires.
pub async fn run(
    root: PathBuf,
    presenter: Box<dyn Presenter>,
    interrupt: Interrupt,
) -> Result<(), DaemonError> {
    // Watchers report canonical paths (e.g. /private/var/... on macOS).
    let root = std::fs::canonicalize(&root).map_err(|e| io_err(&root, e))?;

    let (ports, settings) = ports_at(&root, presenter)?;
    let mut controller = ReconciliationController::open(ports, Arc::new(TokioClock::new()))?;
    let primed = controller.prime()?;
    tracing::info!(root = %root.display(), documents = primed, "engine ready");

    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
    let filter = EventFilter::new(
        FsDocumentStore::new(&root, settings.extension.clone()),
        controller.lock(),
    );
    let _watcher = watch(&root, filter, tx)?;

    let shutdown = async {
        interrupt.wait().await;
        tracing::info!("shutting down");
    };
    drive(&mut controller, &mut rx, shutdown).await
}

/// Feed `events` to the controller and tick it whenever its next deadline
/// passes, until `shutdown` resolves or every sender is gone.
pub async fn drive<F>(
    controller: &mut ReconciliationController,
    events: &mut mpsc::UnboundedReceiver<PathBuf>,
    shutdown: F,
) -> Result<(), DaemonError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        let wait = controller.next_deadline().map(|deadline| {
            (deadline - controller.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        });

        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => {
                let Some(path) = event else { break };
                let observation = controller.observe(&path);
                tracing::debug!(path = %path.display(), ?observation, "change observed");
            }
            _ = sleep_for(wait) => {
                for (path, result) in controller.tick() {
                    report(&path, result);
                }
            }
        }
    }
    Ok(())
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

fn report(path: &Path, result: Result<Outcome, SyncError>) {
    match result {
        Ok(Outcome::NoOp) => tracing::debug!(path = %path.display(), "no change"),
        Ok(outcome) => tracing::info!(path = %path.display(), ?outcome, "processed"),
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "processing failed"),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// filter. Records from the `log` facade are bridged in.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
