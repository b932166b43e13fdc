//! Ctrl-C handling that still works while the engine is busy.
//!
//! The controller runs bulk rewrites synchronously inside `tick`, so a
//! signal future polled by the same task would only be seen after the run
//! finished. The listener therefore lives on its own thread and flips a
//! shared flag that progress sinks poll between documents.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::{io_err, DaemonError};

/// Exit status used when a second Ctrl-C forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Shared "stop requested" state. Clones observe the same request.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw flag, for progress sinks that only need to poll it.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolve once [`trigger`](Self::trigger) has been called, including
    /// when it was called before this future was created.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Listen for Ctrl-C on a dedicated thread. The first press triggers the
    /// interrupt; a second one exits the process.
    pub fn listen_for_ctrl_c(&self) -> Result<(), DaemonError> {
        let interrupt = self.clone();
        std::thread::Builder::new()
            .name("propsync-ctrl-c".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        tracing::error!(error = %err, "ctrl-c listener could not start");
                        return;
                    }
                };
                runtime.block_on(interrupt.forward_ctrl_c());
            })
            .map_err(|e| io_err("ctrl-c-listener", e))?;
        Ok(())
    }

    async fn forward_ctrl_c(&self) {
        loop {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "ctrl-c handler failed");
                return;
            }
            if self.is_requested() {
                tracing::warn!("second ctrl-c, exiting immediately");
                std::process::exit(FORCED_EXIT_CODE);
            }
            tracing::info!("received ctrl-c, stopping (press again to force)");
            self.trigger();
        }
    }
}
