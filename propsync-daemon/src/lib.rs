//! Foreground watch loop: filesystem notifications in, reconciliation out.

pub mod clock;
mod error;
mod interrupt;
mod runtime;
pub mod watcher;

pub use clock::TokioClock;
pub use error::DaemonError;
pub use interrupt::{Interrupt, FORCED_EXIT_CODE};
pub use runtime::{drive, init_tracing, run, start_blocking, LogFormat};
pub use watcher::EventFilter;
