//! # propsync-sync
//!
//! The reconciliation engine: keeps every document's header in line with
//! the schema of its category.
//!
//! Build a [`ReconciliationController`] from a set of [`Ports`], feed it
//! change notifications with [`observe`](ReconciliationController::observe)
//! and drive it with [`tick`](ReconciliationController::tick).

pub mod bulk;
pub mod category;
pub mod conform;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod lock;
pub mod memory;
pub mod ports;
pub mod schema_store;
pub mod suppression;
pub mod workspace;

pub use bulk::{BulkReport, BulkRunner};
pub use controller::{
    CategoryStatus, FileDiff, Observation, Outcome, Ports, ReconciliationController, StatusReport,
};
pub use debounce::{Debouncer, PathPhase};
pub use error::SyncError;
pub use lock::{LockGuard, ReconcileLock};
pub use ports::{
    AlignDecision, AutoPolicy, AutoPresenter, ChangeDecision, ChangeRequest, Confirmation,
    CreateDecision, DocumentStore, LastSeenCache, NullProgress, Persistence, Presenter,
    ProgressSink, RetypeDecision, RetypeRequest, StoredState,
};
pub use schema_store::{SchemaNotice, SchemaStore};
pub use suppression::SuppressionWindow;
pub use workspace::{WriteResult, Workspace};
