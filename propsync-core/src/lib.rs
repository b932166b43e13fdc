//! propsync core library: domain types, header snapshots, diffs, revisions.
//!
//! - [`types`]: schemas, revision markers, settings
//! - [`snapshot`]: header extraction and rendering
//! - [`diff`]: key-set and ordering deltas
//! - [`revision`]: revision clock and ordering
//! - [`error`]: [`CoreError`]

pub mod diff;
pub mod error;
pub mod revision;
pub mod snapshot;
pub mod types;

pub use diff::{compute_diff, diff_orders, Diff};
pub use error::CoreError;
pub use revision::{
    parse_timestamp, truncate_to_millis, Clock, ManualClock, RevisionClock, SystemClock,
};
pub use snapshot::{
    extract, parse_document, render_document, render_snapshot, repair_order, ParsedDocument,
    Snapshot, ValueMap,
};
pub use types::{
    ChangeSummary, ReservedKeys, RevisionMarker, Schema, SchemaTable, Settings,
};
