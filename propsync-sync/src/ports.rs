//! Boundaries to the outside world: documents, persistence, the last-seen
//! cache, and the presenter that asks the user for decisions.
//!
//! Every decision point has its own closed enum. Each carries a `Dismissed`
//! variant for a prompt closed without a choice; the controller maps it to
//! the same branch as the safe option (revert / cancel / no).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use propsync_core::{SchemaTable, Settings};

use crate::error::SyncError;
use crate::schema_store::SchemaNotice;

// ---------------------------------------------------------------------------
// Storage ports
// ---------------------------------------------------------------------------

/// Text documents addressed by paths relative to the store root.
pub trait DocumentStore {
    fn read(&self, path: &Path) -> Result<String, SyncError>;
    fn write(&mut self, path: &Path, text: &str) -> Result<(), SyncError>;
    /// Every governed document, in a stable order.
    fn list(&self) -> Result<Vec<PathBuf>, SyncError>;
}

/// Persisted settings plus the schema table exactly as stored. Entries are
/// kept raw so damaged ones can be repaired instead of failing the load.
#[derive(Debug, Clone, Default)]
pub struct StoredState {
    pub settings: Settings,
    pub schemas: BTreeMap<String, serde_yaml::Value>,
}

pub trait Persistence {
    fn load(&self) -> Result<StoredState, SyncError>;
    fn save(&mut self, settings: &Settings, schemas: &SchemaTable) -> Result<(), SyncError>;
}

/// Independent copy of the schema table as of the end of the last session,
/// used only to notice schema changes authored elsewhere.
pub trait LastSeenCache {
    fn get(&self) -> Result<Option<String>, SyncError>;
    fn set(&mut self, snapshot: &str) -> Result<(), SyncError>;
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Keys were added to or removed from a typed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// Update the schema and rewrite every sibling.
    Apply,
    /// Put the document back the way it was.
    Revert,
    Dismissed,
}

/// A document moved into a category that already has a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignDecision {
    Align,
    Cancel,
    Dismissed,
}

/// A previously untyped document names a category with no schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateDecision {
    Create,
    Cancel,
    Dismissed,
}

/// A typed document names a different category that has no schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetypeDecision {
    CreateNew,
    RenameExisting,
    Cancel,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Dismissed,
}

impl Confirmation {
    pub fn is_yes(self) -> bool {
        self == Confirmation::Yes
    }
}

/// Context for [`Presenter::decide_change`].
#[derive(Debug, Clone, Copy)]
pub struct ChangeRequest<'a> {
    pub path: &'a Path,
    pub category: &'a str,
    pub added: &'a BTreeSet<String>,
    pub removed: &'a BTreeSet<String>,
}

/// Context for the category-change prompts.
#[derive(Debug, Clone, Copy)]
pub struct RetypeRequest<'a> {
    pub path: &'a Path,
    pub from: Option<&'a str>,
    pub to: &'a str,
    /// `from` has a schema that could be moved to `to`.
    pub can_rename: bool,
}

/// Progress surface for bulk runs.
pub trait ProgressSink {
    fn set_total(&mut self, total: usize);
    fn set_status(&mut self, status: &str);
    fn increment_completed(&mut self);
    fn increment_failures(&mut self);
    fn cancellation_requested(&self) -> bool;
}

/// Progress sink that reports nothing and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn set_total(&mut self, _total: usize) {}
    fn set_status(&mut self, _status: &str) {}
    fn increment_completed(&mut self) {}
    fn increment_failures(&mut self) {}
    fn cancellation_requested(&self) -> bool {
        false
    }
}

/// Blocking request/response surface towards the user.
pub trait Presenter {
    fn decide_change(&mut self, request: &ChangeRequest<'_>) -> ChangeDecision;
    fn decide_align(&mut self, request: &RetypeRequest<'_>) -> AlignDecision;
    fn decide_create(&mut self, request: &RetypeRequest<'_>) -> CreateDecision;
    fn decide_retype(&mut self, request: &RetypeRequest<'_>) -> RetypeDecision;
    fn confirm(&mut self, question: &str) -> Confirmation;
    fn show_notices(&mut self, notices: &[SchemaNotice]);
    fn progress(&mut self) -> &mut dyn ProgressSink;
}

// ---------------------------------------------------------------------------
// Non-interactive presenter
// ---------------------------------------------------------------------------

/// How [`AutoPresenter`] answers every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoPolicy {
    /// Apply, align, create, yes. Category moves create rather than rename.
    Accept,
    /// Revert, cancel, no.
    #[default]
    Decline,
}

/// Presenter for unattended runs: answers by policy and logs notices.
#[derive(Debug, Default)]
pub struct AutoPresenter {
    policy: AutoPolicy,
    progress: NullProgress,
}

impl AutoPresenter {
    pub fn new(policy: AutoPolicy) -> Self {
        Self {
            policy,
            progress: NullProgress,
        }
    }

    pub fn policy(&self) -> AutoPolicy {
        self.policy
    }
}

impl Presenter for AutoPresenter {
    fn decide_change(&mut self, request: &ChangeRequest<'_>) -> ChangeDecision {
        tracing::info!(
            "auto-{:?} key change in {} ({} added, {} removed)",
            self.policy,
            request.path.display(),
            request.added.len(),
            request.removed.len()
        );
        match self.policy {
            AutoPolicy::Accept => ChangeDecision::Apply,
            AutoPolicy::Decline => ChangeDecision::Revert,
        }
    }

    fn decide_align(&mut self, _request: &RetypeRequest<'_>) -> AlignDecision {
        match self.policy {
            AutoPolicy::Accept => AlignDecision::Align,
            AutoPolicy::Decline => AlignDecision::Cancel,
        }
    }

    fn decide_create(&mut self, _request: &RetypeRequest<'_>) -> CreateDecision {
        match self.policy {
            AutoPolicy::Accept => CreateDecision::Create,
            AutoPolicy::Decline => CreateDecision::Cancel,
        }
    }

    fn decide_retype(&mut self, _request: &RetypeRequest<'_>) -> RetypeDecision {
        match self.policy {
            AutoPolicy::Accept => RetypeDecision::CreateNew,
            AutoPolicy::Decline => RetypeDecision::Cancel,
        }
    }

    fn confirm(&mut self, question: &str) -> Confirmation {
        tracing::info!("auto-{:?}: {question}", self.policy);
        match self.policy {
            AutoPolicy::Accept => Confirmation::Yes,
            AutoPolicy::Decline => Confirmation::No,
        }
    }

    fn show_notices(&mut self, notices: &[SchemaNotice]) {
        for notice in notices {
            tracing::info!("{notice}");
        }
    }

    fn progress(&mut self) -> &mut dyn ProgressSink {
        &mut self.progress
    }
}
