//! The reconciliation state machine.
//!
//! [`ReconciliationController`] is the single writer of the schema table.
//! Change notifications enter through [`observe`](ReconciliationController::observe),
//! are coalesced by the debouncer, and are processed on
//! [`tick`](ReconciliationController::tick). Each processed event compares
//! the path's previous snapshot with a fresh one and walks the decision
//! steps below, stopping at the first that applies:
//!
//! 1. lock held: drop the event
//! 2. discriminator removed: defer, recheck after the debounce interval
//! 3. discriminator changed: category protocol (see [`crate::category`])
//! 4. untyped document: nothing to do
//! 5. no schema: mark pending (document carries a revision) or create one
//! 6. revision staleness: pending (document ahead) or forced rewrite
//! 7. order-only change: adopt and propagate (order-sync on)
//! 8. keys added or removed: ask, then apply or revert

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use similar::TextDiff;

use propsync_core::revision::is_ahead;
use propsync_core::{
    compute_diff, diff_orders, parse_document, render_document, ChangeSummary, Clock, Diff,
    ParsedDocument, ReservedKeys, RevisionClock, RevisionMarker, Schema, Settings, Snapshot,
};

use crate::bulk::{BulkReport, BulkRunner, DEFAULT_YIELD_EVERY};
use crate::conform::{conform_document, conform_parsed, restore, ConformTarget};
use crate::debounce::{phase_of, Debouncer, PathPhase};
use crate::error::SyncError;
use crate::lock::ReconcileLock;
use crate::ports::{
    ChangeDecision, ChangeRequest, DocumentStore, LastSeenCache, Persistence, Presenter,
};
use crate::schema_store::{normalize_keys, parse_snapshot, reconcile_external_change, SchemaStore};
use crate::suppression::SuppressionWindow;
use crate::workspace::Workspace;

/// Everything the controller talks to.
pub struct Ports {
    pub documents: Box<dyn DocumentStore>,
    pub persistence: Box<dyn Persistence>,
    pub last_seen: Box<dyn LastSeenCache>,
    pub presenter: Box<dyn Presenter>,
}

/// Result of processing one event or one explicit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoOp,
    /// The reconciliation lock was held.
    Dropped,
    /// The discriminator disappeared; a recheck is scheduled.
    Deferred,
    /// A deferred recheck found the discriminator still absent.
    Untyped,
    CategoryCreated {
        category: String,
    },
    /// The document is ahead of (or has no) schema; waiting for an explicit
    /// reconciliation.
    CategoryPending {
        category: String,
    },
    CategoryRenamed {
        from: String,
        to: String,
        report: BulkReport,
    },
    DocumentAligned,
    DocumentReverted,
    SchemaUpdated {
        category: String,
        report: BulkReport,
    },
    Reconciled {
        category: String,
        report: BulkReport,
    },
}

/// What [`ReconciliationController::observe`] did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Scheduled,
    Rescheduled,
    /// The path was written by us within the suppression window.
    Suppressed,
    /// The reconciliation lock was held.
    Dropped,
}

/// A single document's pending conformant rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStatus {
    pub name: String,
    pub keys: Vec<String>,
    pub revision: Option<RevisionMarker>,
    pub documents: usize,
    pub nonconforming: usize,
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatusReport {
    pub categories: Vec<CategoryStatus>,
    pub untyped: usize,
    pub malformed: Vec<PathBuf>,
}

pub struct ReconciliationController {
    pub(crate) settings: Settings,
    pub(crate) reserved: ReservedKeys,
    pub(crate) schemas: SchemaStore,
    pub(crate) workspace: Workspace,
    pub(crate) persistence: Box<dyn Persistence>,
    pub(crate) last_seen: Box<dyn LastSeenCache>,
    pub(crate) presenter: Box<dyn Presenter>,
    pub(crate) revisions: RevisionClock,
    pub(crate) lock: ReconcileLock,
    pub(crate) debouncer: Debouncer,
    /// Paths whose discriminator vanished, with their recheck deadline.
    pub(crate) deferred: HashMap<PathBuf, DateTime<Utc>>,
    pub(crate) pending: BTreeSet<String>,
    pub(crate) yield_every: usize,
}

impl ReconciliationController {
    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Load and repair the schema table, report schema changes made since
    /// the last session, and refresh the last-seen cache.
    pub fn open(ports: Ports, clock: Arc<dyn Clock>) -> Result<Self, SyncError> {
        let Ports {
            documents,
            persistence,
            last_seen,
            presenter,
        } = ports;

        let stored = persistence.load()?;
        let settings = stored.settings;
        let reserved = settings.reserved();
        let revisions = RevisionClock::new(Arc::clone(&clock));
        let (schemas, repaired) =
            SchemaStore::load(&stored.schemas, &settings.category_key, &revisions);
        let workspace = Workspace::new(
            documents,
            reserved.clone(),
            SuppressionWindow::new(settings.suppression()),
            clock,
        );

        let mut controller = Self {
            debouncer: Debouncer::new(settings.debounce()),
            settings,
            reserved,
            schemas,
            workspace,
            persistence,
            last_seen,
            presenter,
            revisions,
            lock: ReconcileLock::new(),
            deferred: HashMap::new(),
            pending: BTreeSet::new(),
            yield_every: DEFAULT_YIELD_EVERY,
        };

        controller.announce_external_changes();
        if repaired.is_empty() {
            controller.refresh_last_seen();
        } else {
            tracing::warn!("repaired schema entries: {}", repaired.join(", "));
            controller.persist();
        }
        tracing::info!("opened with {} schema(s)", controller.schemas.len());
        Ok(controller)
    }

    /// Record the current snapshot of every document so the first edit of
    /// each has something to be compared with. Returns how many were primed.
    pub fn prime(&mut self) -> Result<usize, SyncError> {
        let mut primed = 0;
        for path in self.workspace.list()? {
            match self.workspace.parse(&path) {
                Ok(doc) if !doc.snapshot.malformed => {
                    self.workspace.remember(&path, doc.snapshot);
                    primed += 1;
                }
                Ok(_) => tracing::warn!("{}: malformed header", path.display()),
                Err(err) => tracing::warn!("skipping {}: {err}", path.display()),
            }
        }
        tracing::debug!("primed {primed} document(s)");
        Ok(primed)
    }

    pub fn with_yield_every(mut self, n: usize) -> Self {
        self.yield_every = n;
        self
    }

    // -----------------------------------------------------------------------
    // Event flow
    // -----------------------------------------------------------------------

    /// Accept a change notification for `path`.
    pub fn observe(&mut self, path: &Path) -> Observation {
        if self.lock.is_held() {
            tracing::debug!("dropped while locked: {}", path.display());
            return Observation::Dropped;
        }
        if self.workspace.is_suppressed(path) {
            tracing::debug!("suppressed: {}", path.display());
            return Observation::Suppressed;
        }
        if self.debouncer.schedule(path, self.revisions.now()) {
            Observation::Rescheduled
        } else {
            Observation::Scheduled
        }
    }

    /// Process every debounced event and deferred recheck that is due.
    pub fn tick(&mut self) -> Vec<(PathBuf, Result<Outcome, SyncError>)> {
        let mut results = Vec::new();
        self.workspace.suppression_mut().prune(self.revisions.now());
        for path in self.debouncer.take_due(self.revisions.now()) {
            let outcome = self.handle_change(&path);
            results.push((path, outcome));
        }

        let now = self.revisions.now();
        let mut due: Vec<(DateTime<Utc>, PathBuf)> = self
            .deferred
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(path, at)| (*at, path.clone()))
            .collect();
        due.sort();
        for (_, path) in due {
            self.deferred.remove(&path);
            let outcome = self.recheck_untyped(&path);
            results.push((path, outcome));
        }
        results
    }

    /// Earliest instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        let deferred = self.deferred.values().min().copied();
        match (self.debouncer.next_deadline(), deferred) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Read `path` and process it against its previous snapshot.
    pub fn handle_change(&mut self, path: &Path) -> Result<Outcome, SyncError> {
        if self.lock.is_held() {
            tracing::debug!("dropped while locked: {}", path.display());
            return Ok(Outcome::Dropped);
        }
        let parsed = match self.workspace.parse(path) {
            Ok(parsed) => parsed,
            Err(SyncError::NotFound { .. }) => {
                self.workspace.forget(path);
                self.deferred.remove(path);
                return Ok(Outcome::NoOp);
            }
            Err(err) => return Err(err),
        };
        let previous = self.workspace.snapshot(path).cloned();
        self.process(path, previous.as_ref(), &parsed)
    }

    /// Decide what one observed change means. See the module docs for the
    /// order of the checks.
    pub fn process(
        &mut self,
        path: &Path,
        previous: Option<&Snapshot>,
        parsed: &ParsedDocument,
    ) -> Result<Outcome, SyncError> {
        if self.lock.is_held() {
            tracing::debug!("dropped while locked: {}", path.display());
            return Ok(Outcome::Dropped);
        }
        let next = &parsed.snapshot;
        if next.malformed {
            tracing::warn!("{}: malformed header left untouched", path.display());
            return Ok(Outcome::NoOp);
        }

        if next.category.is_none() && previous.is_some_and(Snapshot::is_typed) {
            let due = self.revisions.now() + self.settings.debounce();
            self.deferred.insert(path.to_path_buf(), due);
            tracing::debug!("{}: discriminator removed, rechecking", path.display());
            return Ok(Outcome::Deferred);
        }
        self.deferred.remove(path);
        self.workspace.remember(path, next.clone());

        let Some(category) = next.category.as_deref() else {
            return Ok(Outcome::NoOp);
        };

        if let Some(previous) = previous {
            let from = effective_category(previous, category);
            if from.as_deref() != Some(category) {
                return self.change_category(path, previous, parsed, from, category);
            }
        }

        let Some(schema) = self.schemas.get(category).cloned() else {
            if next.revision.is_some() {
                return Ok(self.mark_pending(category));
            }
            return self.create_schema_from(path, category, parsed);
        };

        if is_ahead(next.revision.as_ref(), Some(&schema.revision)) {
            return Ok(self.mark_pending(category));
        }
        if is_ahead(Some(&schema.revision), next.revision.as_ref()) {
            self.align(path, category, &schema)?;
            return Ok(Outcome::DocumentAligned);
        }

        let diff = match previous {
            Some(previous) => compute_diff(previous, next),
            None => diff_orders(&schema.keys, &next.order),
        }
        .without_key(&self.settings.category_key);

        if diff.has_key_changes() {
            return self.decide_key_change(path, category, &schema, previous, parsed, &diff);
        }
        if diff.order_changed {
            if !self.settings.order_sync {
                return Ok(Outcome::NoOp);
            }
            let schema_keys: BTreeSet<&String> = schema.keys.iter().collect();
            if next.keys.iter().collect::<BTreeSet<_>>() == schema_keys {
                return self.adopt_order(category, &schema, next);
            }
            self.align(path, category, &schema)?;
            return Ok(Outcome::DocumentAligned);
        }
        Ok(Outcome::NoOp)
    }

    fn recheck_untyped(&mut self, path: &Path) -> Result<Outcome, SyncError> {
        if self.lock.is_held() {
            let due = self.revisions.now() + self.settings.debounce();
            self.deferred.insert(path.to_path_buf(), due);
            return Ok(Outcome::Deferred);
        }
        let parsed = match self.workspace.parse(path) {
            Ok(parsed) => parsed,
            Err(SyncError::NotFound { .. }) => {
                self.workspace.forget(path);
                return Ok(Outcome::NoOp);
            }
            Err(err) => return Err(err),
        };
        if parsed.snapshot.is_typed() {
            return Ok(Outcome::NoOp);
        }
        tracing::info!("{}: now untyped", path.display());
        self.workspace.remember(path, parsed.snapshot);
        Ok(Outcome::Untyped)
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    fn decide_key_change(
        &mut self,
        path: &Path,
        category: &str,
        schema: &Schema,
        previous: Option<&Snapshot>,
        parsed: &ParsedDocument,
        diff: &Diff,
    ) -> Result<Outcome, SyncError> {
        let request = ChangeRequest {
            path,
            category,
            added: &diff.added,
            removed: &diff.removed,
        };
        match self.prompt(|p| p.decide_change(&request))? {
            ChangeDecision::Apply => self.apply_change(category, schema, &parsed.snapshot, diff),
            ChangeDecision::Revert | ChangeDecision::Dismissed => {
                self.revert(path, category, previous, parsed, Some(schema))
            }
        }
    }

    /// Run `ask` against the presenter while holding the lock, so events
    /// arriving during the prompt are dropped.
    pub(crate) fn prompt<T>(
        &mut self,
        ask: impl FnOnce(&mut dyn Presenter) -> T,
    ) -> Result<T, SyncError> {
        let _guard = self.lock.try_acquire().ok_or(SyncError::Busy)?;
        Ok(ask(self.presenter.as_mut()))
    }

    fn apply_change(
        &mut self,
        category: &str,
        schema: &Schema,
        next: &Snapshot,
        diff: &Diff,
    ) -> Result<Outcome, SyncError> {
        let kept: Vec<String> = schema
            .keys
            .iter()
            .filter(|k| !diff.removed.contains(*k))
            .cloned()
            .collect();
        let union: BTreeSet<String> = kept.iter().chain(diff.added.iter()).cloned().collect();

        let order = if self.settings.order_sync {
            let mut order: Vec<String> = next
                .order
                .iter()
                .filter(|k| union.contains(*k))
                .cloned()
                .collect();
            for key in kept.iter().chain(diff.added.iter()) {
                if !order.contains(key) {
                    order.push(key.clone());
                }
            }
            order
        } else {
            let mut order = kept.clone();
            for key in &next.order {
                if diff.added.contains(key) && !order.contains(key) {
                    order.push(key.clone());
                }
            }
            order
        };

        let reordered: Vec<&String> = order.iter().filter(|k| !diff.added.contains(*k)).collect();
        let summary = ChangeSummary {
            added: diff.added.iter().cloned().collect(),
            removed: diff.removed.iter().cloned().collect(),
            order_changed: reordered != kept.iter().collect::<Vec<_>>(),
        };
        let updated = Schema {
            keys: order,
            revision: self.revisions.next_after(&schema.revision),
            last_change: Some(summary),
        };
        tracing::info!("schema '{category}' updated to {}", updated.revision);
        self.schemas.insert(category, updated);
        self.persist();

        let rename = single_rename(diff);
        let report = self.propagate(category, rename.as_ref().map(|(a, b)| (a.as_str(), b.as_str())))?;
        Ok(Outcome::SchemaUpdated {
            category: category.to_string(),
            report,
        })
    }

    fn adopt_order(
        &mut self,
        category: &str,
        schema: &Schema,
        next: &Snapshot,
    ) -> Result<Outcome, SyncError> {
        let keys: Vec<String> = next
            .order
            .iter()
            .filter(|k| schema.contains_key(k))
            .cloned()
            .collect();
        let updated = Schema {
            keys,
            revision: self.revisions.next_after(&schema.revision),
            last_change: Some(ChangeSummary {
                order_changed: true,
                ..ChangeSummary::default()
            }),
        };
        tracing::info!("schema '{category}' reordered");
        self.schemas.insert(category, updated);
        self.persist();
        let report = self.propagate(category, None)?;
        Ok(Outcome::SchemaUpdated {
            category: category.to_string(),
            report,
        })
    }

    /// Put the document back to `previous`, schema-conformant when a schema
    /// exists and order-sync is on.
    pub(crate) fn revert(
        &mut self,
        path: &Path,
        category: &str,
        previous: Option<&Snapshot>,
        parsed: &ParsedDocument,
        schema: Option<&Schema>,
    ) -> Result<Outcome, SyncError> {
        let Some(previous) = previous else {
            if let Some(schema) = schema {
                self.align(path, category, schema)?;
            }
            return Ok(Outcome::DocumentReverted);
        };
        let restored = restore(previous, &parsed.body, &self.reserved)?;
        let text = match schema {
            Some(schema) if self.settings.order_sync => {
                let target = self.target(category, schema, None);
                conform_document(&restored, &target, &self.reserved)?
            }
            _ => restored,
        };
        self.workspace.write(path, &text)?;
        Ok(Outcome::DocumentReverted)
    }

    /// First writer creates the schema: adopt the document's key order and
    /// stamp it with the new revision.
    pub(crate) fn create_schema_from(
        &mut self,
        path: &Path,
        category: &str,
        parsed: &ParsedDocument,
    ) -> Result<Outcome, SyncError> {
        let next = &parsed.snapshot;
        let revision = self.revisions.create();
        let keys = normalize_keys(next.order.clone(), &self.settings.category_key);
        self.schemas
            .insert(category, Schema::new(keys, revision.clone()));
        self.pending.remove(category);
        tracing::info!("created schema '{category}' from {}", path.display());
        self.persist();

        let text = render_document(
            &next.order,
            &next.values,
            Some(&revision),
            &parsed.body,
            &self.reserved,
        )?;
        self.workspace.write(path, &text)?;
        Ok(Outcome::CategoryCreated {
            category: category.to_string(),
        })
    }

    fn mark_pending(&mut self, category: &str) -> Outcome {
        if self.pending.insert(category.to_string()) {
            tracing::info!("category '{category}' is pending reconciliation");
        }
        Outcome::CategoryPending {
            category: category.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Rewrites
    // -----------------------------------------------------------------------

    pub(crate) fn target<'a>(
        &self,
        category: &'a str,
        schema: &'a Schema,
        rename: Option<(&'a str, &'a str)>,
    ) -> ConformTarget<'a> {
        ConformTarget {
            category,
            schema,
            removal_sync: self.settings.removal_sync,
            rename,
        }
    }

    pub(crate) fn align(
        &mut self,
        path: &Path,
        category: &str,
        schema: &Schema,
    ) -> Result<(), SyncError> {
        let target = self.target(category, schema, None);
        self.workspace.conform(path, &target)?;
        Ok(())
    }

    /// Rewrite every document of `category` to its current schema.
    fn propagate(
        &mut self,
        category: &str,
        rename: Option<(&str, &str)>,
    ) -> Result<BulkReport, SyncError> {
        let Some(schema) = self.schemas.get(category).cloned() else {
            return Ok(BulkReport::default());
        };
        let paths = self.workspace.documents_in(category)?;
        self.propagate_to(category, &schema, &paths, rename)
    }

    pub(crate) fn propagate_to(
        &mut self,
        category: &str,
        schema: &Schema,
        paths: &[PathBuf],
        rename: Option<(&str, &str)>,
    ) -> Result<BulkReport, SyncError> {
        let target = self.target(category, schema, rename);
        let runner = BulkRunner::new(self.lock.clone()).with_yield_every(self.yield_every);
        let label = format!("Updating '{category}'");
        let workspace = &mut self.workspace;
        let report = runner.run(&label, paths, self.presenter.progress(), |path| {
            workspace.conform(path, &target).map(|_| ())
        })?;
        if report.failures > 0 || report.canceled {
            tracing::warn!(
                "{label}: {} of {} done, {} failed{}",
                report.completed,
                report.total,
                report.failures,
                if report.canceled { ", canceled" } else { "" }
            );
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Save the table. Failures are logged; the in-memory table stays
    /// authoritative until the next successful save.
    pub(crate) fn persist(&mut self) {
        match self.persistence.save(&self.settings, self.schemas.table()) {
            Ok(()) => self.refresh_last_seen(),
            Err(err) => tracing::warn!("failed to persist schemas: {err}"),
        }
    }

    fn refresh_last_seen(&mut self) {
        let result = self
            .schemas
            .serialize_snapshot()
            .and_then(|snapshot| self.last_seen.set(&snapshot));
        if let Err(err) = result {
            tracing::warn!("failed to refresh last-seen schemas: {err}");
        }
    }

    fn announce_external_changes(&mut self) {
        let snapshot = match self.last_seen.get() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!("failed to read last-seen schemas: {err}");
                return;
            }
        };
        let previous =
            match parse_snapshot(&snapshot, &self.settings.category_key, &self.revisions) {
                Ok(table) => table,
                Err(err) => {
                    tracing::warn!("ignoring unreadable last-seen schemas: {err}");
                    return;
                }
            };
        let notices = reconcile_external_change(
            &previous,
            self.schemas.table(),
            &self.settings.category_key,
        );
        if !notices.is_empty() {
            self.presenter.show_notices(&notices);
        }
    }

    // -----------------------------------------------------------------------
    // Explicit requests
    // -----------------------------------------------------------------------

    /// Rewrite every document of `category` to its schema after
    /// confirmation. When a document is ahead of the schema (or there is no
    /// schema), first offer to adopt the newest such document as the schema.
    pub fn reconcile_category(&mut self, category: &str) -> Result<Outcome, SyncError> {
        if self.lock.is_held() {
            return Err(SyncError::Busy);
        }

        let mut adopted = false;
        if let Some((path, snapshot)) = self.newest_ahead(category)? {
            let question = format!(
                "Adopt the properties of {} as the '{category}' schema?",
                path.display()
            );
            if self.prompt(|p| p.confirm(&question))?.is_yes() {
                self.adopt_document(category, &snapshot);
                adopted = true;
            }
        }

        let Some(schema) = self.schemas.get(category).cloned() else {
            return Ok(Outcome::NoOp);
        };
        let paths = self.workspace.documents_in(category)?;
        if !adopted {
            let question = format!(
                "Rewrite {} document(s) of '{category}' to match its schema?",
                paths.len()
            );
            if !self.prompt(|p| p.confirm(&question))?.is_yes() {
                return Ok(Outcome::NoOp);
            }
        }
        let report = self.propagate_to(category, &schema, &paths, None)?;
        Ok(Outcome::Reconciled {
            category: category.to_string(),
            report,
        })
    }

    /// [`reconcile_category`](Self::reconcile_category) for every known and
    /// pending category.
    pub fn reconcile_all(&mut self) -> Result<Vec<(String, Outcome)>, SyncError> {
        let categories: BTreeSet<String> = self
            .schemas
            .categories()
            .cloned()
            .chain(self.pending.iter().cloned())
            .collect();
        let mut results = Vec::new();
        for category in categories {
            let outcome = self.reconcile_category(&category)?;
            results.push((category, outcome));
        }
        Ok(results)
    }

    fn newest_ahead(&self, category: &str) -> Result<Option<(PathBuf, Snapshot)>, SyncError> {
        let current = self.schemas.get(category).map(|s| &s.revision);
        let mut newest: Option<(PathBuf, Snapshot)> = None;
        for path in self.workspace.documents_in(category)? {
            let snapshot = self.workspace.parse(&path)?.snapshot;
            let better = match &newest {
                None => true,
                Some((_, best)) => is_ahead(snapshot.revision.as_ref(), best.revision.as_ref()),
            };
            if better {
                newest = Some((path, snapshot));
            }
        }
        Ok(newest.filter(|(_, snapshot)| {
            current.is_none() || is_ahead(snapshot.revision.as_ref(), current)
        }))
    }

    fn adopt_document(&mut self, category: &str, snapshot: &Snapshot) {
        let keys = normalize_keys(snapshot.order.clone(), &self.settings.category_key);
        let last_change = self.schemas.get(category).map(|old| {
            let diff = diff_orders(&old.keys, &keys);
            ChangeSummary {
                added: diff.added.into_iter().collect(),
                removed: diff.removed.into_iter().collect(),
                order_changed: diff.order_changed,
            }
        });
        let revision = snapshot
            .revision
            .clone()
            .unwrap_or_else(|| self.revisions.create());
        let mut schema = Schema::new(keys, revision);
        schema.last_change = last_change;
        tracing::info!("schema '{category}' adopted from a document at {}", schema.revision);
        self.schemas.insert(category, schema);
        self.pending.remove(category);
        self.persist();
    }

    /// Unified diff of the conformant rewrite of `path`, or `None` when the
    /// document is untyped, has no schema, or already conforms.
    pub fn preview(&self, path: &Path) -> Result<Option<FileDiff>, SyncError> {
        let text = self.workspace.read(path)?;
        let parsed = parse_document(&text, &self.reserved);
        let Some(category) = parsed.snapshot.category.as_deref() else {
            return Ok(None);
        };
        let Some(schema) = self.schemas.get(category) else {
            return Ok(None);
        };
        let rendered = conform_parsed(&parsed, &self.target(category, schema, None), &self.reserved)?;
        if rendered == text {
            return Ok(None);
        }
        let old_header = format!("a/{}", path.display());
        let new_header = format!("b/{}", path.display());
        let unified_diff = TextDiff::from_lines(&text, &rendered)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();
        Ok(Some(FileDiff {
            path: path.to_path_buf(),
            unified_diff,
        }))
    }

    pub fn status(&self) -> Result<StatusReport, SyncError> {
        let mut categories: BTreeMap<String, CategoryStatus> = self
            .schemas
            .table()
            .iter()
            .map(|(name, schema)| {
                (
                    name.clone(),
                    CategoryStatus {
                        name: name.clone(),
                        keys: schema.keys.clone(),
                        revision: Some(schema.revision.clone()),
                        documents: 0,
                        nonconforming: 0,
                        pending: self.pending.contains(name),
                    },
                )
            })
            .collect();
        let mut report = StatusReport::default();

        for path in self.workspace.list()? {
            let text = self.workspace.read(&path)?;
            let parsed = parse_document(&text, &self.reserved);
            if parsed.snapshot.malformed {
                report.malformed.push(path);
                continue;
            }
            let Some(category) = parsed.snapshot.category.clone() else {
                report.untyped += 1;
                continue;
            };
            let conforms = match self.schemas.get(&category) {
                Some(schema) => {
                    conform_parsed(&parsed, &self.target(&category, schema, None), &self.reserved)?
                        == text
                }
                None => false,
            };
            let entry = categories
                .entry(category.clone())
                .or_insert_with(|| CategoryStatus {
                    name: category.clone(),
                    keys: Vec::new(),
                    revision: None,
                    documents: 0,
                    nonconforming: 0,
                    pending: true,
                });
            entry.documents += 1;
            if !conforms {
                entry.nonconforming += 1;
            }
        }

        report.categories = categories.into_values().collect();
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&mut self, path: &Path) -> PathPhase {
        let now = self.revisions.now();
        phase_of(path, &self.debouncer, self.workspace.suppression_mut(), now)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn schemas(&self) -> &SchemaStore {
        &self.schemas
    }

    pub fn schema(&self, category: &str) -> Option<&Schema> {
        self.schemas.get(category)
    }

    /// Handle on the reconciliation lock, e.g. for a watcher callback.
    pub fn lock(&self) -> ReconcileLock {
        self.lock.clone()
    }

    pub fn pending(&self) -> impl Iterator<Item = &String> {
        self.pending.iter()
    }

    pub fn is_pending(&self, category: &str) -> bool {
        self.pending.contains(category)
    }

    pub fn is_deferred(&self, path: &Path) -> bool {
        self.deferred.contains_key(path)
    }

    pub fn snapshot(&self, path: &Path) -> Option<&Snapshot> {
        self.workspace.snapshot(path)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.revisions.now()
    }
}

/// The category a previous snapshot belonged to. An untyped snapshot that
/// still carries revision properties counts as already being `next`.
fn effective_category(previous: &Snapshot, next: &str) -> Option<String> {
    match &previous.category {
        Some(category) => Some(category.clone()),
        None if previous.revision.is_some() => Some(next.to_string()),
        None => None,
    }
}

/// Exactly one key removed and one added reads as a rename.
fn single_rename(diff: &Diff) -> Option<(String, String)> {
    if diff.removed.len() != 1 || diff.added.len() != 1 {
        return None;
    }
    let old = diff.removed.iter().next()?;
    let new = diff.added.iter().next()?;
    Some((old.clone(), new.clone()))
}
