#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use propsync_core::{extract, ManualClock, ReservedKeys, Snapshot};
use propsync_sync::memory::{MemoryDocumentStore, MemoryLastSeen, MemoryPersistence};
use propsync_sync::{
    AlignDecision, ChangeDecision, ChangeRequest, Confirmation, CreateDecision, Observation,
    Outcome, Ports, Presenter, ProgressSink, ReconciliationController, RetypeDecision,
    RetypeRequest, SchemaNotice,
};

/// Revision properties matching [`schema_entry`]'s revision.
pub const R1: &str = "schema-updated-at: 2024-01-01T00:00:00.000Z\nschema-revision: r1\n";

/// Raw persisted schema entry at revision `r1`.
pub fn schema_entry(keys: &[&str]) -> String {
    format!(
        "keys: [{}]\nrevision:\n  updated_at: 2024-01-01T00:00:00Z\n  revision_id: r1\n",
        keys.join(", ")
    )
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// Scripted presenter
// ---------------------------------------------------------------------------

/// Queued answers plus a record of everything the controller asked. An
/// empty queue answers `Dismissed`.
#[derive(Debug, Default)]
pub struct Script {
    pub changes: VecDeque<ChangeDecision>,
    pub aligns: VecDeque<AlignDecision>,
    pub creates: VecDeque<CreateDecision>,
    pub retypes: VecDeque<RetypeDecision>,
    pub confirms: VecDeque<Confirmation>,
    pub prompts: Vec<String>,
    pub notices: Vec<SchemaNotice>,
    /// Request cancellation once this many documents were handled.
    pub cancel_after: Option<usize>,
    pub completed: usize,
    pub failures: usize,
    pub rename_offered: Option<bool>,
}

fn locked(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedProgress {
    script: Arc<Mutex<Script>>,
}

impl ProgressSink for ScriptedProgress {
    fn set_total(&mut self, _total: usize) {}
    fn set_status(&mut self, _status: &str) {}
    fn increment_completed(&mut self) {
        locked(&self.script).completed += 1;
    }
    fn increment_failures(&mut self) {
        locked(&self.script).failures += 1;
    }
    fn cancellation_requested(&self) -> bool {
        let script = locked(&self.script);
        script
            .cancel_after
            .is_some_and(|n| script.completed + script.failures >= n)
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedPresenter {
    script: Arc<Mutex<Script>>,
    progress: ScriptedProgress,
}

impl ScriptedPresenter {
    pub fn new() -> Self {
        let script = Arc::new(Mutex::new(Script::default()));
        Self {
            progress: ScriptedProgress {
                script: Arc::clone(&script),
            },
            script,
        }
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        locked(&self.script)
    }
}

impl Presenter for ScriptedPresenter {
    fn decide_change(&mut self, request: &ChangeRequest<'_>) -> ChangeDecision {
        let mut script = self.script();
        script.prompts.push(format!("change {}", request.category));
        script.changes.pop_front().unwrap_or(ChangeDecision::Dismissed)
    }

    fn decide_align(&mut self, request: &RetypeRequest<'_>) -> AlignDecision {
        let mut script = self.script();
        script.prompts.push(format!("align {}", request.to));
        script.aligns.pop_front().unwrap_or(AlignDecision::Dismissed)
    }

    fn decide_create(&mut self, request: &RetypeRequest<'_>) -> CreateDecision {
        let mut script = self.script();
        script.prompts.push(format!("create {}", request.to));
        script.creates.pop_front().unwrap_or(CreateDecision::Dismissed)
    }

    fn decide_retype(&mut self, request: &RetypeRequest<'_>) -> RetypeDecision {
        let mut script = self.script();
        script.prompts.push(format!("retype {}", request.to));
        script.rename_offered = Some(request.can_rename);
        script.retypes.pop_front().unwrap_or(RetypeDecision::Dismissed)
    }

    fn confirm(&mut self, question: &str) -> Confirmation {
        let mut script = self.script();
        script.prompts.push(format!("confirm {question}"));
        script.confirms.pop_front().unwrap_or(Confirmation::Dismissed)
    }

    fn show_notices(&mut self, notices: &[SchemaNotice]) {
        self.script().notices.extend_from_slice(notices);
    }

    fn progress(&mut self) -> &mut dyn ProgressSink {
        &mut self.progress
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A controller over in-memory ports and a manual clock, with the port
/// handles kept for inspection.
pub struct Harness {
    pub docs: MemoryDocumentStore,
    pub persistence: MemoryPersistence,
    pub last_seen: MemoryLastSeen,
    pub presenter: ScriptedPresenter,
    pub clock: ManualClock,
    pub controller: ReconciliationController,
}

impl Harness {
    pub fn open(docs: MemoryDocumentStore, persistence: MemoryPersistence) -> Self {
        Self::open_with(docs, persistence, MemoryLastSeen::new())
    }

    pub fn open_with(
        docs: MemoryDocumentStore,
        persistence: MemoryPersistence,
        last_seen: MemoryLastSeen,
    ) -> Self {
        init_logging();
        let clock = ManualClock::at_epoch();
        let presenter = ScriptedPresenter::new();
        let ports = Ports {
            documents: Box::new(docs.clone()),
            persistence: Box::new(persistence.clone()),
            last_seen: Box::new(last_seen.clone()),
            presenter: Box::new(presenter.clone()),
        };
        let controller =
            ReconciliationController::open(ports, Arc::new(clock.clone())).expect("open");
        Self {
            docs,
            persistence,
            last_seen,
            presenter,
            clock,
            controller,
        }
    }

    pub fn primed(mut self) -> Self {
        self.controller.prime().expect("prime");
        self
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.presenter.script()
    }

    /// Change a document on disk and notify the controller.
    pub fn touch(&mut self, path: &str, text: &str) -> Observation {
        self.docs.insert(path, text);
        self.controller.observe(Path::new(path))
    }

    /// Let the debounce interval pass and process whatever is due.
    pub fn settle(&mut self) -> Vec<(PathBuf, Outcome)> {
        self.clock.advance(self.controller.settings().debounce());
        self.controller
            .tick()
            .into_iter()
            .map(|(path, result)| (path, result.expect("processed")))
            .collect()
    }

    /// An editor save well outside any suppression window, fully processed.
    pub fn edit(&mut self, path: &str, text: &str) -> Outcome {
        self.clock.advance_ms(5_000);
        assert_eq!(self.touch(path, text), Observation::Scheduled);
        self.settle()
            .into_iter()
            .find(|(p, _)| p == Path::new(path))
            .map(|(_, outcome)| outcome)
            .expect("event processed")
    }

    pub fn text(&self, path: &str) -> String {
        self.docs.get(path).expect("document exists")
    }

    pub fn snapshot(&self, path: &str) -> Snapshot {
        extract(&self.text(path), &ReservedKeys::default())
    }
}
