//! The engine running over the filesystem adapters.

use std::path::Path;
use std::sync::Arc;

use assert_fs::prelude::*;
use predicates::prelude::*;

use propsync_core::SystemClock;
use propsync_store::{ports_at, LastSeenFile, StateFile};
use propsync_sync::{AutoPolicy, AutoPresenter, Outcome, ReconciliationController};

fn open(root: &Path, policy: AutoPolicy) -> ReconciliationController {
    let (ports, _) = ports_at(root, Box::new(AutoPresenter::new(policy))).unwrap();
    ReconciliationController::open(ports, Arc::new(SystemClock)).unwrap()
}

#[test]
fn first_typed_document_creates_a_persisted_schema() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("notes/a.md")
        .write_str("---\ncategory: book\ntitle: Dune\n---\nbody\n")
        .unwrap();

    let mut controller = open(temp.path(), AutoPolicy::Accept);
    assert_eq!(controller.prime().unwrap(), 1);

    let outcome = controller.handle_change(Path::new("notes/a.md")).unwrap();
    assert_eq!(
        outcome,
        Outcome::CategoryCreated {
            category: "book".into()
        }
    );

    temp.child("notes/a.md")
        .assert(predicate::str::contains("schema-revision:").and(predicate::str::ends_with("body\n")));
    temp.child(".propsync/state.yaml")
        .assert(predicate::str::contains("book:").and(predicate::str::contains("title")));

    let stored = StateFile::at_root(temp.path()).load_state().unwrap();
    assert!(stored.schemas.contains_key("book"));
    assert!(LastSeenFile::at_root(temp.path())
        .load_snapshot()
        .unwrap()
        .is_some_and(|s| s.contains("book")));
}

#[test]
fn reconcile_rewrites_siblings_on_disk() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("a.md")
        .write_str("---\ncategory: book\ntitle: Dune\n---\n")
        .unwrap();
    temp.child("b.md")
        .write_str("---\ncategory: book\nauthor: Herbert\n---\ntext\n")
        .unwrap();

    let mut controller = open(temp.path(), AutoPolicy::Accept);
    controller.prime().unwrap();
    controller.handle_change(Path::new("a.md")).unwrap();

    let outcome = controller.reconcile_category("book").unwrap();
    assert!(matches!(outcome, Outcome::Reconciled { ref category, .. } if category == "book"));

    temp.child("b.md").assert(
        predicate::str::contains("title")
            .and(predicate::str::contains("author").not())
            .and(predicate::str::contains("schema-revision:"))
            .and(predicate::str::ends_with("text\n")),
    );
}

#[test]
fn reopening_sees_the_persisted_table() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("a.md")
        .write_str("---\ncategory: book\ntitle: Dune\n---\n")
        .unwrap();

    let mut first = open(temp.path(), AutoPolicy::Accept);
    first.prime().unwrap();
    first.handle_change(Path::new("a.md")).unwrap();
    let revision = first.schema("book").unwrap().revision.clone();
    drop(first);

    let second = open(temp.path(), AutoPolicy::Decline);
    assert_eq!(second.schema("book").unwrap().revision, revision);
    assert_eq!(
        second.schema("book").unwrap().keys,
        vec!["category".to_string(), "title".to_string()]
    );
}

#[test]
fn state_directory_is_never_listed() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(".propsync/notes.md").write_str("---\ncategory: x\n---\n").unwrap();
    temp.child("real.md").write_str("plain\n").unwrap();

    let mut controller = open(temp.path(), AutoPolicy::Accept);
    assert_eq!(controller.prime().unwrap(), 1);
    let status = controller.status().unwrap();
    assert_eq!(status.untyped, 1);
}
