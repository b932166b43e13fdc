use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const STATE: &str = "\
settings:
  category_key: category
schemas:
  book:
    keys: [category, title]
    revision:
      updated_at: 2024-01-01T00:00:00Z
      revision_id: r1
";

fn propsync(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("propsync").expect("propsync binary");
    cmd.arg("--root").arg(root);
    cmd
}

/// A root with a `book` schema and two documents out of line with it.
fn seeded_root() -> TempDir {
    let root = TempDir::new().expect("root");
    fs::create_dir_all(root.path().join(".propsync")).unwrap();
    fs::write(root.path().join(".propsync/state.yaml"), STATE).unwrap();
    fs::write(
        root.path().join("dune.md"),
        "---\ncategory: book\ntitle: Dune\n---\nSand.\n",
    )
    .unwrap();
    fs::write(
        root.path().join("emma.md"),
        "---\ncategory: book\nauthor: Austen\n---\nEmma.\n",
    )
    .unwrap();
    root
}

#[test]
fn init_creates_state_once() {
    let root = TempDir::new().unwrap();

    propsync(root.path())
        .args(["init", "--category-key", "kind", "--no-order-sync"])
        .assert()
        .success()
        .stdout(contains("Initialized"));

    let state = fs::read_to_string(root.path().join(".propsync/state.yaml")).unwrap();
    assert!(state.contains("category_key: kind"));
    assert!(state.contains("order_sync: false"));

    propsync(root.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Already initialized"));
}

#[test]
fn commands_require_init() {
    let root = TempDir::new().unwrap();
    propsync(root.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("propsync init"));
}

#[test]
fn status_json_counts_documents_out_of_line() {
    let root = seeded_root();
    propsync(root.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(
            contains("\"name\": \"book\"")
                .and(contains("\"documents\": 2"))
                .and(contains("\"nonconforming\": 2"))
                .and(contains("\"untyped\": 0")),
        );
}

#[test]
fn status_table_names_each_category() {
    let root = seeded_root();
    propsync(root.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("book").and(contains("DRIFT")));
}

#[test]
fn diff_previews_without_writing() {
    let root = seeded_root();
    let before = fs::read_to_string(root.path().join("emma.md")).unwrap();

    propsync(root.path())
        .args(["diff", "emma.md"])
        .assert()
        .success()
        .stdout(
            contains("--- a/emma.md")
                .and(contains("+++ b/emma.md"))
                .and(contains("-author: Austen"))
                .and(contains("+schema-revision: r1")),
        );

    assert_eq!(fs::read_to_string(root.path().join("emma.md")).unwrap(), before);
}

#[test]
fn diff_of_untyped_document_reports_no_differences() {
    let root = seeded_root();
    fs::write(root.path().join("plain.md"), "just text\n").unwrap();
    propsync(root.path())
        .args(["diff", "plain.md"])
        .assert()
        .success()
        .stdout(contains("No differences"));
}

#[test]
fn reconcile_yes_rewrites_every_document() {
    let root = seeded_root();

    propsync(root.path())
        .args(["reconcile", "--category", "book", "--yes"])
        .assert()
        .success()
        .stdout(contains("'book' reconciled (2 of 2 documents)"));

    let emma = fs::read_to_string(root.path().join("emma.md")).unwrap();
    assert!(emma.contains("schema-revision: r1"));
    assert!(!emma.contains("author"));
    assert!(emma.ends_with("Emma.\n"));

    propsync(root.path())
        .args(["diff", "dune.md"])
        .assert()
        .success()
        .stdout(contains("No differences"));
}

#[test]
fn reconcile_declined_on_closed_stdin_leaves_documents() {
    let root = seeded_root();
    let before = fs::read_to_string(root.path().join("emma.md")).unwrap();

    propsync(root.path())
        .args(["reconcile", "--category", "book"])
        .stdin(std::process::Stdio::null())
        .assert()
        .success()
        .stdout(contains("left as is"));

    assert_eq!(fs::read_to_string(root.path().join("emma.md")).unwrap(), before);
}
