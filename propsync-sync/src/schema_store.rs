//! The category → schema table.
//!
//! Loading is tolerant: damaged entries are repaired rather than rejected,
//! and the repaired categories are reported back to the caller. The table
//! also knows how to compare itself with an older copy to produce notices
//! about schema changes that happened outside this process.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_yaml::Value;

use propsync_core::{
    diff_orders, truncate_to_millis, ChangeSummary, Diff, RevisionClock, RevisionMarker, Schema,
    SchemaTable,
};

use crate::error::SyncError;

/// A schema change noticed between sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNotice {
    /// A category that did not exist before.
    Introduced { category: String, keys: Vec<String> },
    /// An existing category whose revision moved.
    Changed { category: String, diff: Diff },
}

impl fmt::Display for SchemaNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaNotice::Introduced { category, keys } => {
                write!(f, "new schema '{category}' with {}", join(keys.iter()))
            }
            SchemaNotice::Changed { category, diff } => {
                write!(f, "schema '{category}' changed")?;
                if !diff.added.is_empty() {
                    write!(f, "; added {}", join(diff.added.iter()))?;
                }
                if !diff.removed.is_empty() {
                    write!(f, "; removed {}", join(diff.removed.iter()))?;
                }
                if diff.order_changed {
                    write!(f, "; reordered")?;
                }
                Ok(())
            }
        }
    }
}

fn join<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    let keys: Vec<&str> = keys.map(String::as_str).collect();
    if keys.is_empty() {
        "no properties".to_string()
    } else {
        keys.join(", ")
    }
}

#[derive(Debug, Clone)]
pub struct SchemaStore {
    table: SchemaTable,
    category_key: String,
}

impl SchemaStore {
    pub fn new(category_key: impl Into<String>) -> Self {
        Self {
            table: SchemaTable::new(),
            category_key: category_key.into(),
        }
    }

    /// Build from raw persisted entries, repairing damaged ones. Returns the
    /// store and the names of the categories that needed repair.
    pub fn load(
        raw: &BTreeMap<String, Value>,
        category_key: &str,
        revisions: &RevisionClock,
    ) -> (Self, Vec<String>) {
        let (table, repaired) = normalize(raw, category_key, revisions);
        (
            Self {
                table,
                category_key: category_key.to_string(),
            },
            repaired,
        )
    }

    pub fn table(&self) -> &SchemaTable {
        &self.table
    }

    pub fn category_key(&self) -> &str {
        &self.category_key
    }

    pub fn get(&self, category: &str) -> Option<&Schema> {
        self.table.get(category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.table.contains_key(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &String> {
        self.table.keys()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Insert or replace, enforcing the discriminator invariant on `keys`.
    pub fn insert(&mut self, category: &str, mut schema: Schema) {
        schema.keys = normalize_keys(schema.keys, &self.category_key);
        self.table.insert(category.to_string(), schema);
    }

    pub fn remove(&mut self, category: &str) -> Option<Schema> {
        self.table.remove(category)
    }

    /// Move `from` to `to`, keeping its revision. Returns the moved schema.
    pub fn rename(&mut self, from: &str, to: &str) -> Option<Schema> {
        let schema = self.table.remove(from)?;
        self.table.insert(to.to_string(), schema.clone());
        Some(schema)
    }

    /// JSON rendering of the table for the last-seen cache.
    pub fn serialize_snapshot(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(&self.table)?)
    }
}

/// Repair every entry of a raw table. Entries without a well-formed key list
/// or revision become `{keys: [category_key], revision: fresh}`.
pub fn normalize(
    raw: &BTreeMap<String, Value>,
    category_key: &str,
    revisions: &RevisionClock,
) -> (SchemaTable, Vec<String>) {
    let mut table = SchemaTable::new();
    let mut repaired = Vec::new();
    for (category, entry) in raw {
        let keys = entry.get("keys").and_then(parse_keys);
        let revision = entry
            .get("revision")
            .cloned()
            .and_then(|v| serde_yaml::from_value::<RevisionMarker>(v).ok())
            .filter(|r| !r.revision_id.trim().is_empty());
        let last_change = entry
            .get("last_change")
            .cloned()
            .and_then(|v| serde_yaml::from_value::<ChangeSummary>(v).ok());

        let schema = match (keys, revision) {
            (Some(keys), Some(mut revision)) => {
                let normalized = normalize_keys(keys.clone(), category_key);
                let updated_at = truncate_to_millis(revision.updated_at);
                if normalized != keys || updated_at != revision.updated_at {
                    repaired.push(category.clone());
                }
                revision.updated_at = updated_at;
                Schema {
                    keys: normalized,
                    revision,
                    last_change,
                }
            }
            _ => {
                repaired.push(category.clone());
                Schema::new(vec![category_key.to_string()], revisions.create())
            }
        };
        table.insert(category.clone(), schema);
    }
    (table, repaired)
}

/// Parse a last-seen snapshot. Damaged entries are repaired the same way
/// [`normalize`] repairs persisted ones.
pub fn parse_snapshot(
    snapshot: &str,
    category_key: &str,
    revisions: &RevisionClock,
) -> Result<SchemaTable, SyncError> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(snapshot)?;
    Ok(normalize(&raw, category_key, revisions).0)
}

/// Collapse duplicates (first occurrence wins) and make sure the
/// discriminator appears exactly once, prepending it when missing.
pub fn normalize_keys(keys: Vec<String>, category_key: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out: Vec<String> = keys
        .into_iter()
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect();
    if !seen.contains(category_key) {
        out.insert(0, category_key.to_string());
    }
    out
}

/// Report what changed between two copies of the table. Categories only in
/// `prev` are not reported; unchanged revisions are not reported.
pub fn reconcile_external_change(
    prev: &SchemaTable,
    next: &SchemaTable,
    category_key: &str,
) -> Vec<SchemaNotice> {
    let mut notices = Vec::new();
    for (category, schema) in next {
        match prev.get(category) {
            None => notices.push(SchemaNotice::Introduced {
                category: category.clone(),
                keys: schema
                    .keys
                    .iter()
                    .filter(|k| k.as_str() != category_key)
                    .cloned()
                    .collect(),
            }),
            Some(old) if old.revision != schema.revision => {
                notices.push(SchemaNotice::Changed {
                    category: category.clone(),
                    diff: diff_orders(&old.keys, &schema.keys),
                });
            }
            Some(_) => {}
        }
    }
    notices
}

fn parse_keys(value: &Value) -> Option<Vec<String>> {
    value
        .as_sequence()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use propsync_core::ManualClock;

    fn revisions() -> RevisionClock {
        RevisionClock::new(Arc::new(ManualClock::at_epoch()))
    }

    fn raw(yaml: &str) -> BTreeMap<String, Value> {
        serde_yaml::from_str(yaml).expect("raw table")
    }

    #[test]
    fn well_formed_entries_load_untouched() {
        let table = raw(
            "Book:\n  keys: [category, Title]\n  revision:\n    updated_at: 2024-01-01T00:00:00Z\n    revision_id: abc\n",
        );
        let (store, repaired) = SchemaStore::load(&table, "category", &revisions());
        assert!(repaired.is_empty());
        let book = store.get("Book").expect("Book");
        assert_eq!(book.keys, vec!["category", "Title"]);
        assert_eq!(book.revision.revision_id, "abc");
    }

    #[test]
    fn sub_millisecond_revision_is_truncated_and_reported() {
        let table = raw(
            "Book:\n  keys: [category, Title]\n  revision:\n    updated_at: 2024-01-01T00:00:00.000500Z\n    revision_id: abc\n",
        );
        let (store, repaired) = SchemaStore::load(&table, "category", &revisions());
        assert_eq!(repaired, vec!["Book"]);
        let book = store.get("Book").expect("Book");
        assert_eq!(book.revision.updated_at.timestamp_subsec_nanos(), 0);
        assert_eq!(book.revision.revision_id, "abc");
        assert_eq!(book.keys, vec!["category", "Title"]);
    }

    #[test]
    fn missing_revision_is_repaired_not_rejected() {
        let table = raw("Book:\n  keys: [category, Title]\nMovie: 42\n");
        let (store, repaired) = SchemaStore::load(&table, "category", &revisions());
        assert_eq!(repaired, vec!["Book", "Movie"]);
        assert_eq!(store.get("Book").expect("Book").keys, vec!["category"]);
        assert_eq!(store.get("Movie").expect("Movie").keys, vec!["category"]);
    }

    #[test]
    fn key_list_without_discriminator_gets_it_prepended() {
        let table = raw(
            "Book:\n  keys: [Title, Title, Author]\n  revision:\n    updated_at: 2024-01-01T00:00:00Z\n    revision_id: abc\n",
        );
        let (store, repaired) = SchemaStore::load(&table, "category", &revisions());
        assert_eq!(repaired, vec!["Book"]);
        assert_eq!(
            store.get("Book").expect("Book").keys,
            vec!["category", "Title", "Author"]
        );
    }

    #[test]
    fn non_string_keys_make_the_list_malformed() {
        let table = raw(
            "Book:\n  keys: [category, [nested]]\n  revision:\n    updated_at: 2024-01-01T00:00:00Z\n    revision_id: abc\n",
        );
        let (_, repaired) = SchemaStore::load(&table, "category", &revisions());
        assert_eq!(repaired, vec!["Book"]);
    }

    #[test]
    fn rename_keeps_the_revision() {
        let revisions = revisions();
        let mut store = SchemaStore::new("category");
        let schema = Schema::new(vec!["category".into()], revisions.create());
        store.insert("Book", schema.clone());
        let moved = store.rename("Book", "Novel").expect("rename");
        assert_eq!(moved.revision, schema.revision);
        assert!(!store.contains("Book"));
        assert_eq!(store.get("Novel").expect("Novel").revision, schema.revision);
    }

    #[test]
    fn external_changes_report_new_and_moved_categories_only() {
        let revisions = revisions();
        let mut prev = SchemaTable::new();
        prev.insert(
            "Book".into(),
            Schema::new(vec!["category".into(), "Title".into()], revisions.create()),
        );
        prev.insert(
            "Film".into(),
            Schema::new(vec!["category".into()], revisions.create()),
        );

        let mut next = prev.clone();
        let book = next.get_mut("Book").expect("Book");
        book.keys.push("Author".into());
        book.revision = revisions.next_after(&book.revision);
        next.insert(
            "Album".into(),
            Schema::new(vec!["category".into(), "Artist".into()], revisions.create()),
        );

        let notices = reconcile_external_change(&prev, &next, "category");
        assert_eq!(notices.len(), 2);
        assert!(notices.contains(&SchemaNotice::Introduced {
            category: "Album".into(),
            keys: vec!["Artist".into()],
        }));
        let changed = notices
            .iter()
            .find_map(|n| match n {
                SchemaNotice::Changed { category, diff } if category == "Book" => Some(diff),
                _ => None,
            })
            .expect("Book notice");
        assert!(changed.added.contains("Author"));
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let revisions = revisions();
        let mut store = SchemaStore::new("category");
        store.insert(
            "Book",
            Schema::new(vec!["category".into(), "Title".into()], revisions.create()),
        );
        let json = store.serialize_snapshot().expect("serialize");
        let table = parse_snapshot(&json, "category", &revisions).expect("parse");
        assert_eq!(&table, store.table());
    }
}
