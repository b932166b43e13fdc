//! Domain types shared by every propsync crate.
//!
//! All types are serializable via serde + serde_yaml; the schema table and
//! settings are persisted as one YAML document by `propsync-store`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Revision markers
// ---------------------------------------------------------------------------

/// A `(timestamp, id)` pair that totally orders schema and document states.
///
/// Field order matters: the derived `Ord` compares `updated_at` first and
/// falls back to a lexicographic comparison of `revision_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RevisionMarker {
    pub updated_at: DateTime<Utc>,
    pub revision_id: String,
}

impl fmt::Display for RevisionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.revision_id,
            self.updated_at
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        )
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// What the most recent schema mutation changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeSummary {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub order_changed: bool,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.order_changed
    }
}

/// Canonical ordered property list for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered property names; always contains the discriminator exactly once.
    pub keys: Vec<String>,
    pub revision: RevisionMarker,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_change: Option<ChangeSummary>,
}

impl Schema {
    pub fn new(keys: Vec<String>, revision: RevisionMarker) -> Self {
        Self {
            keys,
            revision,
            last_change: None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Category name → schema. `BTreeMap` keeps persisted output deterministic.
pub type SchemaTable = BTreeMap<String, Schema>;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub const DEFAULT_CATEGORY_KEY: &str = "category";
pub const DEFAULT_REVISION_TIME_KEY: &str = "schema-updated-at";
pub const DEFAULT_REVISION_ID_KEY: &str = "schema-revision";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_SUPPRESSION_MS: u64 = 1500;
pub const DEFAULT_EXTENSION: &str = "md";
/// Upper bound applied to the debounce and suppression delays (one day).
pub const MAX_DELAY_MS: u64 = 86_400_000;

/// User-tunable behaviour, persisted next to the schema table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Property naming the schema that governs a document.
    pub category_key: String,
    pub revision_time_key: String,
    pub revision_id_key: String,
    /// Reordering a document's properties reorders the schema and siblings.
    pub order_sync: bool,
    /// Conformant rewrites delete properties the schema does not list.
    pub removal_sync: bool,
    pub debounce_ms: u64,
    pub suppression_ms: u64,
    /// File extension (without the dot) of governed documents.
    pub extension: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            category_key: DEFAULT_CATEGORY_KEY.to_string(),
            revision_time_key: DEFAULT_REVISION_TIME_KEY.to_string(),
            revision_id_key: DEFAULT_REVISION_ID_KEY.to_string(),
            order_sync: true,
            removal_sync: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            suppression_ms: DEFAULT_SUPPRESSION_MS,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl Settings {
    pub fn reserved(&self) -> ReservedKeys {
        ReservedKeys {
            category: self.category_key.clone(),
            revision_time: self.revision_time_key.clone(),
            revision_id: self.revision_id_key.clone(),
        }
    }

    pub fn debounce(&self) -> chrono::Duration {
        delay(self.debounce_ms)
    }

    pub fn suppression(&self) -> chrono::Duration {
        delay(self.suppression_ms)
    }
}

fn delay(ms: u64) -> chrono::Duration {
    let clamped = i64::try_from(ms.min(MAX_DELAY_MS)).unwrap_or(i64::MAX);
    chrono::Duration::milliseconds(clamped)
}

/// Names of the three properties the engine owns inside every header.
///
/// The two revision properties never appear in a snapshot's key set; they
/// travel in [`crate::Snapshot::revision`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedKeys {
    pub category: String,
    pub revision_time: String,
    pub revision_id: String,
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Settings::default().reserved()
    }
}

impl ReservedKeys {
    pub fn is_revision_key(&self, key: &str) -> bool {
        key == self.revision_time || key == self.revision_id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
