//! Header extraction and rendering.
//!
//! A document's header is the block between a first line of `---` and the
//! next `---` line. Extraction runs in two passes:
//!
//! 1. `serde_yaml` parses the block into the value map.
//! 2. A tolerant line scanner recovers the textual key order, since the
//!    parsed mapping does not promise to keep it.
//!
//! Keys the scanner could not place are appended by [`repair_order`], so the
//! resulting order is always a permutation of the key set.

use std::collections::{BTreeMap, BTreeSet};

use chrono::SecondsFormat;
use serde_yaml::{Mapping, Value};

use crate::error::CoreError;
use crate::revision::parse_timestamp;
use crate::types::{ReservedKeys, RevisionMarker};

pub const HEADER_MARKER: &str = "---";

/// Property name → parsed YAML value.
pub type ValueMap = BTreeMap<String, Value>;

/// Parsed, diffable state of one document at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Trimmed discriminator value; `None` when absent or blank.
    pub category: Option<String>,
    /// Property names, excluding the reserved revision properties.
    pub keys: BTreeSet<String>,
    /// `keys` in textual order.
    pub order: Vec<String>,
    pub values: ValueMap,
    pub has_header: bool,
    /// A header block was present but was not a YAML mapping.
    pub malformed: bool,
    pub revision: Option<RevisionMarker>,
}

impl Snapshot {
    pub fn is_typed(&self) -> bool {
        self.category.is_some()
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// A snapshot plus the text that follows the header block.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub snapshot: Snapshot,
    pub body: String,
}

/// Parse `text` into a snapshot and body. Never fails: a missing or
/// unterminated header is an empty header, and an unparseable one is
/// flagged [`Snapshot::malformed`].
pub fn parse_document(text: &str, reserved: &ReservedKeys) -> ParsedDocument {
    let Some((content, body)) = split_header(text) else {
        return ParsedDocument {
            snapshot: Snapshot::default(),
            body: text.to_string(),
        };
    };

    let Some(mut values) = parse_value_map(content) else {
        return ParsedDocument {
            snapshot: Snapshot {
                malformed: true,
                ..Snapshot::default()
            },
            body: body.to_string(),
        };
    };

    let revision = extract_revision(&values, reserved);
    values.remove(&reserved.revision_time);
    values.remove(&reserved.revision_id);

    let mut order = scan_key_order(content, &values);
    repair_order(&mut order, &values);

    let category = values
        .get(&reserved.category)
        .and_then(scalar_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    ParsedDocument {
        snapshot: Snapshot {
            category,
            keys: order.iter().cloned().collect(),
            order,
            values,
            has_header: true,
            malformed: false,
            revision,
        },
        body: body.to_string(),
    }
}

/// Shorthand for `parse_document(..).snapshot`.
pub fn extract(text: &str, reserved: &ReservedKeys) -> Snapshot {
    parse_document(text, reserved).snapshot
}

/// Append every key of `values` that `order` is missing, in map order.
/// Keys in `order` that are not in `values` are dropped.
pub fn repair_order(order: &mut Vec<String>, values: &ValueMap) {
    order.retain(|k| values.contains_key(k));
    let present: BTreeSet<String> = order.iter().cloned().collect();
    for key in values.keys() {
        if !present.contains(key) {
            order.push(key.clone());
        }
    }
}

/// Render a full document: header in `order`, reserved revision properties
/// last, then `body` verbatim. Missing and null values render as a bare key.
pub fn render_document(
    order: &[String],
    values: &ValueMap,
    revision: Option<&RevisionMarker>,
    body: &str,
    reserved: &ReservedKeys,
) -> Result<String, CoreError> {
    let mut out = String::with_capacity(body.len() + 64);
    out.push_str(HEADER_MARKER);
    out.push('\n');
    for key in order {
        if reserved.is_revision_key(key) {
            continue;
        }
        render_entry(&mut out, key, values.get(key).unwrap_or(&Value::Null))?;
    }
    if let Some(revision) = revision {
        let at = revision
            .updated_at
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        render_entry(&mut out, &reserved.revision_time, &Value::String(at))?;
        render_entry(
            &mut out,
            &reserved.revision_id,
            &Value::String(revision.revision_id.clone()),
        )?;
    }
    out.push_str(HEADER_MARKER);
    out.push('\n');
    out.push_str(body);
    Ok(out)
}

/// Re-render a parsed document from its own snapshot.
pub fn render_snapshot(
    snapshot: &Snapshot,
    body: &str,
    reserved: &ReservedKeys,
) -> Result<String, CoreError> {
    render_document(
        &snapshot.order,
        &snapshot.values,
        snapshot.revision.as_ref(),
        body,
        reserved,
    )
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Returns `(header content, body)` when the text opens with a terminated
/// header block.
fn split_header(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != HEADER_MARKER {
        return None;
    }
    let content_start = first.len();
    let mut offset = content_start;
    for line in lines {
        if line.trim_end() == HEADER_MARKER {
            return Some((&text[content_start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn parse_value_map(content: &str) -> Option<ValueMap> {
    if content.trim().is_empty() {
        return Some(ValueMap::new());
    }
    let mapping = match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(Value::Null) => return Some(ValueMap::new()),
        Ok(_) | Err(_) => return None,
    };
    let mut values = ValueMap::new();
    for (key, value) in mapping {
        if let Some(key) = scalar_to_string(&key) {
            values.entry(key).or_insert(value);
        }
    }
    Some(values)
}

fn scan_key_order(content: &str, known: &ValueMap) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut order = Vec::new();
    for line in content.lines() {
        if line.is_empty()
            || line.starts_with(char::is_whitespace)
            || line.starts_with('#')
            || line.starts_with('-')
        {
            continue;
        }
        let Some(key) = line_key(line) else { continue };
        if known.contains_key(&key) && seen.insert(key.clone()) {
            order.push(key);
        }
    }
    order
}

fn line_key(line: &str) -> Option<String> {
    for quote in ['"', '\''] {
        if let Some(rest) = line.strip_prefix(quote) {
            let end = rest.find(quote)?;
            let after = rest[end + 1..].trim_start();
            return after.starts_with(':').then(|| rest[..end].to_string());
        }
    }
    let idx = line.find(':')?;
    let key = line[..idx].trim();
    (!key.is_empty()).then(|| key.to_string())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn extract_revision(values: &ValueMap, reserved: &ReservedKeys) -> Option<RevisionMarker> {
    let at = match values.get(&reserved.revision_time)? {
        Value::String(s) if !s.trim().is_empty() => s.trim(),
        _ => return None,
    };
    let id = match values.get(&reserved.revision_id)? {
        Value::String(s) if !s.trim().is_empty() => s.trim(),
        _ => return None,
    };
    let updated_at = parse_timestamp(at).ok()?;
    Some(RevisionMarker {
        updated_at,
        revision_id: id.to_string(),
    })
}

fn render_entry(out: &mut String, key: &str, value: &Value) -> Result<(), CoreError> {
    if value.is_null() {
        let rendered_key = serde_yaml::to_string(&Value::String(key.to_string()))?;
        out.push_str(rendered_key.trim_end());
        out.push_str(":\n");
        return Ok(());
    }
    let mut entry = Mapping::new();
    entry.insert(Value::String(key.to_string()), value.clone());
    out.push_str(&serde_yaml::to_string(&entry)?);
    Ok(())
}
