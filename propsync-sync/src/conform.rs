//! Schema-conformant rewrites of a single document.
//!
//! Everything here is pure text → text. Values for keys present in both the
//! document and the target schema are preserved; target-only keys become
//! blank placeholders; document-only keys are dropped unless removal-sync is
//! off, in which case they trail the schema's own keys.

use serde_yaml::Value;

use propsync_core::{
    parse_document, render_document, CoreError, ParsedDocument, ReservedKeys, Schema, Snapshot,
};

use crate::error::SyncError;

/// Where a document is being moved to.
#[derive(Debug, Clone, Copy)]
pub struct ConformTarget<'a> {
    pub category: &'a str,
    pub schema: &'a Schema,
    pub removal_sync: bool,
    /// `(old key, new key)`: carry the old key's value into a blank new key.
    pub rename: Option<(&'a str, &'a str)>,
}

/// Rewrite `text` to match `target`. Refuses malformed headers.
pub fn conform_document(
    text: &str,
    target: &ConformTarget<'_>,
    reserved: &ReservedKeys,
) -> Result<String, SyncError> {
    let parsed = parse_document(text, reserved);
    conform_parsed(&parsed, target, reserved)
}

pub fn conform_parsed(
    parsed: &ParsedDocument,
    target: &ConformTarget<'_>,
    reserved: &ReservedKeys,
) -> Result<String, SyncError> {
    let snapshot = &parsed.snapshot;
    if snapshot.malformed {
        return Err(CoreError::MalformedHeader.into());
    }

    let mut values = snapshot.values.clone();
    if let Some((old, new)) = target.rename {
        if values.get(new).map_or(true, is_blank) {
            if let Some(value) = values.remove(old) {
                values.insert(new.to_string(), value);
            }
        }
    }
    values.insert(
        reserved.category.clone(),
        Value::String(target.category.to_string()),
    );

    let mut order = target.schema.keys.clone();
    if !target.removal_sync {
        for key in &snapshot.order {
            if !target.schema.contains_key(key) && values.contains_key(key) {
                order.push(key.clone());
            }
        }
    }

    Ok(render_document(
        &order,
        &values,
        Some(&target.schema.revision),
        &parsed.body,
        reserved,
    )?)
}

/// Whether rewriting `text` to `target` would change nothing.
pub fn is_conformant(
    text: &str,
    target: &ConformTarget<'_>,
    reserved: &ReservedKeys,
) -> Result<bool, SyncError> {
    Ok(conform_document(text, target, reserved)? == text)
}

/// Re-render `previous` in place of the current header, keeping the body.
pub fn restore(
    previous: &Snapshot,
    body: &str,
    reserved: &ReservedKeys,
) -> Result<String, SyncError> {
    if !previous.has_header {
        return Ok(body.to_string());
    }
    Ok(render_document(
        &previous.order,
        &previous.values,
        previous.revision.as_ref(),
        body,
        reserved,
    )?)
}

/// Put the discriminator back to `category`, leaving every other property
/// where it is.
pub fn set_category(
    parsed: &ParsedDocument,
    category: &str,
    reserved: &ReservedKeys,
) -> Result<String, SyncError> {
    let snapshot = &parsed.snapshot;
    if snapshot.malformed {
        return Err(CoreError::MalformedHeader.into());
    }
    let mut values = snapshot.values.clone();
    values.insert(reserved.category.clone(), Value::String(category.to_string()));
    let mut order = snapshot.order.clone();
    if !order.contains(&reserved.category) {
        order.insert(0, reserved.category.clone());
    }
    Ok(render_document(
        &order,
        &values,
        snapshot.revision.as_ref(),
        &parsed.body,
        reserved,
    )?)
}

/// Remove the discriminator. A header left with nothing in it is dropped.
pub fn strip_category(parsed: &ParsedDocument, reserved: &ReservedKeys) -> Result<String, SyncError> {
    let snapshot = &parsed.snapshot;
    if snapshot.malformed {
        return Err(CoreError::MalformedHeader.into());
    }
    let mut values = snapshot.values.clone();
    values.remove(&reserved.category);
    let order: Vec<String> = snapshot
        .order
        .iter()
        .filter(|k| **k != reserved.category)
        .cloned()
        .collect();
    if order.is_empty() && snapshot.revision.is_none() {
        return Ok(parsed.body.clone());
    }
    Ok(render_document(
        &order,
        &values,
        snapshot.revision.as_ref(),
        &parsed.body,
        reserved,
    )?)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
