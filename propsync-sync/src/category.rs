//! The category-change protocol.
//!
//! | previous   | new category has a schema | prompt                       |
//! |------------|---------------------------|------------------------------|
//! | untyped    | yes                       | align / cancel               |
//! | untyped    | no                        | create / cancel              |
//! | typed      | yes                       | align / cancel               |
//! | typed      | no                        | create / rename / cancel     |
//!
//! Cancelling puts the previous discriminator back, or for a previously
//! untyped document restores its old header (or strips the discriminator
//! when it had none). Rename is only offered when the old category has a
//! schema.

use std::path::Path;

use propsync_core::{ParsedDocument, Snapshot};

use crate::conform::{restore, set_category, strip_category};
use crate::controller::{Outcome, ReconciliationController};
use crate::error::SyncError;
use crate::ports::{AlignDecision, CreateDecision, RetypeDecision, RetypeRequest};

impl ReconciliationController {
    pub(crate) fn change_category(
        &mut self,
        path: &Path,
        previous: &Snapshot,
        parsed: &ParsedDocument,
        from: Option<String>,
        to: &str,
    ) -> Result<Outcome, SyncError> {
        let from = from.as_deref();
        let can_rename = from.is_some_and(|old| self.schemas.contains(old));
        let request = RetypeRequest {
            path,
            from,
            to,
            can_rename,
        };
        tracing::info!(
            "{}: category {} -> {to}",
            path.display(),
            from.unwrap_or("(none)")
        );

        if let Some(schema) = self.schemas.get(to).cloned() {
            return match self.prompt(|p| p.decide_align(&request))? {
                AlignDecision::Align => {
                    self.align(path, to, &schema)?;
                    Ok(Outcome::DocumentAligned)
                }
                AlignDecision::Cancel | AlignDecision::Dismissed => {
                    self.cancel_retype(path, previous, parsed, from)
                }
            };
        }

        let Some(old) = from else {
            return match self.prompt(|p| p.decide_create(&request))? {
                CreateDecision::Create => self.create_schema_from(path, to, parsed),
                CreateDecision::Cancel | CreateDecision::Dismissed => {
                    self.cancel_retype(path, previous, parsed, None)
                }
            };
        };

        match self.prompt(|p| p.decide_retype(&request))? {
            RetypeDecision::CreateNew => self.create_schema_from(path, to, parsed),
            RetypeDecision::RenameExisting if can_rename => self.rename_category(path, old, to),
            RetypeDecision::RenameExisting => {
                tracing::warn!("'{old}' has no schema to rename; keeping the document as is");
                self.cancel_retype(path, previous, parsed, Some(old))
            }
            RetypeDecision::Cancel | RetypeDecision::Dismissed => {
                self.cancel_retype(path, previous, parsed, Some(old))
            }
        }
    }

    fn cancel_retype(
        &mut self,
        path: &Path,
        previous: &Snapshot,
        parsed: &ParsedDocument,
        from: Option<&str>,
    ) -> Result<Outcome, SyncError> {
        let text = match from {
            Some(old) => set_category(parsed, old, &self.reserved)?,
            None if previous.has_header => restore(previous, &parsed.body, &self.reserved)?,
            None => strip_category(parsed, &self.reserved)?,
        };
        self.workspace.write(path, &text)?;
        Ok(Outcome::DocumentReverted)
    }

    /// Move the schema of `from` to `to` and carry every document of `from`
    /// along, together with the document that triggered the rename.
    fn rename_category(&mut self, path: &Path, from: &str, to: &str) -> Result<Outcome, SyncError> {
        let mut paths = self.workspace.documents_in(from)?;
        let Some(schema) = self.schemas.rename(from, to) else {
            return Ok(Outcome::NoOp);
        };
        self.pending.remove(to);
        tracing::info!("renamed schema '{from}' to '{to}'");
        self.persist();

        if !paths.iter().any(|p| p == path) {
            paths.insert(0, path.to_path_buf());
        }
        let report = self.propagate_to(to, &schema, &paths, None)?;
        Ok(Outcome::CategoryRenamed {
            from: from.to_string(),
            to: to.to_string(),
            report,
        })
    }
}
