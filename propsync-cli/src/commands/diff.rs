//! `propsync diff <path>`: the rewrite a document would get, as a unified diff.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use propsync_sync::AutoPolicy;

use crate::presenter::TerminalPresenter;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Document path, relative to the root.
    pub path: PathBuf,
}

impl DiffArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let controller = super::open(root, TerminalPresenter::with_policy(AutoPolicy::Decline))?;
        let relative = self
            .path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.path.clone());

        let diff = controller
            .preview(&relative)
            .with_context(|| format!("diff failed for '{}'", relative.display()))?;

        match diff {
            None => println!("No differences for '{}'.", relative.display()),
            Some(diff) => {
                print!("{}", diff.unified_diff);
                if !diff.unified_diff.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }
}
