//! `propsync init [--category-key K] [--extension E] [--no-order-sync] [--no-removal-sync]`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use propsync_core::Settings;
use propsync_store::StateFile;

/// Create the state file for a document root.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Property naming the category of a document.
    #[arg(long, value_name = "KEY")]
    pub category_key: Option<String>,

    /// Extension of governed documents, without the dot.
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Do not carry property reordering over to the schema.
    #[arg(long)]
    pub no_order_sync: bool,

    /// Keep properties the schema does not list when rewriting documents.
    #[arg(long)]
    pub no_removal_sync: bool,
}

impl InitArgs {
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(key) = &self.category_key {
            settings.category_key = key.clone();
        }
        if let Some(ext) = &self.extension {
            settings.extension = ext.trim_start_matches('.').to_string();
        }
        settings.order_sync = !self.no_order_sync;
        settings.removal_sync = !self.no_removal_sync;
        settings
    }

    pub fn run(self, root: &Path) -> Result<()> {
        let state = StateFile::at_root(root);
        let created = state
            .init(&self.settings())
            .with_context(|| format!("failed to initialize '{}'", root.display()))?;

        if created {
            println!("✓ Initialized propsync in '{}'", root.display());
            println!("  Saved to: {}", state.path().display());
        } else {
            println!("Already initialized: {}", state.path().display());
        }
        Ok(())
    }
}
