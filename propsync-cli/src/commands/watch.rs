//! `propsync watch [--auto apply|revert] [--log-json]`

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use propsync_daemon::{start_blocking, Interrupt, LogFormat};
use propsync_sync::AutoPolicy;

use crate::presenter::TerminalPresenter;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AutoArg {
    /// Accept every change and create schemas as needed.
    Apply,
    /// Undo every change that would alter a schema.
    Revert,
}

/// Watch the root and keep documents in line until Ctrl-C.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Answer prompts automatically instead of asking.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub auto: Option<AutoArg>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl WatchArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        super::ensure_initialized(root)?;
        let interrupt = Interrupt::new();
        let presenter = match self.auto {
            Some(AutoArg::Apply) => TerminalPresenter::with_policy(AutoPolicy::Accept),
            Some(AutoArg::Revert) => TerminalPresenter::with_policy(AutoPolicy::Decline),
            None => TerminalPresenter::interactive(),
        }
        .with_cancel(interrupt.flag());
        let format = if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        start_blocking(root, Box::new(presenter), format, interrupt)
            .context("watcher exited with error")
    }
}
