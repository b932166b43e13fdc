//! `propsync reconcile [--category C] [--yes]`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use propsync_daemon::Interrupt;
use propsync_sync::{AutoPolicy, Outcome};

use crate::presenter::TerminalPresenter;

/// Rewrite documents to their category's schema.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Only this category (default: every category).
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Answer yes to every question.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl ReconcileArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        // First Ctrl-C stops the bulk rewrite between documents.
        let interrupt = Interrupt::new();
        interrupt
            .listen_for_ctrl_c()
            .context("failed to install the Ctrl-C handler")?;
        let presenter = if self.yes {
            TerminalPresenter::with_policy(AutoPolicy::Accept)
        } else {
            TerminalPresenter::interactive()
        }
        .with_cancel(interrupt.flag());
        let mut controller = super::open(root, presenter)?;

        let results = match &self.category {
            Some(category) => {
                let outcome = controller
                    .reconcile_category(category)
                    .with_context(|| format!("reconcile failed for '{category}'"))?;
                vec![(category.clone(), outcome)]
            }
            None => controller.reconcile_all().context("reconcile failed")?,
        };

        if results.is_empty() {
            println!("No categories to reconcile.");
        }
        for (category, outcome) in results {
            print_outcome(&category, &outcome);
        }
        Ok(())
    }
}

fn print_outcome(category: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Reconciled { report, .. } => {
            let mut line = format!(
                "✓ '{category}' reconciled ({} of {} documents",
                report.completed, report.total
            );
            if report.failures > 0 {
                line.push_str(&format!(", {} failed", report.failures));
            }
            if report.canceled {
                line.push_str(&format!(", {} skipped", report.skipped()));
            }
            line.push(')');
            println!("{line}");
        }
        Outcome::NoOp => println!("· '{category}' left as is"),
        other => println!("· '{category}': {other:?}"),
    }
}
