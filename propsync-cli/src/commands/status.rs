//! `propsync status`: schemas, their documents, and what is out of line.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use propsync_sync::{AutoPolicy, CategoryStatus, StatusReport};

use crate::presenter::TerminalPresenter;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let controller = super::open(root, TerminalPresenter::with_policy(AutoPolicy::Decline))?;
        let report = controller.status().context("failed to scan documents")?;

        if self.json {
            print_json(root, &report)?;
            return Ok(());
        }
        print_table(root, &report);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    root: &'a Path,
    summary: StatusSummaryJson,
    categories: &'a [CategoryStatus],
    malformed: &'a [std::path::PathBuf],
}

#[derive(Serialize)]
struct StatusSummaryJson {
    categories: usize,
    documents: usize,
    untyped: usize,
    out_of_line: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "state")]
    state: &'static str,
    #[tabled(rename = "documents")]
    documents: usize,
    #[tabled(rename = "out of line")]
    nonconforming: usize,
    #[tabled(rename = "properties")]
    keys: String,
    #[tabled(rename = "updated")]
    updated: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Current,
    Drift,
    Pending,
}

fn state_of(category: &CategoryStatus) -> State {
    if category.pending {
        State::Pending
    } else if category.nonconforming > 0 {
        State::Drift
    } else {
        State::Current
    }
}

fn state_label(state: State) -> &'static str {
    match state {
        State::Current => "CURRENT",
        State::Drift => "DRIFT",
        State::Pending => "PENDING",
    }
}

fn state_indicator(state: State) -> String {
    match state {
        State::Current => "■".green().bold().to_string(),
        State::Drift => "■".yellow().bold().to_string(),
        State::Pending => "■".magenta().bold().to_string(),
    }
}

fn print_json(root: &Path, report: &StatusReport) -> Result<()> {
    let payload = StatusJson {
        root,
        summary: StatusSummaryJson {
            categories: report.categories.len(),
            documents: report.categories.iter().map(|c| c.documents).sum(),
            untyped: report.untyped,
            out_of_line: report.categories.iter().map(|c| c.nonconforming).sum(),
        },
        categories: &report.categories,
        malformed: &report.malformed,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

/// `"42s ago"`, `"5m ago"`, `"3h ago"`, `"2d ago"`.
fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    let age = match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 60 * 60 => format!("{}m", s / 60),
        s if s < 60 * 60 * 24 => format!("{}h", s / (60 * 60)),
        s => format!("{}d", s / (60 * 60 * 24)),
    };
    format!("{age} ago")
}

fn print_table(root: &Path, report: &StatusReport) {
    let documents: usize = report.categories.iter().map(|c| c.documents).sum();
    println!(
        "propsync v{} | {} | {} categories | {} typed, {} untyped documents",
        env!("CARGO_PKG_VERSION"),
        root.display(),
        report.categories.len(),
        documents,
        report.untyped,
    );

    if report.categories.is_empty() {
        println!("No categories yet.");
    } else {
        let separator = "■".repeat(67).bright_black().to_string();
        println!("{separator}");
        println!(
            "Indicators: {} CURRENT  {} DRIFT  {} PENDING",
            state_indicator(State::Current),
            state_indicator(State::Drift),
            state_indicator(State::Pending),
        );
        println!("{separator}");

        let rows: Vec<StatusTableRow> = report
            .categories
            .iter()
            .map(|category| StatusTableRow {
                category: category.name.clone(),
                state: state_label(state_of(category)),
                documents: category.documents,
                nonconforming: category.nonconforming,
                keys: category.keys.join(", "),
                updated: category
                    .revision
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |r| format_age(r.updated_at)),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if !report.malformed.is_empty() {
        println!("{}", "Malformed headers (left untouched):".red().bold());
        for path in &report.malformed {
            println!("  {}", path.display());
        }
    }

    if report
        .categories
        .iter()
        .any(|c| state_of(c) != State::Current)
    {
        println!("Run 'propsync reconcile' to bring documents in line.");
    }
}
