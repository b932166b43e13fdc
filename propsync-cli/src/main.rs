//! propsync: keep document headers in line with a per-category schema.
//!
//! # Usage
//!
//! ```text
//! propsync [--root <dir>] init [--category-key K] [--extension E] [--no-order-sync] [--no-removal-sync]
//! propsync [--root <dir>] status [--json]
//! propsync [--root <dir>] reconcile [--category C] [--yes]
//! propsync [--root <dir>] diff <path>
//! propsync [--root <dir>] watch [--auto apply|revert] [--log-json]
//! ```

mod commands;
mod presenter;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, init::InitArgs, reconcile::ReconcileArgs, status::StatusArgs,
    watch::WatchArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "propsync",
    version,
    about = "Keep document properties in line with a schema per category",
    long_about = None,
)]
struct Cli {
    /// Document root.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the state file for a document root.
    Init(InitArgs),

    /// Show schemas, document counts and documents out of line.
    Status(StatusArgs),

    /// Rewrite documents to their schema, adopting newer documents first.
    Reconcile(ReconcileArgs),

    /// Show the unified diff of the rewrite a document would get.
    Diff(DiffArgs),

    /// Watch the root and reconcile edits as they happen.
    Watch(WatchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = cli.root;
    match cli.command {
        Commands::Init(args) => args.run(&root),
        Commands::Status(args) => args.run(&root),
        Commands::Reconcile(args) => args.run(&root),
        Commands::Diff(args) => args.run(&root),
        Commands::Watch(args) => args.run(&root),
    }
}
