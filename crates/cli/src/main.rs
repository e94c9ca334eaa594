//! grove: manage a tree of git checkouts against a declarative manifest.
//!
//! Provides the `grove` command with subcommands:
//! - `grove update` - reconcile the tree with the manifest graph
//! - `grove snapshot <file>` - write a snapshot of the current universe
//! - `grove checkout <snapshot>` - reconcile the tree to a snapshot
//! - `grove status` - list managed projects
//! - `grove clean` - restore checkouts to a pristine master

mod cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use grove_lib::manifest::ManifestError;
use grove_lib::workspace::Workspace;

#[derive(Parser)]
#[command(name = "grove")]
#[command(version, about = "Multi-repository workspace manager")]
struct Cli {
  /// Workspace root. Defaults to $GROVE_ROOT.
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Update all projects to match the manifest
  Update {
    /// Remove projects that are no longer in the manifest
    #[arg(long)]
    gc: bool,
  },

  /// Write a snapshot of the current project universe
  Snapshot {
    /// File to write the snapshot to
    file: PathBuf,

    /// Path recorded inside the snapshot, relative to the root
    #[arg(long, default_value = "")]
    snapshot_path: String,
  },

  /// Update the tree to the state recorded in a snapshot
  Checkout {
    /// Snapshot file to check out
    file: PathBuf,

    /// Remove projects that are not in the snapshot
    #[arg(long)]
    gc: bool,
  },

  /// List managed projects and their state
  Status,

  /// Restore all checkouts to a pristine master branch
  Clean {
    /// Also delete all non-master branches
    #[arg(long)]
    branches: bool,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
  FmtSubscriber::builder()
    .with_max_level(level)
    .with_target(false)
    .without_time()
    .init();

  match run(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("grove: {err:#}");
      // Manifest problems are the caller-visible "bad input" case.
      if err.chain().any(|cause| cause.is::<ManifestError>()) {
        ExitCode::from(2)
      } else {
        ExitCode::FAILURE
      }
    }
  }
}

fn run(cli: &Cli) -> Result<()> {
  let ws = workspace(cli)?;
  match &cli.command {
    Commands::Update { gc } => cmd::cmd_update(&ws, *gc),
    Commands::Snapshot { file, snapshot_path } => cmd::cmd_snapshot(&ws, file, snapshot_path),
    Commands::Checkout { file, gc } => cmd::cmd_checkout(&ws, file, *gc),
    Commands::Status => cmd::cmd_status(&ws),
    Commands::Clean { branches } => cmd::cmd_clean(&ws, *branches),
  }
}

fn workspace(cli: &Cli) -> Result<Workspace> {
  if let Some(root) = &cli.root {
    return Ok(Workspace::new(root.clone()));
  }
  Workspace::from_env().ok_or_else(|| anyhow!("no workspace root: pass --root or set $GROVE_ROOT"))
}
