//! Implementation of the `grove snapshot` command.

use std::path::Path;

use anyhow::{Context, Result};

use grove_lib::snapshot::create_snapshot;
use grove_lib::workspace::Workspace;

/// Write the current state of all projects to a snapshot manifest.
pub fn cmd_snapshot(ws: &Workspace, file: &Path, snapshot_path: &str) -> Result<()> {
  create_snapshot(ws, file, snapshot_path).context("snapshot failed")?;
  println!("wrote snapshot to {}", file.display());
  Ok(())
}
