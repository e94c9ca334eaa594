//! Implementation of the `grove checkout` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use grove_lib::snapshot::checkout_snapshot;
use grove_lib::workspace::Workspace;

/// Reconcile the tree to the state recorded in a snapshot file.
pub fn cmd_checkout(ws: &Workspace, file: &Path, gc: bool) -> Result<()> {
  println!("{} {}", "Checking out".green().bold(), file.display());
  checkout_snapshot(ws, file, gc).context("checkout failed")?;
  println!("{}", "Checkout complete.".green().bold());
  Ok(())
}
