//! Implementation of the `grove update` command.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use grove_lib::execute::update_universe;
use grove_lib::workspace::Workspace;

/// Reconcile every local project with its manifest counterpart, then record
/// an update-history snapshot.
pub fn cmd_update(ws: &Workspace, gc: bool) -> Result<()> {
  println!("{} {}", "Updating".green().bold(), ws.root().display());
  update_universe(ws, gc).context("update failed")?;
  println!("{}", "Update complete.".green().bold());
  Ok(())
}
