//! Implementation of the `grove clean` command.

use anyhow::{Context, Result};

use grove_lib::execute::sync::cleanup_projects;
use grove_lib::scan::{ScanMode, local_projects};
use grove_lib::workspace::Workspace;

/// Restore every checkout to a pristine `master`, dropping untracked files
/// and local changes, and optionally deleting all other branches.
pub fn cmd_clean(ws: &Workspace, branches: bool) -> Result<()> {
  let projects = local_projects(ws, ScanMode::Full).context("scan failed")?;
  cleanup_projects(&projects, branches).context("clean failed")?;
  println!("cleaned {} project(s)", projects.len());
  Ok(())
}
