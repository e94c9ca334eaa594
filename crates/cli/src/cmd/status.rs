//! Implementation of the `grove status` command.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use grove_lib::git::Git;
use grove_lib::scan::{ScanMode, local_projects};
use grove_lib::workspace::Workspace;

/// List every managed project with its branch and pinned revision.
pub fn cmd_status(ws: &Workspace) -> Result<()> {
  let projects = local_projects(ws, ScanMode::Full).context("scan failed")?;
  if projects.is_empty() {
    println!("no managed projects under {}", ws.root().display());
    return Ok(());
  }

  for project in projects.values() {
    let branch = Git::new(&project.path)
      .current_branch()
      .unwrap_or_else(|_| "?".to_string());
    let revision = if project.revision.len() < 8 {
      project.revision.as_str()
    } else {
      &project.revision[..8]
    };
    let location = project.path.strip_prefix(ws.root()).unwrap_or(&project.path);
    if branch == "master" {
      println!("{}  {}  {}  {}", revision, project.name.bold(), location.display(), branch);
    } else {
      println!(
        "{}  {}  {}  {}",
        revision,
        project.name.bold(),
        location.display(),
        branch.yellow()
      );
    }
  }
  Ok(())
}
