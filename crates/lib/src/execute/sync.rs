//! Syncing checkouts to their pinned state.
//!
//! grove only ever advances the local `master` branch. Work in progress on
//! other branches survives every operation: the current branch and any
//! dirty state are stashed away, `master` is updated, and the original
//! branch and stash are restored afterwards.

use tracing::warn;

use crate::git::{Git, GitError};
use crate::project::{Project, Projects};

/// Run `f` with the project's `master` branch checked out, restoring the
/// original branch and any stashed changes afterwards. When both `f` and the
/// restore fail, the error from `f` wins.
pub fn on_local_master<T, E, F>(project: &Project, f: F) -> Result<T, E>
where
  E: From<GitError>,
  F: FnOnce() -> Result<T, E>,
{
  let git = Git::new(&project.path);
  let branch = git.current_branch().map_err(E::from)?;
  let stashed = git.stash().map_err(E::from)?;
  git.checkout("master", false).map_err(E::from)?;

  let result = f();

  let restore: Result<(), GitError> = (|| {
    git.checkout(&branch, false)?;
    if stashed {
      git.stash_pop()?;
    }
    Ok(())
  })();

  match (result, restore) {
    (Ok(value), Ok(())) => Ok(value),
    (Ok(_), Err(restore_err)) => Err(E::from(restore_err)),
    (Err(err), restore) => {
      if let Err(restore_err) = restore {
        warn!(project = %project.name, error = %restore_err, "failed to restore branch state");
      }
      Err(err)
    }
  }
}

/// Point `origin` at the project's remote and fetch it.
pub fn fetch_project(project: &Project) -> Result<(), GitError> {
  let git = Git::new(&project.path);
  git.set_remote_url("origin", &project.remote)?;
  git.fetch("origin")
}

/// Hard-reset the current branch to the project's pinned state. A concrete
/// revision takes precedence; otherwise the tracked remote branch is used.
pub fn reset_to_pinned(project: &Project) -> Result<(), GitError> {
  let git = Git::new(&project.path);
  if !project.revision.is_empty() && project.revision != "HEAD" {
    return git.reset(&project.revision);
  }
  let branch = if project.remote_branch.is_empty() {
    "master"
  } else {
    project.remote_branch.as_str()
  };
  git.reset(&format!("origin/{branch}"))
}

/// Fetch the project's remote and reset the local `master` branch to the
/// pinned revision or tracked branch.
pub fn sync_on_master(project: &Project) -> Result<(), GitError> {
  on_local_master(project, || {
    fetch_project(project)?;
    reset_to_pinned(project)
  })
}

/// Report when the checkout is not on `master`. Advisory only: updates never
/// touch other branches, so the user has to merge afterwards.
pub fn report_non_master(project: &Project) -> Result<(), GitError> {
  let current = Git::new(&project.path).current_branch()?;
  if current != "master" {
    warn!(project = %project.name, branch = %current, "project is not on master");
    println!("NOTE: grove only updates the \"master\" branch and the current branch is {current:?}");
    println!("to update the {current:?} branch once the master branch is updated, run \"git merge master\"");
  }
  Ok(())
}

/// Restore the given checkouts to a pristine `master`: force-checkout
/// `master`, drop untracked files, reset to the pinned state, and optionally
/// force-delete every other branch.
pub fn cleanup_projects(projects: &Projects, cleanup_branches: bool) -> Result<(), GitError> {
  for project in projects.values() {
    let git = Git::new(&project.path);
    if git.current_branch()? != "master" {
      git.checkout("master", true)?;
    }
    git.remove_untracked_files()?;
    reset_to_pinned(project)?;
    if !cleanup_branches {
      continue;
    }
    let (branches, _) = git.branches()?;
    for branch in branches {
      if branch != "master" {
        git.delete_branch(&branch, true)?;
      }
    }
  }
  Ok(())
}
