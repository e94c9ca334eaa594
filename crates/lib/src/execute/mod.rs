//! Running a plan against the filesystem and git.
//!
//! Execution is two-phase. The *test* phase checks every operation's
//! preconditions against the filesystem and an [`FsUpdates`] record of
//! directories earlier operations in the same plan will have deleted; no
//! operation runs until the whole plan passes, so a failing plan leaves the
//! tree untouched. The *run* phase then executes operations in plan order,
//! followed by run-hooks, git-hook installation, and finally the
//! update-history snapshot.
//!
//! A create stages its clone in a scratch sibling directory and renames it
//! into place as the last step, so an untimely death never leaves a
//! half-populated checkout at the final path.

pub mod sync;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::consts::{GIT_EXCLUDE_ENTRY, ROOT_ENV, SELF_PROJECT_NAME, SELF_SCRIPT};
use crate::git::{self, Git, GitError};
use crate::loader::{self, LoadError};
use crate::plan::{Operation, compute_operations};
use crate::project::{Project, ProjectError, Projects, find_unique, write_metadata};
use crate::scan::{self, ScanError, ScanMode};
use crate::snapshot::{self, SnapshotError};
use crate::workspace::Workspace;

/// Errors from the run of a single plan.
#[derive(Debug, Error)]
pub enum ExecuteError {
  #[error(transparent)]
  Git(#[from] GitError),

  #[error(transparent)]
  Project(#[from] ProjectError),

  #[error("filesystem operation on {path:?} failed: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("cannot create {path:?} as it already exists")]
  CreateCollision { path: PathBuf },

  #[error("cannot delete {path:?} as it does not exist")]
  DeleteMissing { path: PathBuf },

  #[error("cannot move {from:?} to {destination:?} as the source does not exist")]
  MoveSourceMissing { from: PathBuf, destination: PathBuf },

  #[error("cannot move {from:?} to {destination:?} as the destination already exists")]
  MoveCollision { from: PathBuf, destination: PathBuf },

  #[error("failed to spawn hook {hook:?} for project {name:?}: {source}")]
  HookSpawn {
    name: String,
    hook: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("hook {hook:?} for project {name:?} failed ({status})")]
  Hook { name: String, hook: PathBuf, status: String },
}

impl ExecuteError {
  fn io(path: &Path, source: io::Error) -> Self {
    ExecuteError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Errors from a whole update pass.
#[derive(Debug, Error)]
pub enum UpdateError {
  #[error(transparent)]
  Scan(#[from] ScanError),

  #[error(transparent)]
  Load(#[from] LoadError),

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error(transparent)]
  Snapshot(#[from] SnapshotError),
}

/// Filesystem changes made by earlier operations in the same plan. Only
/// deletions are tracked: they are what allows a later create or move to
/// reoccupy a path that is still on disk during the test phase.
#[derive(Debug, Default)]
pub struct FsUpdates {
  deleted_dirs: HashSet<PathBuf>,
}

impl FsUpdates {
  pub fn delete_dir(&mut self, dir: &Path) {
    self.deleted_dirs.insert(dir.to_path_buf());
  }

  pub fn is_deleted(&self, dir: &Path) -> bool {
    self.deleted_dirs.contains(dir)
  }
}

/// Check one operation's preconditions, recording deletions it will make.
pub fn test(op: &Operation, updates: &mut FsUpdates) -> Result<(), ExecuteError> {
  match op {
    Operation::Create { destination, .. } => {
      if destination.exists() && !updates.is_deleted(destination) {
        return Err(ExecuteError::CreateCollision {
          path: destination.clone(),
        });
      }
      Ok(())
    }
    Operation::Delete { source, .. } => {
      if !source.exists() {
        return Err(ExecuteError::DeleteMissing { path: source.clone() });
      }
      updates.delete_dir(source);
      Ok(())
    }
    Operation::Move {
      source, destination, ..
    } => {
      if !source.exists() {
        return Err(ExecuteError::MoveSourceMissing {
          from: source.clone(),
          destination: destination.clone(),
        });
      }
      if destination.exists() && !updates.is_deleted(destination) {
        return Err(ExecuteError::MoveCollision {
          from: source.clone(),
          destination: destination.clone(),
        });
      }
      updates.delete_dir(source);
      Ok(())
    }
    Operation::Update { .. } | Operation::Null { .. } => Ok(()),
  }
}

/// Execute one operation.
pub fn run(ws: &Workspace, op: &Operation) -> Result<(), ExecuteError> {
  match op {
    Operation::Create { project, destination } => run_create(ws, project, destination),
    Operation::Delete { project, source, gc } => run_delete(project, source, *gc),
    Operation::Move {
      project,
      source,
      destination,
    } => run_move(ws, project, source, destination),
    Operation::Update { project, .. } => run_update(ws, project),
    Operation::Null { project, .. } => write_metadata(ws.root(), project, &project.path).map_err(ExecuteError::from),
  }
}

fn run_create(ws: &Workspace, project: &Project, destination: &Path) -> Result<(), ExecuteError> {
  let parent = destination.parent().unwrap_or(destination);
  fs::create_dir_all(parent).map_err(|e| ExecuteError::io(parent, e))?;

  // Stage the clone in a scratch sibling; the rename below is the only step
  // that makes the project visible at its final path. The scratch directory
  // is removed on every error path before that rename.
  let prefix = format!("{}-", project.name.replace('/', "."));
  let staging = tempfile::Builder::new()
    .prefix(&prefix)
    .tempdir_in(parent)
    .map_err(|e| ExecuteError::io(parent, e))?;

  git::clone(&project.remote, staging.path())?;
  write_metadata(ws.root(), project, staging.path())?;
  set_permissions(staging.path(), 0o755).map_err(|e| ExecuteError::io(staging.path(), e))?;

  let scratch = staging.keep();
  if let Err(source) = fs::rename(&scratch, destination) {
    let _ = fs::remove_dir_all(&scratch);
    return Err(ExecuteError::io(destination, source));
  }

  sync::sync_on_master(project)?;
  Ok(())
}

fn run_delete(project: &Project, source: &Path, gc: bool) -> Result<(), ExecuteError> {
  if !gc {
    warn!(project = %project.name, path = %source.display(), "orphaned project left on disk");
    println!("NOTE: project {} was not found in the project manifest", project.name);
    println!("it was not automatically removed to avoid deleting uncommitted work");
    println!("if you no longer need it, invoke \"rm -rf {}\"", source.display());
    println!("or invoke \"grove update --gc\" to remove all such local projects");
    return Ok(());
  }

  // Never delete checkouts holding unfinished work: anything beyond a
  // single pristine master branch keeps the directory alive.
  let git = Git::new(source);
  let (branches, _) = git.branches()?;
  let uncommitted = git.has_uncommitted_changes()?;
  let untracked = git.has_untracked_files()?;
  if branches.len() != 1 || branches[0] != "master" || uncommitted || untracked {
    warn!(project = %project.name, path = %source.display(), "orphaned project looks dirty, not deleting");
    println!("NOTE: project {} was not found in the project manifest", project.name);
    println!("however this project either contains non-master branches, uncommitted");
    println!("work, or untracked files and will thus not be deleted");
    return Ok(());
  }

  fs::remove_dir_all(source).map_err(|e| ExecuteError::io(source, e))
}

fn run_move(ws: &Workspace, project: &Project, source: &Path, destination: &Path) -> Result<(), ExecuteError> {
  let parent = destination.parent().unwrap_or(destination);
  fs::create_dir_all(parent).map_err(|e| ExecuteError::io(parent, e))?;
  fs::rename(source, destination).map_err(|e| ExecuteError::io(destination, e))?;
  sync::report_non_master(project)?;
  sync::sync_on_master(project)?;
  write_metadata(ws.root(), project, &project.path)?;
  Ok(())
}

fn run_update(ws: &Workspace, project: &Project) -> Result<(), ExecuteError> {
  sync::report_non_master(project)?;
  sync::sync_on_master(project)?;
  write_metadata(ws.root(), project, &project.path)?;
  Ok(())
}

/// Run the declared `run_hook` of every created, moved, or updated project,
/// with the operation kind as argument and the root exported in the
/// environment. Hook output goes straight to the user's console; a non-zero
/// exit fails the plan.
fn run_hooks(ws: &Workspace, ops: &[Operation]) -> Result<(), ExecuteError> {
  for op in ops {
    let project = op.project();
    if project.run_hook.as_os_str().is_empty() || !is_mutating(op) {
      continue;
    }
    info!(project = %project.name, hook = %project.run_hook.display(), "running hook");
    println!("running hook for project {:?}", project.name);
    let status = Command::new(&project.run_hook)
      .arg(op.kind().as_str())
      .env(ROOT_ENV, ws.root())
      .current_dir(&project.path)
      .status()
      .map_err(|source| ExecuteError::HookSpawn {
        name: project.name.clone(),
        hook: project.run_hook.clone(),
        source,
      })?;
    if !status.success() {
      return Err(ExecuteError::Hook {
        name: project.name.clone(),
        hook: project.run_hook.clone(),
        status: status.to_string(),
      });
    }
  }
  Ok(())
}

fn is_mutating(op: &Operation) -> bool {
  matches!(
    op,
    Operation::Create { .. } | Operation::Move { .. } | Operation::Update { .. }
  )
}

/// Install git-level hooks and exclusions.
///
/// Created and moved checkouts get the metadata sidecar excluded from git
/// status. A create already wrote the sidecar into its staging directory,
/// but a moved checkout arrives from wherever it was before, so both kinds
/// are covered here. Projects declaring a `git_hooks` directory get it
/// mirrored into `.git/hooks` with every file forced executable.
fn apply_git_hooks(ops: &[Operation]) -> Result<(), ExecuteError> {
  for op in ops {
    let project = op.project();
    if matches!(op, Operation::Create { .. } | Operation::Move { .. }) {
      let info_dir = project.path.join(".git").join("info");
      fs::create_dir_all(&info_dir).map_err(|e| ExecuteError::io(&info_dir, e))?;
      let exclude = info_dir.join("exclude");
      fs::write(&exclude, GIT_EXCLUDE_ENTRY).map_err(|e| ExecuteError::io(&exclude, e))?;
    }

    if project.git_hooks.as_os_str().is_empty() || !is_mutating(op) {
      continue;
    }
    let hooks_dst = project.path.join(".git").join("hooks");
    for entry in WalkDir::new(&project.git_hooks) {
      let entry = entry.map_err(|e| ExecuteError::io(&project.git_hooks, e.into()))?;
      let rel = entry
        .path()
        .strip_prefix(&project.git_hooks)
        .expect("walkdir yields paths under its root");
      let dst = hooks_dst.join(rel);
      if entry.file_type().is_dir() {
        fs::create_dir_all(&dst).map_err(|e| ExecuteError::io(&dst, e))?;
      } else {
        fs::copy(entry.path(), &dst).map_err(|e| ExecuteError::io(&dst, e))?;
        // Git only picks up executable hook files.
        set_permissions(&dst, 0o755).map_err(|e| ExecuteError::io(&dst, e))?;
      }
    }
  }
  Ok(())
}

/// Reconcile the local project set with the manifest set: test the whole
/// plan, run it in order, then run hooks and install git hooks.
pub fn update_projects(ws: &Workspace, local: &Projects, remote: &Projects, gc: bool) -> Result<(), ExecuteError> {
  let ops = compute_operations(local, remote, gc);
  let mut updates = FsUpdates::default();
  for op in &ops {
    test(op, &mut updates)?;
  }
  for op in &ops {
    info!("{op}");
    run(ws, op)?;
  }
  run_hooks(ws, &ops)?;
  apply_git_hooks(&ops)
}

/// Copy the grove script out of the grove project into the root's scripts
/// directory. The grove project is routinely absent from the universe (most
/// roots do not manage grove itself); that is not an error.
fn update_self_script(ws: &Workspace, remote: &Projects) -> Result<(), ExecuteError> {
  let Ok(grove) = find_unique(remote, SELF_PROJECT_NAME) else {
    debug!("no grove project in the universe, skipping script update");
    return Ok(());
  };
  sync::on_local_master(grove, || {
    let src = grove.path.join("scripts").join(SELF_SCRIPT);
    let dst_dir = ws.scripts_dir();
    fs::create_dir_all(&dst_dir).map_err(|e| ExecuteError::io(&dst_dir, e))?;
    let dst = dst_dir.join(SELF_SCRIPT);
    fs::copy(&src, &dst).map_err(|e| ExecuteError::io(&src, e))?;
    set_permissions(&dst, 0o750).map_err(|e| ExecuteError::io(&dst, e))
  })
}

/// Bring the local tree to the state described by `remote`, then refresh the
/// grove script.
pub fn update_to(ws: &Workspace, local: &Projects, remote: &Projects, gc: bool) -> Result<(), ExecuteError> {
  update_projects(ws, local, remote, gc)?;
  update_self_script(ws, remote)
}

/// The full update pass: discover local projects, resolve the manifest graph
/// (cloning any missing manifest repositories into a scratch directory),
/// reconcile, and record an update-history snapshot. The scratch directory
/// lives until the very end and is removed on success and on error alike.
pub fn update_universe(ws: &Workspace, gc: bool) -> Result<(), UpdateError> {
  let mode = if gc { ScanMode::Full } else { ScanMode::Fast };
  let local = scan::local_projects(ws, mode)?;
  let (remote, _tools, scratch) = loader::load_updated_manifest(ws, &ws.manifest_file(), local.clone())?;
  update_to(ws, &local, &remote, gc)?;
  snapshot::write_update_history_snapshot(ws, "")?;
  drop(scratch);
  Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
  Ok(())
}
