//! Update-history snapshots.
//!
//! After every successful update the state of the universe is serialized as
//! a regular manifest under `.grove_root/update_history/<timestamp>`, and
//! two symlinks are rotated: `second-latest` takes over the old `latest`
//! target, then `latest` is repointed at the new file. Both mutations go
//! through an unlink-then-symlink sequence and the snapshot file itself is
//! written atomically, so the `latest` link never points at a partial file.
//!
//! Snapshot manifests must not contain remote imports: loading one happens
//! with an empty local project set (local projects would be needed to load
//! the snapshot that defines the local projects), so any remote import in a
//! snapshot fails resolution.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::execute::{self, UpdateError};
use crate::loader::{self, LoadError};
use crate::manifest::{Manifest, ManifestError};
use crate::project::{Projects, Tools};
use crate::scan::{self, ScanError, ScanMode};
use crate::workspace::Workspace;

#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error(transparent)]
  Scan(#[from] ScanError),

  #[error(transparent)]
  Load(#[from] LoadError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error("filesystem operation on {path:?} failed: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to format snapshot timestamp: {0}")]
  Timestamp(#[from] time::error::Format),
}

impl SnapshotError {
  fn io(path: &Path, source: io::Error) -> Self {
    SnapshotError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Serialize the current state of all local projects (on their `master`
/// branches) plus the tools of the current manifest into `file`.
///
/// `snapshot_path`, recorded inside the file, is where the snapshot is meant
/// to live relative to the root; when empty, `file` itself is used.
pub fn create_snapshot(ws: &Workspace, file: &Path, snapshot_path: &str) -> Result<(), SnapshotError> {
  let recorded = if snapshot_path.is_empty() {
    file.to_path_buf()
  } else {
    PathBuf::from(snapshot_path)
  };
  let recorded = relative_to_root(ws, &recorded);

  // A full scan, not the fast path: during an update newly created projects
  // are not in the previous snapshot yet.
  let local_projects = scan::local_projects(ws, ScanMode::Full)?;
  let (_, tools) = loader::load_manifest_file(ws, &ws.manifest_file(), local_projects.clone())?;

  let manifest = Manifest {
    snapshot_path: recorded.to_string_lossy().into_owned(),
    projects: local_projects.into_values().collect(),
    tools: tools.into_values().collect(),
    ..Manifest::default()
  };
  manifest.to_file(ws.root(), file)?;
  Ok(())
}

/// A clean, symlink-free path relative to the root, for recording inside
/// snapshot files. Falls back to the path as given when it cannot be
/// resolved or does not live under the root.
fn relative_to_root(ws: &Workspace, path: &Path) -> PathBuf {
  let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
  let root = fs::canonicalize(ws.root()).unwrap_or_else(|_| ws.root().to_path_buf());
  if let Ok(rel) = resolved.strip_prefix(&root) {
    return rel.to_path_buf();
  }
  resolved
}

/// Write a timestamped snapshot into the update-history directory and
/// advance the `latest` and `second-latest` symlinks. Returns the snapshot
/// file path.
pub fn write_update_history_snapshot(ws: &Workspace, snapshot_path: &str) -> Result<PathBuf, SnapshotError> {
  let dir = ws.update_history_dir();
  fs::create_dir_all(&dir).map_err(|e| SnapshotError::io(&dir, e))?;
  let stamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
  let file = dir.join(stamp);
  create_snapshot(ws, &file, snapshot_path)?;

  let latest = ws.latest_link();
  let second_latest = ws.second_latest_link();

  // Hand the old latest target over to second-latest before repointing.
  if latest.is_file() {
    let old_target = fs::read_link(&latest).map_err(|e| SnapshotError::io(&latest, e))?;
    replace_symlink(&old_target, &second_latest)?;
  }

  // Keep the link target relative, so the whole update-history directory
  // can be moved or copied.
  let target = file.strip_prefix(&dir).map(Path::to_path_buf).unwrap_or(file.clone());
  replace_symlink(&target, &latest)?;

  info!(file = %file.display(), "wrote update-history snapshot");
  Ok(file)
}

fn replace_symlink(target: &Path, link: &Path) -> Result<(), SnapshotError> {
  match fs::remove_file(link) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(SnapshotError::io(link, e)),
  }
  symlink(target, link).map_err(|e| SnapshotError::io(link, e))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_file(target, link)
}

/// Load a snapshot manifest. Snapshots resolve with an empty local project
/// set, so any remote import in them is an error.
pub fn load_snapshot_file(ws: &Workspace, file: &Path) -> Result<(Projects, Tools), LoadError> {
  loader::load_manifest_file(ws, file, Projects::new())
}

/// Reconcile the tree to the state recorded in `snapshot`, then record the
/// checkout itself in the update history.
pub fn checkout_snapshot(ws: &Workspace, snapshot: &Path, gc: bool) -> Result<(), UpdateError> {
  let mode = if gc { ScanMode::Full } else { ScanMode::Fast };
  let local_projects = scan::local_projects(ws, mode)?;
  let (remote_projects, _tools) = load_snapshot_file(ws, snapshot)?;
  execute::update_to(ws, &local_projects, &remote_projects, gc)?;
  write_update_history_snapshot(ws, &snapshot.to_string_lossy())?;
  Ok(())
}
