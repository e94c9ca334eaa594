//! Discovery of projects already present under the root.
//!
//! The fast path trusts the latest update-history snapshot: if every project
//! it lists still hosts a metadata sidecar, the snapshot is the local set
//! and only the revisions need refreshing. Otherwise (or when a full scan is
//! requested, as garbage collection does) the whole root is walked, skipping
//! hidden directories, and every directory carrying a sidecar is collected.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::git::{Git, GitError};
use crate::loader::{self, LoadError};
use crate::project::{self, ProjectError, ProjectKey, Projects};
use crate::workspace::Workspace;

/// Whether to trust the latest snapshot or walk the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
  Fast,
  Full,
}

#[derive(Debug, Error)]
pub enum ScanError {
  #[error(transparent)]
  Project(#[from] ProjectError),

  #[error(transparent)]
  Git(#[from] GitError),

  #[error("failed to load latest snapshot: {0}")]
  Snapshot(#[from] Box<LoadError>),

  #[error("failed to walk {path:?}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("name conflict: both {existing:?} and {found:?} contain project with key {key}")]
  KeyConflict {
    key: ProjectKey,
    existing: PathBuf,
    found: PathBuf,
  },

  #[error("project {name:?} has path {declared:?} but was found in {found:?}")]
  PathMismatch {
    name: String,
    declared: PathBuf,
    found: PathBuf,
  },
}

/// Projects on the local filesystem.
///
/// In [`ScanMode::Fast`], when the latest snapshot exists and all of its
/// projects are still on disk, the snapshot's set is returned. Snapshots
/// must not contain remote imports (loading one with an empty local set
/// would fail, and rightly so: local projects would be needed to load the
/// snapshot that defines the local projects). In [`ScanMode::Full`], or
/// when fast verification fails, the root is walked instead.
///
/// Either way, every returned project has its revision set to the current
/// commit of its local `master` branch.
pub fn local_projects(ws: &Workspace, mode: ScanMode) -> Result<Projects, ScanError> {
  let latest = ws.latest_link();
  if mode == ScanMode::Fast && latest.is_file() {
    let (snapshot_projects, _tools) =
      loader::load_manifest_file(ws, &latest, Projects::new()).map_err(Box::new)?;
    if projects_exist_locally(&snapshot_projects) {
      debug!(count = snapshot_projects.len(), "fast scan via latest snapshot");
      return set_project_revisions(snapshot_projects);
    }
    info!("snapshot projects missing on disk, falling back to full scan");
  }

  let mut projects = Projects::new();
  find_local_projects(ws, &mut projects)?;
  debug!(count = projects.len(), "scanned filesystem for projects");
  set_project_revisions(projects)
}

fn projects_exist_locally(projects: &Projects) -> bool {
  projects.values().all(|p| project::is_managed_dir(&p.path))
}

fn set_project_revisions(mut projects: Projects) -> Result<Projects, ScanError> {
  for project in projects.values_mut() {
    project.revision = Git::new(&project.path).current_revision("master")?;
  }
  Ok(projects)
}

fn find_local_projects(ws: &Workspace, projects: &mut Projects) -> Result<(), ScanError> {
  let root = ws.root();
  let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
    // Skip hidden directories, including the root metadata directory and
    // every checkout's own sidecar and .git. The root itself is always
    // entered, whatever its name.
    entry.depth() == 0
      || !entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
  });

  for entry in walker {
    let entry = entry.map_err(|err| ScanError::Walk {
      path: err.path().map(PathBuf::from).unwrap_or_else(|| root.to_path_buf()),
      source: err.into(),
    })?;
    if !entry.file_type().is_dir() || !project::is_managed_dir(entry.path()) {
      continue;
    }
    let found = entry.path().to_path_buf();
    let project = project::project_at_path(root, &found)?;
    if project.path != found {
      return Err(ScanError::PathMismatch {
        name: project.name.clone(),
        declared: project.path.clone(),
        found,
      });
    }
    if let Some(existing) = projects.get(&project.key()) {
      return Err(ScanError::KeyConflict {
        key: project.key(),
        existing: existing.path.clone(),
        found,
      });
    }
    projects.insert(project.key(), project);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::project::{Project, write_metadata};
  use crate::util::testutil;
  use std::fs;
  use tempfile::TempDir;

  fn managed_project(ws: &Workspace, name: &str, rel_path: &str) -> Project {
    let path = ws.root().join(rel_path);
    testutil::init_repo(&path);
    let mut project = Project {
      name: name.to_string(),
      path: path.clone(),
      remote: format!("https://example.com/{name}"),
      ..Project::default()
    };
    project.fill_defaults().unwrap();
    write_metadata(ws.root(), &project, &path).unwrap();
    project
  }

  #[test]
  fn full_scan_finds_nested_projects() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path().canonicalize().unwrap());
    let outer = managed_project(&ws, "outer", "src/outer");
    let inner = managed_project(&ws, "inner", "src/outer/third_party/inner");

    let projects = local_projects(&ws, ScanMode::Full).unwrap();
    assert_eq!(projects.len(), 2);
    assert!(projects.contains_key(&outer.key()));
    assert!(projects.contains_key(&inner.key()));
  }

  #[test]
  fn scan_fills_revisions_from_master() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path().canonicalize().unwrap());
    let project = managed_project(&ws, "p", "src/p");
    let rev = testutil::commit_file(&project.path, "file", "contents");

    let projects = local_projects(&ws, ScanMode::Full).unwrap();
    assert_eq!(projects[&project.key()].revision, rev);
  }

  #[test]
  fn hidden_directories_are_skipped() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path().canonicalize().unwrap());
    managed_project(&ws, "hidden", ".hidden/p");

    let projects = local_projects(&ws, ScanMode::Full).unwrap();
    assert!(projects.is_empty());
  }

  #[test]
  fn key_conflict_is_rejected() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path().canonicalize().unwrap());
    let first = managed_project(&ws, "dup", "src/a");
    // A second checkout claiming the same name and remote.
    let mut clash = first.clone();
    clash.path = ws.root().join("src/b");
    testutil::init_repo(&clash.path);
    write_metadata(ws.root(), &clash, &clash.path).unwrap();
    // Rewrite the sidecar so the declared path matches where it sits.
    assert!(project::is_managed_dir(&clash.path));

    let err = local_projects(&ws, ScanMode::Full).unwrap_err();
    assert!(matches!(err, ScanError::KeyConflict { .. }));
  }

  #[test]
  fn sidecar_with_wrong_path_is_rejected() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path().canonicalize().unwrap());
    let path = ws.root().join("src/actual");
    testutil::init_repo(&path);
    let mut project = Project {
      name: "p".to_string(),
      path: ws.root().join("src/declared"),
      remote: "https://example.com/p".to_string(),
      ..Project::default()
    };
    project.fill_defaults().unwrap();
    write_metadata(ws.root(), &project, &path).unwrap();

    let err = local_projects(&ws, ScanMode::Full).unwrap_err();
    assert!(matches!(err, ScanError::PathMismatch { .. }));
  }

  #[test]
  fn empty_root_scans_to_nothing() {
    let temp = TempDir::new().unwrap();
    let ws = Workspace::new(temp.path().canonicalize().unwrap());
    fs::create_dir_all(ws.root().join("src/empty")).unwrap();
    let projects = local_projects(&ws, ScanMode::Full).unwrap();
    assert!(projects.is_empty());
  }
}
