//! The project and tool model, plus the on-disk metadata sidecar.
//!
//! A project is a git checkout managed by grove. The universe of projects is
//! keyed by `(name, remote)`; the key is the two fields joined by the
//! reserved `=` separator, which is why project names must not contain it.
//!
//! Every managed checkout carries a metadata sidecar at
//! `<path>/.grove/metadata` holding the serialized project record with its
//! paths relativized to the workspace root. The sidecar is what the scanner
//! uses to recognize a directory as managed.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{DEFAULT_TOOL_PROJECT, KEY_SEPARATOR, PROJECT_META_DIR, PROJECT_META_FILE};
use crate::git::Git;
use crate::util::atomic::write_atomic;

/// Errors from the project model and metadata sidecar.
#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("failed to read project metadata {path:?}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid project metadata {path:?}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("failed to serialize project {name}: {source}")]
  Serialize {
    name: String,
    #[source]
    source: toml::ser::Error,
  },

  #[error("failed to write project metadata {path:?}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("project name cannot contain \"=\": {name:?}")]
  NameContainsSeparator { name: String },

  #[error("path {path:?} is not under the workspace root {root:?}")]
  NotUnderRoot { path: PathBuf, root: PathBuf },

  #[error("no project found with key or name {query:?}")]
  NotFound { query: String },

  #[error("multiple projects found with name {query:?}")]
  Ambiguous { query: String },
}

/// The unique key of a project across all manifests: name and remote joined
/// by the reserved separator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectKey(String);

impl ProjectKey {
  pub fn new(name: &str, remote: &str) -> Self {
    Self(format!("{name}{KEY_SEPARATOR}{remote}"))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ProjectKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// The universe of projects, keyed for deterministic iteration.
pub type Projects = BTreeMap<ProjectKey, Project>;

/// Tools by name.
pub type Tools = BTreeMap<String, Tool>;

fn path_is_empty(path: &PathBuf) -> bool {
  path.as_os_str().is_empty()
}

/// A managed git checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
  /// Project name. Must not contain the key separator.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,

  /// On-disk location. Relative to the root in manifests and sidecars;
  /// absolute once loaded.
  #[serde(default, skip_serializing_if = "path_is_empty")]
  pub path: PathBuf,

  /// The git remote URL.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub remote: String,

  /// Remote branch to track. The local branch grove maintains is always
  /// `master`; this only selects what `master` is reset to. Defaults to
  /// `master`.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub remote_branch: String,

  /// Revision to advance to on update. When set to anything but `HEAD` it
  /// takes precedence over `remote_branch`. Defaults to `HEAD`.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub revision: String,

  /// Gerrit host for this project's changelists, if any.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub gerrit_host: String,

  /// Directory of git hooks installed into the checkout on create, move,
  /// and update.
  #[serde(default, skip_serializing_if = "path_is_empty")]
  pub git_hooks: PathBuf,

  /// Executable run after create, move, and update operations, with the
  /// operation kind as its argument.
  #[serde(default, skip_serializing_if = "path_is_empty")]
  pub run_hook: PathBuf,
}

impl Project {
  /// The unique key of this project.
  pub fn key(&self) -> ProjectKey {
    ProjectKey::new(&self.name, &self.remote)
  }

  pub(crate) fn fill_defaults(&mut self) -> Result<(), ProjectError> {
    if self.remote_branch.is_empty() {
      self.remote_branch = "master".to_string();
    }
    if self.revision.is_empty() {
      self.revision = "HEAD".to_string();
    }
    self.validate()
  }

  pub(crate) fn unfill_defaults(&mut self) -> Result<(), ProjectError> {
    if self.remote_branch == "master" {
      self.remote_branch.clear();
    }
    if self.revision == "HEAD" {
      self.revision.clear();
    }
    self.validate()
  }

  pub(crate) fn validate(&self) -> Result<(), ProjectError> {
    if self.name.contains(KEY_SEPARATOR) {
      return Err(ProjectError::NameContainsSeparator {
        name: self.name.clone(),
      });
    }
    Ok(())
  }

  /// Make `path`, `git_hooks` and `run_hook` absolute by prepending `base`
  /// when they are relative.
  pub fn absolutize(&mut self, base: &Path) {
    for path in [&mut self.path, &mut self.git_hooks, &mut self.run_hook] {
      if !path.as_os_str().is_empty() && path.is_relative() {
        *path = base.join(&path);
      }
    }
  }

  /// Make `path`, `git_hooks` and `run_hook` relative to `base`. The inverse
  /// of [`Project::absolutize`], used before persisting so the whole root
  /// directory stays movable.
  pub fn relativize(&mut self, base: &Path) -> Result<(), ProjectError> {
    for path in [&mut self.path, &mut self.git_hooks, &mut self.run_hook] {
      if path.is_absolute() {
        *path = path
          .strip_prefix(base)
          .map_err(|_| ProjectError::NotUnderRoot {
            path: path.clone(),
            root: base.to_path_buf(),
          })?
          .to_path_buf();
      }
    }
    Ok(())
  }

  /// Parse a single serialized project from `path`, fill defaults, and
  /// absolutize against `root`.
  pub fn from_file(root: &Path, path: &Path) -> Result<Self, ProjectError> {
    let data = fs::read_to_string(path).map_err(|source| ProjectError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut project: Project = toml::from_str(&data).map_err(|source| ProjectError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    project.fill_defaults()?;
    project.absolutize(root);
    Ok(project)
  }

  /// Serialize this project to `path` with defaults unfilled and paths
  /// relativized to `root`.
  pub fn to_file(&self, root: &Path, path: &Path) -> Result<(), ProjectError> {
    let mut project = self.clone();
    project.unfill_defaults()?;
    project.relativize(root)?;
    let data = toml::to_string(&project).map_err(|source| ProjectError::Serialize {
      name: self.name.clone(),
      source,
    })?;
    write_atomic(path, data.as_bytes()).map_err(|source| ProjectError::Write {
      path: path.to_path_buf(),
      source,
    })
  }
}

/// A named build target extracted from some project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
  /// Name of the tool binary.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,

  /// Logical build path of the tool.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub package: String,

  /// Key hint for the project containing the tool. Defaults to the grove
  /// project itself.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub project: String,

  /// Relative directory for tool configuration data, decoupled from the
  /// tool so the data can move without the tool changing. Defaults to
  /// `data`.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub data: String,
}

impl Tool {
  pub(crate) fn fill_defaults(&mut self) {
    if self.data.is_empty() {
      self.data = "data".to_string();
    }
    if self.project.is_empty() {
      self.project = DEFAULT_TOOL_PROJECT.to_string();
    }
  }

  pub(crate) fn unfill_defaults(&mut self) {
    if self.data == "data" {
      self.data.clear();
    }
    // The project hint is deliberately not unfilled; it is not optional
    // once resolved.
  }
}

/// The metadata directory marking `dir` as a managed checkout.
pub fn metadata_dir(dir: &Path) -> PathBuf {
  dir.join(PROJECT_META_DIR)
}

/// The metadata file inside [`metadata_dir`].
pub fn metadata_file(dir: &Path) -> PathBuf {
  metadata_dir(dir).join(PROJECT_META_FILE)
}

/// Whether `dir` hosts a metadata sidecar.
pub fn is_managed_dir(dir: &Path) -> bool {
  metadata_dir(dir).is_dir()
}

/// Read the project record stored in the sidecar of the checkout at `dir`.
pub fn project_at_path(root: &Path, dir: &Path) -> Result<Project, ProjectError> {
  Project::from_file(root, &metadata_file(dir))
}

/// (Re)write the metadata sidecar for `project` inside `dir`. `dir` is
/// usually `project.path`, except during create when the checkout is still
/// staged in a scratch directory.
pub fn write_metadata(root: &Path, project: &Project, dir: &Path) -> Result<(), ProjectError> {
  project.to_file(root, &metadata_file(dir))
}

/// Discover the key of the project enclosing `dir`, by asking git for the
/// checkout's top level and reading the sidecar there. Returns `None` when
/// `dir` is not inside a managed checkout.
pub fn current_project_key(root: &Path, dir: &Path) -> Result<Option<ProjectKey>, ProjectError> {
  let Ok(top_level) = Git::new(dir).top_level() else {
    return Ok(None);
  };
  if !is_managed_dir(&top_level) {
    return Ok(None);
  }
  Ok(Some(project_at_path(root, &top_level)?.key()))
}

/// All projects matching `query`, which may be a full key or a bare name.
pub fn find<'a>(projects: &'a Projects, query: &str) -> Vec<&'a Project> {
  if let Some(project) = projects.get(&ProjectKey(query.to_string())) {
    return vec![project];
  }
  projects.values().filter(|p| p.name == query).collect()
}

/// The single project matching `query`, or an error when none or several
/// match.
pub fn find_unique<'a>(projects: &'a Projects, query: &str) -> Result<&'a Project, ProjectError> {
  let matches = find(projects, query);
  match matches.as_slice() {
    [] => Err(ProjectError::NotFound {
      query: query.to_string(),
    }),
    [only] => Ok(only),
    _ => Err(ProjectError::Ambiguous {
      query: query.to_string(),
    }),
  }
}
