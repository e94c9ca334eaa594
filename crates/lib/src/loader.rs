//! Recursive manifest resolution.
//!
//! A manifest can pull in other manifests two ways: *local imports* are
//! file-path includes resolved against the importing file, and *remote
//! imports* name a manifest file inside another repository. Remote imports
//! are resolved through the local project set; with updating enabled,
//! manifest repositories that do not exist locally yet are cloned
//! speculatively into a scratch directory, which the caller holds open until
//! the whole update pass finishes and which is removed on any outer error.
//!
//! Cycle detection runs over two namespaces at once, with a single stack of
//! `(file, cycle_key)` pairs. Local include loops can only be caught by
//! file path, because local imports have no key; remote loops can only be
//! caught by `(remote, manifest)` key, because the same remote manifest may
//! be reached through different file paths (scratch clones). Pushing both
//! onto one stack before each recursion catches either kind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

use crate::execute::sync::{fetch_project, on_local_master, reset_to_pinned};
use crate::git::{self, GitError};
use crate::manifest::{Manifest, ManifestError};
use crate::project::{Project, ProjectError, ProjectKey, Projects, Tools};
use crate::workspace::Workspace;

#[derive(Debug, Error)]
pub enum LoadError {
  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Project(#[from] ProjectError),

  #[error(transparent)]
  Git(#[from] GitError),

  #[error("failed to prepare scratch directory {path:?}: {source}")]
  Scratch {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("import cycle detected in local manifest files: {trace}")]
  FileCycle { trace: String },

  #[error("import cycle detected in remote manifest imports: {trace}")]
  RemoteCycle { trace: String },

  #[error("cannot resolve remote import: project {key} not found locally")]
  UnresolvableImport { key: ProjectKey },

  #[error("duplicate project {key} found in {file:?}")]
  DuplicateProject { key: ProjectKey, file: PathBuf },

  #[error("duplicate tool {name:?} found in {file:?}")]
  DuplicateTool { name: String, file: PathBuf },
}

#[derive(Debug)]
struct CycleInfo {
  file: PathBuf,
  key: String,
}

/// Resolve the manifest graph rooted at `file` without updating anything.
/// Remote imports resolve only through `local_projects`; with an empty set
/// every remote import fails, which is exactly the contract snapshot
/// loading relies on.
pub fn load_manifest_file(ws: &Workspace, file: &Path, local_projects: Projects) -> Result<(Projects, Tools), LoadError> {
  let mut loader = Loader::new(local_projects, false);
  loader.load_no_cycles(ws, "", file, String::new())?;
  Ok((loader.projects, loader.tools))
}

/// Resolve the manifest graph rooted at `file`, fetching manifest
/// repositories and cloning missing ones into a scratch directory. The
/// returned guard keeps the scratch clones alive; dropping it removes them.
pub fn load_updated_manifest(
  ws: &Workspace,
  file: &Path,
  local_projects: Projects,
) -> Result<(Projects, Tools, Option<TempDir>), LoadError> {
  let mut loader = Loader::new(local_projects, true);
  loader.load_no_cycles(ws, "", file, String::new())?;
  Ok((loader.projects, loader.tools, loader.scratch))
}

struct Loader {
  projects: Projects,
  tools: Tools,
  local_projects: Projects,
  update: bool,
  cycle_stack: Vec<CycleInfo>,
  scratch: Option<TempDir>,
}

impl Loader {
  fn new(local_projects: Projects, update: bool) -> Self {
    Self {
      projects: Projects::new(),
      tools: Tools::new(),
      local_projects,
      update,
      cycle_stack: Vec::new(),
      scratch: None,
    }
  }

  fn load_no_cycles(&mut self, ws: &Workspace, root: &str, file: &Path, cycle_key: String) -> Result<(), LoadError> {
    for info in &self.cycle_stack {
      if info.file == file {
        return Err(LoadError::FileCycle {
          trace: self.trace(file, &cycle_key),
        });
      }
      if !cycle_key.is_empty() && info.key == cycle_key {
        return Err(LoadError::RemoteCycle {
          trace: self.trace(file, &cycle_key),
        });
      }
    }
    self.cycle_stack.push(CycleInfo {
      file: file.to_path_buf(),
      key: cycle_key,
    });
    let result = self.load(ws, root, file);
    self.cycle_stack.pop();
    result
  }

  fn trace(&self, file: &Path, key: &str) -> String {
    self
      .cycle_stack
      .iter()
      .map(|info| format!("({}, {})", info.file.display(), info.key))
      .chain([format!("({}, {})", file.display(), key)])
      .collect::<Vec<_>>()
      .join(" -> ")
  }

  fn load(&mut self, ws: &Workspace, root: &str, file: &Path) -> Result<(), LoadError> {
    debug!(file = %file.display(), root, "loading manifest");
    let manifest = Manifest::from_file(file)?;

    for import in &manifest.imports.remote {
      let mut import = import.clone();
      let next_root = join_prefix(root, &import.root);
      import.name = join_prefix(&next_root, &import.name);
      let key = import.project_key();

      let mut project = match self.local_projects.get(&key) {
        Some(project) => project.clone(),
        None if !self.update => return Err(LoadError::UnresolvableImport { key }),
        None => {
          // The manifest repository does not exist locally yet. Clone it
          // into the scratch directory and adopt it as a local project for
          // the rest of this pass.
          let scratch = self.ensure_scratch()?;
          let path = scratch.join(import.scratch_dir_name());
          fs::create_dir_all(&path).map_err(|source| LoadError::Scratch {
            path: path.clone(),
            source,
          })?;
          info!(remote = %import.remote, path = %path.display(), "cloning manifest repository");
          git::clone(&import.remote, &path)?;
          let project = import.to_project(path)?;
          self.local_projects.insert(key, project.clone());
          project
        }
      };

      project.revision = "HEAD".to_string();
      project.remote_branch = import.remote_branch.clone();
      let next_file = project.path.join(&import.manifest);
      self.reset_and_load(ws, &next_root, &next_file, import.cycle_key(), &project)?;
    }

    for local in &manifest.imports.local {
      let dir = file.parent().unwrap_or_else(|| Path::new("."));
      let next_file = dir.join(&local.file);
      self.load_no_cycles(ws, root, &next_file, String::new())?;
    }

    for project in &manifest.projects {
      let mut project = project.clone();
      let base = if root.is_empty() {
        ws.root().to_path_buf()
      } else {
        ws.root().join(root)
      };
      project.absolutize(&base);
      project.name = join_prefix(root, &project.name);
      let key = project.key();
      match self.projects.get(&key) {
        Some(existing) if *existing != project => {
          return Err(LoadError::DuplicateProject {
            key,
            file: file.to_path_buf(),
          });
        }
        Some(_) => {}
        None => {
          self.projects.insert(key, project);
        }
      }
    }

    for tool in &manifest.tools {
      match self.tools.get(&tool.name) {
        Some(existing) if existing != tool => {
          return Err(LoadError::DuplicateTool {
            name: tool.name.clone(),
            file: file.to_path_buf(),
          });
        }
        Some(_) => {}
        None => {
          self.tools.insert(tool.name.clone(), tool.clone());
        }
      }
    }

    Ok(())
  }

  /// Reset the manifest repository to the import's branch and load the next
  /// file out of it. With updating enabled the remote is fetched first;
  /// either way the local master is reset to the pinned state, with the
  /// user's branch and stash restored afterwards.
  fn reset_and_load(
    &mut self,
    ws: &Workspace,
    root: &str,
    file: &Path,
    cycle_key: String,
    project: &Project,
  ) -> Result<(), LoadError> {
    let update = self.update;
    on_local_master(project, || {
      if update {
        fetch_project(project)?;
      }
      reset_to_pinned(project)?;
      self.load_no_cycles(ws, root, file, cycle_key)
    })
  }

  fn ensure_scratch(&mut self) -> Result<PathBuf, LoadError> {
    if self.scratch.is_none() {
      let dir = tempfile::Builder::new()
        .prefix("grove-load-")
        .tempdir()
        .map_err(|source| LoadError::Scratch {
          path: std::env::temp_dir(),
          source,
        })?;
      self.scratch = Some(dir);
    }
    Ok(self.scratch.as_ref().expect("scratch just created").path().to_path_buf())
  }
}

/// Join two slash-separated prefixes, treating empty sides as absent.
fn join_prefix(prefix: &str, rest: &str) -> String {
  if prefix.is_empty() {
    rest.to_string()
  } else if rest.is_empty() {
    prefix.to_string()
  } else {
    format!("{prefix}/{rest}")
  }
}
