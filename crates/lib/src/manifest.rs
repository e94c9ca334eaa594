//! The manifest codec.
//!
//! A manifest is a TOML document describing remote imports, local imports,
//! projects, and tools, plus an optional snapshot path:
//!
//! ```toml
//! snapshot_path = "snap"
//!
//! [[imports.remote]]
//! manifest = "default"
//! name = "manifest"
//! remote = "https://example.com/manifest"
//!
//! [[imports.local]]
//! file = "common"
//!
//! [[projects]]
//! name = "base"
//! path = "src/base"
//! remote = "https://example.com/base"
//!
//! [[tools]]
//! name = "grove"
//! package = "tools/grove"
//! ```
//!
//! Parsing fills defaults (`remote_branch = "master"`, `revision = "HEAD"`,
//! `tool.data = "data"`); serializing unfills them again and elides empty
//! containers, keeping the on-disk form minimal. Output is deterministic, so
//! files written by grove round-trip byte-stably.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::CYCLE_KEY_SEPARATOR;
use crate::project::{Project, ProjectError, ProjectKey, Tool};
use crate::util::atomic::write_atomic;
use crate::util::fnv::fnv1a64;

/// Errors from parsing, validating, or writing manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path:?}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid manifest {path:?}: {source}")]
  Load {
    path: PathBuf,
    #[source]
    source: Box<ManifestError>,
  },

  #[error("manifest parse error: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("manifest serialize error: {0}")]
  Serialize(#[from] toml::ser::Error),

  #[error("failed to write manifest {path:?}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("import must specify both manifest and remote")]
  ImportMissingField,

  #[error("local import must specify file")]
  LocalImportMissingFile,

  #[error(transparent)]
  Project(#[from] ProjectError),
}

/// A reference to a manifest file inside a remote repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
  /// Manifest file to load from the remote repository. Required.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub manifest: String,

  /// Name of the manifest repository's project, used for its key.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,

  /// Remote URL of the manifest repository. Required.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub remote: String,

  /// Remote branch to track. Defaults to `master`.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub remote_branch: String,

  /// Prefix applied to the path and name of every project carried in
  /// through this import.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub root: String,
}

impl Import {
  fn fill_defaults(&mut self) -> Result<(), ManifestError> {
    if self.remote_branch.is_empty() {
      self.remote_branch = "master".to_string();
    }
    self.validate()
  }

  fn unfill_defaults(&mut self) -> Result<(), ManifestError> {
    if self.remote_branch == "master" {
      self.remote_branch.clear();
    }
    self.validate()
  }

  fn validate(&self) -> Result<(), ManifestError> {
    if self.manifest.is_empty() || self.remote.is_empty() {
      return Err(ManifestError::ImportMissingField);
    }
    Ok(())
  }

  /// The key of the imported manifest project.
  pub fn project_key(&self) -> ProjectKey {
    ProjectKey::new(&self.name, &self.remote)
  }

  /// Key used for remote-import cycle detection. Remote and manifest are
  /// joined by a separator that cannot occur in URLs, so distinct
  /// `(remote, manifest)` pairs never collide.
  pub fn cycle_key(&self) -> String {
    format!("{}{}{}", self.remote, CYCLE_KEY_SEPARATOR, self.manifest)
  }

  /// Directory name for a scratch clone of the manifest repository: the
  /// import name suffixed with the FNV-1a 64 hash of the project key.
  pub fn scratch_dir_name(&self) -> String {
    format!("{}_{:x}", self.name, fnv1a64(self.project_key().as_str().as_bytes()))
  }

  /// A synthetic project representing the manifest repository at `path`.
  pub fn to_project(&self, path: PathBuf) -> Result<Project, ManifestError> {
    let mut project = Project {
      name: self.name.clone(),
      path,
      remote: self.remote.clone(),
      remote_branch: self.remote_branch.clone(),
      ..Project::default()
    };
    project.fill_defaults()?;
    Ok(project)
  }
}

/// A file-path include of another manifest on the same filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalImport {
  /// Manifest file to include, resolved relative to the including file.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub file: String,
}

impl LocalImport {
  fn validate(&self) -> Result<(), ManifestError> {
    if self.file.is_empty() {
      return Err(ManifestError::LocalImportMissingFile);
    }
    Ok(())
  }
}

/// The two import sequences of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Imports {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub remote: Vec<Import>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub local: Vec<LocalImport>,
}

impl Imports {
  pub fn is_empty(&self) -> bool {
    self.remote.is_empty() && self.local.is_empty()
  }
}

/// A parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
  /// Relative path to the snapshot file from the root. Only set when a
  /// snapshot is created.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub snapshot_path: String,

  #[serde(default, skip_serializing_if = "Imports::is_empty")]
  pub imports: Imports,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub projects: Vec<Project>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tools: Vec<Tool>,
}

impl Manifest {
  /// Parse a manifest from TOML, validating each element and filling
  /// defaults.
  pub fn from_toml(data: &str) -> Result<Self, ManifestError> {
    let mut manifest: Manifest = toml::from_str(data)?;
    manifest.fill_defaults()?;
    Ok(manifest)
  }

  /// Parse the manifest in `path`.
  pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
    let data = fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml(&data).map_err(|source| ManifestError::Load {
      path: path.to_path_buf(),
      source: Box::new(source),
    })
  }

  /// Serialize to TOML with defaults unfilled and empty containers elided.
  pub fn to_toml(&self) -> Result<String, ManifestError> {
    let mut manifest = self.clone();
    manifest.unfill_defaults()?;
    Ok(toml::to_string(&manifest)?)
  }

  /// Write the manifest to `path` atomically, with all project paths
  /// relativized to `root` so the root directory stays movable.
  pub fn to_file(&self, root: &Path, path: &Path) -> Result<(), ManifestError> {
    let mut manifest = self.clone();
    for project in &mut manifest.projects {
      project.relativize(root)?;
    }
    let data = manifest.to_toml()?;
    write_atomic(path, data.as_bytes()).map_err(|source| ManifestError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  fn fill_defaults(&mut self) -> Result<(), ManifestError> {
    for import in &mut self.imports.remote {
      import.fill_defaults()?;
    }
    for local in &self.imports.local {
      local.validate()?;
    }
    for project in &mut self.projects {
      project.fill_defaults()?;
    }
    for tool in &mut self.tools {
      tool.fill_defaults();
    }
    Ok(())
  }

  fn unfill_defaults(&mut self) -> Result<(), ManifestError> {
    for import in &mut self.imports.remote {
      import.unfill_defaults()?;
    }
    for local in &self.imports.local {
      local.validate()?;
    }
    for project in &mut self.projects {
      project.unfill_defaults()?;
    }
    for tool in &mut self.tools {
      tool.unfill_defaults();
    }
    Ok(())
  }
}
