//! The workspace value anchoring all paths.
//!
//! A [`Workspace`] is constructed explicitly by the caller (typically the CLI
//! from `--root` or `$GROVE_ROOT`) and passed down; no process-global state
//! and no process-wide working-directory changes are involved.

use std::env;
use std::path::{Path, PathBuf};

use crate::consts::{
  LATEST_LINK, MANIFEST_FILE, ROOT_ENV, ROOT_META_DIR, SCRIPTS_DIR, SECOND_LATEST_LINK, UPDATE_HISTORY_DIR,
};

/// A grove workspace, identified by its root directory.
#[derive(Debug, Clone)]
pub struct Workspace {
  root: PathBuf,
}

impl Workspace {
  /// Create a workspace rooted at `root`. The path should be absolute; all
  /// project paths are derived from it by joining.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Create a workspace from the `GROVE_ROOT` environment variable.
  pub fn from_env() -> Option<Self> {
    env::var_os(ROOT_ENV).map(|root| Self::new(PathBuf::from(root)))
  }

  /// The workspace root directory.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// The directory holding grove's own state under the root.
  pub fn root_meta_dir(&self) -> PathBuf {
    self.root.join(ROOT_META_DIR)
  }

  /// The top-level manifest file.
  pub fn manifest_file(&self) -> PathBuf {
    self.root.join(MANIFEST_FILE)
  }

  /// The update-history directory.
  pub fn update_history_dir(&self) -> PathBuf {
    self.root_meta_dir().join(UPDATE_HISTORY_DIR)
  }

  /// Symlink to the most recent update-history snapshot.
  pub fn latest_link(&self) -> PathBuf {
    self.update_history_dir().join(LATEST_LINK)
  }

  /// Symlink to the snapshot before the most recent one.
  pub fn second_latest_link(&self) -> PathBuf {
    self.update_history_dir().join(SECOND_LATEST_LINK)
  }

  /// The scripts directory under the root metadata directory.
  pub fn scripts_dir(&self) -> PathBuf {
    self.root_meta_dir().join(SCRIPTS_DIR)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn paths_derive_from_root() {
    let ws = Workspace::new("/work/fuchsia");
    assert_eq!(ws.root(), Path::new("/work/fuchsia"));
    assert_eq!(ws.manifest_file(), Path::new("/work/fuchsia/.grove_manifest"));
    assert_eq!(
      ws.update_history_dir(),
      Path::new("/work/fuchsia/.grove_root/update_history")
    );
    assert_eq!(
      ws.latest_link(),
      Path::new("/work/fuchsia/.grove_root/update_history/latest")
    );
    assert_eq!(
      ws.second_latest_link(),
      Path::new("/work/fuchsia/.grove_root/update_history/second-latest")
    );
    assert_eq!(ws.scripts_dir(), Path::new("/work/fuchsia/.grove_root/scripts"));
  }
}
