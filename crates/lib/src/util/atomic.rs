//! Atomic filesystem idioms.
//!
//! [`write_atomic`] is the write-temp-then-rename pattern used for every
//! manifest, sidecar, and snapshot this crate persists. [`atomic_action`] is
//! the completion-marker idiom exposed to external installers: an action is
//! re-run from scratch unless its directory carries a `.complete` marker.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

/// Marker file recording that an [`atomic_action`] finished.
const COMPLETE_MARKER: &str = ".complete";

/// Write `data` to `path` atomically: the bytes land in a temporary sibling
/// first and are renamed into place, so readers never observe a partial file.
/// Parent directories are created as needed.
///
/// The temporary name is the full file name with `.tmp` appended, never a
/// replaced extension: file names with dots in them (timestamps, versioned
/// names) must keep their whole name so two writes to different targets
/// cannot share a temp path.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let Some(file_name) = path.file_name() else {
    return Err(io::Error::new(
      io::ErrorKind::InvalidInput,
      format!("cannot write to {}: no file name", path.display()),
    ));
  };
  let tmp = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));
  fs::write(&tmp, data)?;
  fs::rename(&tmp, path)
}

/// Run `action` against `dir` unless a previous run already completed.
///
/// If `dir` exists without the completion marker, the previous run did not
/// finish; the directory is wiped and the action re-run. If the action fails,
/// the directory is removed before the error propagates, so the next attempt
/// starts clean. On success the marker is written.
pub fn atomic_action<F>(dir: &Path, message: &str, action: F) -> io::Result<()>
where
  F: FnOnce() -> io::Result<()>,
{
  let marker = dir.join(COMPLETE_MARKER);
  if dir.is_dir() {
    if marker.is_file() {
      debug!(dir = %dir.display(), "{message}: already completed");
      return Ok(());
    }
    fs::remove_dir_all(dir)?;
  }
  if let Err(err) = action() {
    if dir.is_dir() {
      let _ = fs::remove_dir_all(dir);
    }
    return Err(err);
  }
  fs::write(&marker, b"completed")
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn write_atomic_creates_parents() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a/b/file");
    write_atomic(&path, b"contents").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"contents");
    assert!(!temp.path().join("a/b/file.tmp").exists());
  }

  #[test]
  fn write_atomic_keeps_dotted_names_distinct() {
    // Timestamped snapshot names carry dots; the temp path must append to
    // the whole name, not truncate at the last dot.
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("2026-08-02T14:23:45.1Z");
    let second = temp.path().join("2026-08-02T14:23:45.2Z");
    write_atomic(&first, b"first").unwrap();
    write_atomic(&second, b"second").unwrap();
    assert_eq!(fs::read(&first).unwrap(), b"first");
    assert_eq!(fs::read(&second).unwrap(), b"second");
    assert!(!temp.path().join("2026-08-02T14:23:45.tmp").exists());
  }

  #[test]
  fn action_runs_and_marks_complete() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("install");
    atomic_action(&dir, "install", || {
      fs::create_dir_all(&dir)?;
      fs::write(dir.join("payload"), b"x")
    })
    .unwrap();
    assert!(dir.join(".complete").is_file());
  }

  #[test]
  fn completed_action_is_skipped() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("install");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(".complete"), b"completed").unwrap();

    let mut ran = false;
    atomic_action(&dir, "install", || {
      ran = true;
      Ok(())
    })
    .unwrap();
    assert!(!ran);
  }

  #[test]
  fn incomplete_dir_is_wiped_before_rerun() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("install");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("stale"), b"leftover").unwrap();

    atomic_action(&dir, "install", || {
      assert!(!dir.exists(), "stale dir should have been removed");
      fs::create_dir_all(&dir)?;
      fs::write(dir.join("payload"), b"x")
    })
    .unwrap();
    assert!(!dir.join("stale").exists());
    assert!(dir.join("payload").is_file());
  }

  #[test]
  fn failed_action_removes_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("install");
    let result = atomic_action(&dir, "install", || {
      fs::create_dir_all(&dir)?;
      fs::write(dir.join("partial"), b"x")?;
      Err(io::Error::other("install failed"))
    });
    assert!(result.is_err());
    assert!(!dir.exists());
  }
}
