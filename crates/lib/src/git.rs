//! A narrow facade over the external `git` program.
//!
//! Every [`Git`] value is bound to an explicit working directory; commands
//! run with `current_dir` set instead of ever changing the process working
//! directory. Errors carry the failing arguments and git's stderr and
//! surface to callers unchanged; the driver has no retry policy.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
  #[error("failed to spawn git {args}: {source}")]
  Spawn {
    args: String,
    #[source]
    source: io::Error,
  },

  #[error("git {args} failed ({status}): {stderr}")]
  Failed { args: String, status: String, stderr: String },

  #[error("git {args} produced non-utf8 output")]
  Output { args: String },
}

fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<String, GitError> {
  let rendered = args.join(" ");
  debug!(args = %rendered, dir = ?dir, "git");
  let mut command = Command::new("git");
  command.args(args);
  if let Some(dir) = dir {
    command.current_dir(dir);
  }
  let output = command.output().map_err(|source| GitError::Spawn {
    args: rendered.clone(),
    source,
  })?;
  if !output.status.success() {
    return Err(GitError::Failed {
      args: rendered,
      status: output.status.to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
    });
  }
  String::from_utf8(output.stdout)
    .map(|stdout| stdout.trim_end().to_string())
    .map_err(|_| GitError::Output { args: rendered })
}

/// Clone `remote` into `dest`. The destination directory may already exist
/// as long as it is empty.
pub fn clone(remote: &str, dest: &Path) -> Result<(), GitError> {
  let dest = dest.to_string_lossy();
  run_git(None, &["clone", remote, &dest]).map(|_| ())
}

/// Git operations against one repository.
#[derive(Debug, Clone)]
pub struct Git {
  dir: PathBuf,
}

impl Git {
  /// A driver running commands inside `dir` (the checkout, or any directory
  /// within it for discovery operations).
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn run(&self, args: &[&str]) -> Result<String, GitError> {
    run_git(Some(&self.dir), args)
  }

  pub fn fetch(&self, remote: &str) -> Result<(), GitError> {
    self.run(&["fetch", remote]).map(|_| ())
  }

  pub fn fetch_refspec(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
    self.run(&["fetch", remote, refspec]).map(|_| ())
  }

  pub fn set_remote_url(&self, name: &str, url: &str) -> Result<(), GitError> {
    self.run(&["remote", "set-url", name, url]).map(|_| ())
  }

  /// Hard-reset the current branch to `target`.
  pub fn reset(&self, target: &str) -> Result<(), GitError> {
    self.run(&["reset", "--hard", target]).map(|_| ())
  }

  pub fn current_branch(&self) -> Result<String, GitError> {
    self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
  }

  /// The commit `rev` resolves to.
  pub fn current_revision(&self, rev: &str) -> Result<String, GitError> {
    self.run(&["rev-parse", rev])
  }

  /// All local branches plus the currently checked out one.
  pub fn branches(&self) -> Result<(Vec<String>, String), GitError> {
    let listing = self.run(&["branch", "--list"])?;
    let mut branches = Vec::new();
    let mut current = String::new();
    for line in listing.lines() {
      let name = line.trim_start_matches('*').trim();
      if name.is_empty() {
        continue;
      }
      if line.starts_with('*') {
        current = name.to_string();
      }
      branches.push(name.to_string());
    }
    Ok((branches, current))
  }

  pub fn checkout(&self, branch: &str, force: bool) -> Result<(), GitError> {
    if force {
      self.run(&["checkout", "-f", branch]).map(|_| ())
    } else {
      self.run(&["checkout", branch]).map(|_| ())
    }
  }

  pub fn delete_branch(&self, branch: &str, force: bool) -> Result<(), GitError> {
    let flag = if force { "-D" } else { "-d" };
    self.run(&["branch", flag, branch]).map(|_| ())
  }

  /// Stash local changes. Returns whether anything was stashed, so the
  /// caller knows whether to pop later.
  pub fn stash(&self) -> Result<bool, GitError> {
    if !self.has_uncommitted_changes()? {
      return Ok(false);
    }
    self.run(&["stash"])?;
    Ok(true)
  }

  pub fn stash_pop(&self) -> Result<(), GitError> {
    self.run(&["stash", "pop"]).map(|_| ())
  }

  /// The top-level directory of the enclosing checkout.
  pub fn top_level(&self) -> Result<PathBuf, GitError> {
    self.run(&["rev-parse", "--show-toplevel"]).map(PathBuf::from)
  }

  pub fn remote_url(&self, name: &str) -> Result<String, GitError> {
    self.run(&["config", "--get", &format!("remote.{name}.url")])
  }

  fn status_porcelain(&self) -> Result<Vec<String>, GitError> {
    let listing = self.run(&["status", "--porcelain"])?;
    Ok(listing.lines().map(str::to_string).collect())
  }

  pub fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
    Ok(self.status_porcelain()?.iter().any(|line| !line.starts_with("??")))
  }

  pub fn has_untracked_files(&self) -> Result<bool, GitError> {
    Ok(self.status_porcelain()?.iter().any(|line| line.starts_with("??")))
  }

  pub fn remove_untracked_files(&self) -> Result<(), GitError> {
    self.run(&["clean", "-d", "-f"]).map(|_| ())
  }

  /// Commit lines for `range` rendered with `format`.
  pub fn log(&self, range: &str, format: &str) -> Result<Vec<String>, GitError> {
    let listing = self.run(&["log", range, &format!("--format=format:{format}")])?;
    Ok(listing.lines().map(str::to_string).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil;
  use tempfile::TempDir;

  #[test]
  fn current_branch_and_revision() {
    let temp = TempDir::new().unwrap();
    testutil::init_repo(temp.path());
    let git = Git::new(temp.path());
    assert_eq!(git.current_branch().unwrap(), "master");

    let rev = testutil::commit_file(temp.path(), "file", "contents");
    assert_eq!(git.current_revision("master").unwrap(), rev);
  }

  #[test]
  fn branches_lists_all_and_current() {
    let temp = TempDir::new().unwrap();
    testutil::init_repo(temp.path());
    testutil::git(temp.path(), &["branch", "feature"]);

    let git = Git::new(temp.path());
    let (all, current) = git.branches().unwrap();
    assert_eq!(all, vec!["feature".to_string(), "master".to_string()]);
    assert_eq!(current, "master");
  }

  #[test]
  fn stash_roundtrip() {
    let temp = TempDir::new().unwrap();
    testutil::init_repo(temp.path());
    testutil::commit_file(temp.path(), "file", "original");

    let git = Git::new(temp.path());
    assert!(!git.stash().unwrap());

    std::fs::write(temp.path().join("file"), "modified").unwrap();
    assert!(git.has_uncommitted_changes().unwrap());
    assert!(git.stash().unwrap());
    assert!(!git.has_uncommitted_changes().unwrap());

    git.stash_pop().unwrap();
    assert!(git.has_uncommitted_changes().unwrap());
  }

  #[test]
  fn untracked_and_uncommitted_are_distinguished() {
    let temp = TempDir::new().unwrap();
    testutil::init_repo(temp.path());
    std::fs::write(temp.path().join("stray"), "x").unwrap();

    let git = Git::new(temp.path());
    assert!(git.has_untracked_files().unwrap());
    assert!(!git.has_uncommitted_changes().unwrap());

    git.remove_untracked_files().unwrap();
    assert!(!git.has_untracked_files().unwrap());
  }

  #[test]
  fn top_level_from_subdirectory() {
    let temp = TempDir::new().unwrap();
    testutil::init_repo(temp.path());
    let sub = temp.path().join("a/b");
    std::fs::create_dir_all(&sub).unwrap();

    let top = Git::new(&sub).top_level().unwrap();
    assert_eq!(top.canonicalize().unwrap(), temp.path().canonicalize().unwrap());
  }

  #[test]
  fn clone_and_remote_url() {
    let temp = TempDir::new().unwrap();
    let origin = temp.path().join("origin");
    testutil::init_repo(&origin);

    let checkout = temp.path().join("checkout");
    clone(origin.to_str().unwrap(), &checkout).unwrap();
    assert!(checkout.join(".git").is_dir());

    let url = Git::new(&checkout).remote_url("origin").unwrap();
    assert_eq!(url, origin.to_string_lossy());
  }

  #[test]
  fn failed_command_reports_stderr() {
    let temp = TempDir::new().unwrap();
    testutil::init_repo(temp.path());
    let err = Git::new(temp.path()).checkout("no-such-branch", false).unwrap_err();
    match err {
      GitError::Failed { args, stderr, .. } => {
        assert!(args.contains("checkout"));
        assert!(!stderr.is_empty());
      }
      other => panic!("expected Failed, got {other:?}"),
    }
  }
}
