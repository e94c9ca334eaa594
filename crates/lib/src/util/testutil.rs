//! Test fixtures shared by unit and integration tests.
//!
//! These helpers drive the real `git` binary against temporary directories.
//! They panic on failure, which is the behavior tests want.

use std::path::Path;
use std::process::Command;

/// Run `git` with `args` in `dir`, panicking on failure. Returns stdout with
/// trailing whitespace trimmed.
pub fn git(dir: &Path, args: &[&str]) -> String {
  let output = Command::new("git")
    .args(args)
    .current_dir(dir)
    .output()
    .unwrap_or_else(|err| panic!("failed to spawn git {args:?}: {err}"));
  assert!(
    output.status.success(),
    "git {:?} in {} failed: {}",
    args,
    dir.display(),
    String::from_utf8_lossy(&output.stderr)
  );
  String::from_utf8(output.stdout).unwrap().trim_end().to_string()
}

/// Initialize a repository on branch `master` with identity configured, and
/// create an initial commit so the branch exists.
pub fn init_repo(dir: &Path) {
  std::fs::create_dir_all(dir).unwrap();
  git(dir, &["init", "--initial-branch=master"]);
  git(dir, &["config", "user.name", "grove-test"]);
  git(dir, &["config", "user.email", "grove-test@example.com"]);
  git(dir, &["commit", "--allow-empty", "-m", "initial commit"]);
}

/// Write `contents` to `name` inside the repository and commit it. Returns
/// the new commit hash.
pub fn commit_file(dir: &Path, name: &str, contents: &str) -> String {
  let path = dir.join(name);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(&path, contents).unwrap();
  git(dir, &["add", name]);
  git(dir, &["commit", "-m", &format!("add {name}")]);
  git(dir, &["rev-parse", "HEAD"])
}

/// The commit hash `branch` points at.
pub fn revision_of(dir: &Path, branch: &str) -> String {
  git(dir, &["rev-parse", branch])
}
