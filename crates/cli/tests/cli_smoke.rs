//! CLI smoke tests for grove.
//!
//! These verify that the commands run, return the documented exit codes,
//! and leave the expected state behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Isolated workspace with its own root and remotes.
struct TestEnv {
  temp: TempDir,
  root: PathBuf,
}

impl TestEnv {
  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir_all(&root).unwrap();
    let root = root.canonicalize().unwrap();
    Self { temp, root }
  }

  /// A grove command pointed at the isolated root.
  fn cmd(&self) -> Command {
    let mut cmd = Command::cargo_bin("grove").unwrap();
    cmd.env("GROVE_ROOT", &self.root);
    cmd
  }

  fn write_manifest(&self, contents: &str) {
    fs::write(self.root.join(".grove_manifest"), contents).unwrap();
  }

  /// Create a git remote with one commit.
  fn remote(&self, name: &str) -> PathBuf {
    let dir = self.temp.path().join("remotes").join(name);
    fs::create_dir_all(&dir).unwrap();
    git(&dir, &["init", "--initial-branch=master"]);
    git(&dir, &["config", "user.name", "grove-test"]);
    git(&dir, &["config", "user.email", "grove-test@example.com"]);
    fs::write(dir.join("README"), name).unwrap();
    git(&dir, &["add", "README"]);
    git(&dir, &["commit", "-m", "initial commit"]);
    dir
  }
}

fn git(dir: &Path, args: &[&str]) {
  let status = StdCommand::new("git").args(args).current_dir(dir).status().unwrap();
  assert!(status.success(), "git {args:?} failed");
}

#[test]
fn help_runs() {
  Command::cargo_bin("grove")
    .unwrap()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Multi-repository workspace manager"));
}

#[test]
fn missing_root_is_an_error() {
  Command::cargo_bin("grove")
    .unwrap()
    .env_remove("GROVE_ROOT")
    .arg("status")
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("GROVE_ROOT"));
}

#[test]
fn status_on_empty_root() {
  let env = TestEnv::new();
  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("no managed projects"));
}

#[test]
fn unparseable_manifest_exits_with_two() {
  let env = TestEnv::new();
  env.write_manifest("this is not { valid toml");
  env.cmd().arg("update").assert().failure().code(2);
}

#[test]
fn invalid_project_name_exits_with_two() {
  let env = TestEnv::new();
  env.write_manifest("[[projects]]\nname = \"bad=name\"\npath = \"p\"\nremote = \"r\"\n");
  env.cmd().arg("update").assert().failure().code(2);
}

#[test]
fn update_clones_and_status_reports() {
  let env = TestEnv::new();
  let origin = env.remote("foo");
  env.write_manifest(&format!(
    "[[projects]]\nname = \"foo\"\npath = \"src/foo\"\nremote = \"{}\"\n",
    origin.display()
  ));

  env.cmd().arg("update").assert().success();
  assert!(env.root.join("src/foo/.git").is_dir());

  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("foo"));
}

#[test]
fn snapshot_writes_manifest_file() {
  let env = TestEnv::new();
  env.write_manifest("");
  let snap = env.temp.path().join("snap");
  env
    .cmd()
    .args(["snapshot", snap.to_str().unwrap()])
    .assert()
    .success();
  assert!(snap.is_file());
}
