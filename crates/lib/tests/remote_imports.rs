//! Remote-import resolution against real git repositories.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use grove_lib::loader::{LoadError, load_updated_manifest};
use grove_lib::project::Projects;
use grove_lib::util::testutil;
use grove_lib::workspace::Workspace;

struct World {
  _temp: TempDir,
  ws: Workspace,
  remotes: PathBuf,
}

impl World {
  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir_all(&root).unwrap();
    let ws = Workspace::new(root.canonicalize().unwrap());
    let remotes = temp.path().join("remotes");
    fs::create_dir_all(&remotes).unwrap();
    Self { _temp: temp, ws, remotes }
  }

  /// A repository whose committed files are the given (name, contents)
  /// pairs; used as a manifest-hosting remote.
  fn manifest_remote(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = self.remotes.join(name);
    testutil::init_repo(&dir);
    for (file, contents) in files {
      fs::create_dir_all(dir.join(file).parent().unwrap()).unwrap();
      fs::write(dir.join(file), contents).unwrap();
      testutil::git(&dir, &["add", file]);
    }
    testutil::git(&dir, &["commit", "-m", "manifests"]);
    dir
  }

  fn import_entry(&self, manifest: &str, name: &str, remote: &Path, root: &str) -> String {
    let mut entry = format!(
      "[[imports.remote]]\nmanifest = \"{manifest}\"\nname = \"{name}\"\nremote = \"{}\"\n",
      remote.display()
    );
    if !root.is_empty() {
      entry.push_str(&format!("root = \"{root}\"\n"));
    }
    entry.push('\n');
    entry
  }
}

#[test]
fn remote_import_clones_and_accumulates_projects() {
  let world = World::new();
  let project_origin = world.remotes.join("dep");
  testutil::init_repo(&project_origin);

  let manifest_repo = world.manifest_remote(
    "manifests",
    &[(
      "default",
      &format!(
        "[[projects]]\nname = \"dep\"\npath = \"src/dep\"\nremote = \"{}\"\n",
        project_origin.display()
      ),
    )],
  );

  let top = world.ws.manifest_file();
  fs::write(&top, world.import_entry("default", "manifests", &manifest_repo, "")).unwrap();

  let (projects, _tools, scratch) = load_updated_manifest(&world.ws, &top, Projects::new()).unwrap();
  assert_eq!(projects.len(), 1);
  let dep = projects.values().next().unwrap();
  assert_eq!(dep.name, "dep");
  assert_eq!(dep.path, world.ws.root().join("src/dep"));

  // The manifest repository was cloned into the scratch directory, which
  // the guard keeps alive.
  let scratch = scratch.expect("a manifest repository was cloned");
  let clones: Vec<_> = fs::read_dir(scratch.path()).unwrap().collect();
  assert_eq!(clones.len(), 1);
}

#[test]
fn import_root_prefixes_names_and_paths() {
  let world = World::new();
  let project_origin = world.remotes.join("dep");
  testutil::init_repo(&project_origin);

  let manifest_repo = world.manifest_remote(
    "manifests",
    &[(
      "default",
      &format!(
        "[[projects]]\nname = \"dep\"\npath = \"src/dep\"\nremote = \"{}\"\n",
        project_origin.display()
      ),
    )],
  );

  let top = world.ws.manifest_file();
  fs::write(&top, world.import_entry("default", "manifests", &manifest_repo, "vendor")).unwrap();

  let (projects, _tools, _scratch) = load_updated_manifest(&world.ws, &top, Projects::new()).unwrap();
  let dep = projects.values().next().unwrap();
  assert_eq!(dep.name, "vendor/dep");
  assert_eq!(dep.path, world.ws.root().join("vendor/src/dep"));
}

#[test]
fn local_import_inside_remote_manifest_repo() {
  let world = World::new();
  let project_origin = world.remotes.join("dep");
  testutil::init_repo(&project_origin);

  let manifest_repo = world.manifest_remote(
    "manifests",
    &[
      ("default", "[[imports.local]]\nfile = \"common\"\n"),
      (
        "common",
        &format!(
          "[[projects]]\nname = \"dep\"\npath = \"src/dep\"\nremote = \"{}\"\n",
          project_origin.display()
        ),
      ),
    ],
  );

  let top = world.ws.manifest_file();
  fs::write(&top, world.import_entry("default", "manifests", &manifest_repo, "")).unwrap();

  let (projects, _tools, _scratch) = load_updated_manifest(&world.ws, &top, Projects::new()).unwrap();
  assert_eq!(projects.len(), 1);
}

#[test]
fn mutual_remote_imports_are_a_cycle() {
  let world = World::new();

  // Two manifest repositories importing each other. The second repository
  // cannot name the first's path before it exists, so both files are
  // written up front with the final paths.
  let repo_a_path = world.remotes.join("repo_a");
  let repo_b_path = world.remotes.join("repo_b");

  world.manifest_remote(
    "repo_a",
    &[(
      "a",
      &format!(
        "[[imports.remote]]\nmanifest = \"b\"\nname = \"b_manifests\"\nremote = \"{}\"\n",
        repo_b_path.display()
      ),
    )],
  );
  world.manifest_remote(
    "repo_b",
    &[(
      "b",
      &format!(
        "[[imports.remote]]\nmanifest = \"a\"\nname = \"a_manifests\"\nremote = \"{}\"\n",
        repo_a_path.display()
      ),
    )],
  );

  let top = world.ws.manifest_file();
  fs::write(&top, world.import_entry("a", "a_manifests", &repo_a_path, "")).unwrap();

  let err = load_updated_manifest(&world.ws, &top, Projects::new()).unwrap_err();
  assert!(matches!(err, LoadError::RemoteCycle { .. }), "got {err:?}");

  // No clones leaked under the root.
  let entries: Vec<_> = fs::read_dir(world.ws.root())
    .unwrap()
    .map(|e| e.unwrap().file_name())
    .filter(|name| name.to_string_lossy() != ".grove_manifest")
    .collect();
  assert!(entries.is_empty(), "unexpected entries under root: {entries:?}");
}
