//! Well-known names and locations inside a grove workspace.

/// Environment variable anchoring the workspace root.
pub const ROOT_ENV: &str = "GROVE_ROOT";

/// Directory under the root holding grove's own state.
pub const ROOT_META_DIR: &str = ".grove_root";

/// Top-level manifest file, relative to the root.
pub const MANIFEST_FILE: &str = ".grove_manifest";

/// Per-project metadata directory. Its presence marks a managed checkout.
pub const PROJECT_META_DIR: &str = ".grove";

/// Metadata file inside [`PROJECT_META_DIR`].
pub const PROJECT_META_FILE: &str = "metadata";

/// Update-history directory under [`ROOT_META_DIR`].
pub const UPDATE_HISTORY_DIR: &str = "update_history";

/// Symlink to the most recent update-history snapshot.
pub const LATEST_LINK: &str = "latest";

/// Symlink to the snapshot before the most recent one.
pub const SECOND_LATEST_LINK: &str = "second-latest";

/// Scripts directory under [`ROOT_META_DIR`].
pub const SCRIPTS_DIR: &str = "scripts";

/// Reserved separator joining a project's name and remote into its key.
/// Project names must not contain it.
pub const KEY_SEPARATOR: &str = "=";

/// Separator joining a remote import's remote and manifest file into its
/// cycle key. Deliberately not a URL-safe character sequence, so that
/// `(remote, manifest)` pairs cannot collide after joining.
pub const CYCLE_KEY_SEPARATOR: &str = " + ";

/// Name of the project hosting grove itself.
pub const SELF_PROJECT_NAME: &str = "grove";

/// Script inside the grove project that is copied under the root on update.
pub const SELF_SCRIPT: &str = "grove";

/// Default project for tools that do not name one.
pub const DEFAULT_TOOL_PROJECT: &str = "https://grove.googlesource.com/grove";

/// Entry written to `.git/info/exclude` of every managed checkout so the
/// metadata sidecar never shows up as untracked content.
pub const GIT_EXCLUDE_ENTRY: &str = "/.grove/\n";
