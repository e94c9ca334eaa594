//! The plan: the difference between the local and manifest project sets,
//! expressed as a totally ordered sequence of operations.
//!
//! Ordering is a correctness requirement, not cosmetics: deletes must run
//! before moves and creates so a path freed in this plan can be reoccupied
//! by it, and within a kind paths ascend so outer directories come into
//! existence before anything nested under them.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::project::{Project, Projects};

/// The kind of an operation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
  Delete,
  Move,
  Create,
  Update,
  Null,
}

impl OpKind {
  /// Execution rank. Lower ranks run first.
  pub fn rank(self) -> u8 {
    match self {
      OpKind::Delete => 0,
      OpKind::Move => 1,
      OpKind::Create => 2,
      OpKind::Update => 3,
      OpKind::Null => 4,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OpKind::Delete => "delete",
      OpKind::Move => "move",
      OpKind::Create => "create",
      OpKind::Update => "update",
      OpKind::Null => "null",
    }
  }
}

/// One step of a plan.
#[derive(Debug, Clone)]
pub enum Operation {
  /// Clone the project into existence at `destination`.
  Create { project: Project, destination: PathBuf },

  /// Remove the checkout at `source`; advisory-only unless `gc`.
  Delete { project: Project, source: PathBuf, gc: bool },

  /// Rename the checkout from `source` to `destination`, then sync.
  Move {
    project: Project,
    source: PathBuf,
    destination: PathBuf,
  },

  /// Advance the checkout in place to the pinned revision.
  Update { project: Project, source: PathBuf },

  /// Nothing to do besides refreshing the metadata sidecar.
  Null { project: Project, source: PathBuf },
}

impl Operation {
  pub fn kind(&self) -> OpKind {
    match self {
      Operation::Create { .. } => OpKind::Create,
      Operation::Delete { .. } => OpKind::Delete,
      Operation::Move { .. } => OpKind::Move,
      Operation::Update { .. } => OpKind::Update,
      Operation::Null { .. } => OpKind::Null,
    }
  }

  pub fn project(&self) -> &Project {
    match self {
      Operation::Create { project, .. }
      | Operation::Delete { project, .. }
      | Operation::Move { project, .. }
      | Operation::Update { project, .. }
      | Operation::Null { project, .. } => project,
    }
  }

  /// The path this operation sorts by: the destination where one exists,
  /// the source for deletes.
  fn sort_path(&self) -> &Path {
    &self.project().path
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Operation::Create { project, destination } => write!(
        f,
        "create project {:?} in {:?} and advance it to {:?}",
        project.name,
        destination.display(),
        fmt_revision(&project.revision),
      ),
      Operation::Delete { project, source, .. } => {
        write!(f, "delete project {:?} from {:?}", project.name, source.display())
      }
      Operation::Move {
        project,
        source,
        destination,
      } => write!(
        f,
        "move project {:?} located in {:?} to {:?} and advance it to {:?}",
        project.name,
        source.display(),
        destination.display(),
        fmt_revision(&project.revision),
      ),
      Operation::Update { project, source } => write!(
        f,
        "advance project {:?} located in {:?} to {:?}",
        project.name,
        source.display(),
        fmt_revision(&project.revision),
      ),
      Operation::Null { project, source } => write!(
        f,
        "project {:?} located in {:?} at revision {:?} is up-to-date",
        project.name,
        source.display(),
        fmt_revision(&project.revision),
      ),
    }
  }
}

/// The first 8 characters of a revision hash.
pub(crate) fn fmt_revision(revision: &str) -> &str {
  if revision.len() < 8 { revision } else { &revision[..8] }
}

/// Diff the `local` and `remote` project sets into an ordered plan.
///
/// For every key present on either side: only remote yields a create, only
/// local yields a delete (annotated with `gc`), differing paths yield a move
/// (which also syncs, so revisions need no separate check), differing
/// revisions yield an update, and identical entries yield a null operation.
pub fn compute_operations(local: &Projects, remote: &Projects, gc: bool) -> Vec<Operation> {
  let keys: BTreeSet<_> = local.keys().chain(remote.keys()).collect();
  let mut operations: Vec<Operation> = keys
    .into_iter()
    .map(|key| compute_op(local.get(key), remote.get(key), gc))
    .collect();
  operations.sort_by(|a, b| {
    (a.kind().rank(), a.sort_path()).cmp(&(b.kind().rank(), b.sort_path()))
  });
  operations
}

fn compute_op(local: Option<&Project>, remote: Option<&Project>, gc: bool) -> Operation {
  match (local, remote) {
    (None, Some(remote)) => Operation::Create {
      project: remote.clone(),
      destination: remote.path.clone(),
    },
    (Some(local), None) => Operation::Delete {
      project: local.clone(),
      source: local.path.clone(),
      gc,
    },
    (Some(local), Some(remote)) if local.path != remote.path => Operation::Move {
      project: remote.clone(),
      source: local.path.clone(),
      destination: remote.path.clone(),
    },
    (Some(local), Some(remote)) if local.revision != remote.revision => Operation::Update {
      project: remote.clone(),
      source: local.path.clone(),
    },
    (Some(local), Some(remote)) => Operation::Null {
      project: remote.clone(),
      source: local.path.clone(),
    },
    (None, None) => unreachable!("operation computed with neither local nor remote project"),
  }
}
