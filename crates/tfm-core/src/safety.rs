use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Outcome of a containment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Containment {
    /// Fully resolved destination, guaranteed to sit under the root.
    Within(PathBuf),
    Rejected,
}

impl Containment {
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Containment::Within(p) => Some(p),
            Containment::Rejected => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Containment::Rejected)
    }
}

/// Resolve `candidate` against `root` and check that the result stays inside
/// `root`. Relative candidates are joined onto the root; absolute ones are taken
/// as-is. The root must exist. Any resolution failure counts as a rejection.
pub fn resolve_within(root: &Path, candidate: &Path) -> Containment {
    match fs::canonicalize(root) {
        Ok(root) => contain(&root, candidate),
        Err(e) => {
            debug!("Cannot resolve root {}: {}", root.display(), e);
            Containment::Rejected
        }
    }
}

/// Like [`resolve_within`] but the root may not exist yet, as when previewing
/// an organize into a target that has not been created.
pub fn resolve_within_planned(root: &Path, candidate: &Path) -> Containment {
    match resolve_path(root) {
        Ok(root) => contain(&root, candidate),
        Err(e) => {
            debug!("Cannot resolve root {}: {}", root.display(), e);
            Containment::Rejected
        }
    }
}

fn contain(root: &Path, candidate: &Path) -> Containment {
    let joined = root.join(candidate);
    match resolve_path(&joined) {
        Ok(resolved) if resolved.starts_with(root) => Containment::Within(resolved),
        Ok(resolved) => {
            debug!(
                "Rejected {} (resolves to {}, outside {})",
                candidate.display(),
                resolved.display(),
                root.display()
            );
            Containment::Rejected
        }
        Err(e) => {
            debug!("Cannot resolve {}: {}", joined.display(), e);
            Containment::Rejected
        }
    }
}

/// Resolve a path that may not exist yet: symlinks are resolved for the deepest
/// existing ancestor, the remaining components are applied lexically. Relative
/// paths are taken from the working directory.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let normalized = if path.is_relative() {
        normalize_lexically(&std::env::current_dir()?.join(path))
    } else {
        normalize_lexically(path)
    };

    let mut existing = normalized.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        match fs::canonicalize(existing) {
            Ok(resolved) => {
                let mut out = resolved;
                for part in tail.iter().rev() {
                    out.push(part);
                }
                return Ok(out);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        tail.push(name);
                        existing = parent;
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Collapse `.` and `..` without touching the filesystem. `..` at the root
/// stays at the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
