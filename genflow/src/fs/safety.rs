//! Path traversal checks.
//!
//! Checks are purely lexical. Symlinks inside the root are not resolved.

use crate::errors::UnauthorizedAccessError;
use std::path::{Component, Path, PathBuf};

/// Joins `candidate` onto `root` and confirms the result stays inside it.
///
/// Returns the normalized target path.
///
/// # Errors
///
/// Returns [`UnauthorizedAccessError`] when the candidate climbs out of the
/// root with `..` or names an absolute location elsewhere.
pub fn ensure_within_root(
    root: &Path,
    candidate: impl AsRef<Path>,
) -> Result<PathBuf, UnauthorizedAccessError> {
    let candidate = candidate.as_ref();
    let root_norm = normalize(root);
    let target = normalize(&root.join(candidate));

    match target.strip_prefix(&root_norm) {
        Ok(relative) if is_contained(relative) => Ok(target),
        _ => Err(UnauthorizedAccessError::new(root, candidate)),
    }
}

/// Returns true if `candidate` would be accepted under `root`.
#[must_use]
pub fn is_within_root(root: &Path, candidate: impl AsRef<Path>) -> bool {
    ensure_within_root(root, candidate).is_ok()
}

fn is_contained(relative: &Path) -> bool {
    !relative.is_absolute()
        && relative
            .components()
            .next()
            .map_or(true, |c| matches!(c, Component::Normal(_)))
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}
