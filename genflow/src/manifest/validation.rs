//! Manifest path syntax checks.

use super::FileManifest;
use crate::errors::{GenflowError, InvalidPath};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-/.]+$").expect("path pattern is valid"));

fn rejection(path: &str) -> Option<&'static str> {
    if path.is_empty() {
        Some("path is empty")
    } else if !PATH_PATTERN.is_match(path) {
        Some("only letters, digits, '_', '-', '.' and '/' are allowed")
    } else if path.contains("//") {
        Some("contains an empty segment ('//')")
    } else if path.ends_with('/') {
        Some("ends with '/'")
    } else {
        None
    }
}

/// Returns true if `path` passes the manifest path syntax check.
#[must_use]
pub fn is_valid_path(path: &str) -> bool {
    rejection(path).is_none()
}

/// Collects every manifest key and dependency specifier that fails the
/// syntax check, each distinct path once.
#[must_use]
pub fn invalid_paths(manifest: &FileManifest) -> Vec<InvalidPath> {
    let mut invalid: Vec<InvalidPath> = Vec::new();
    let candidates = manifest
        .entries()
        .iter()
        .flat_map(|entry| std::iter::once(&entry.path).chain(entry.depends_on.iter()));

    for path in candidates {
        if let Some(reason) = rejection(path) {
            if !invalid.iter().any(|p| &p.path == path) {
                invalid.push(InvalidPath {
                    path: path.clone(),
                    reason: reason.to_string(),
                });
            }
        }
    }
    invalid
}

/// Fails with every invalid path of `manifest` at once.
pub fn validate_paths(manifest: &FileManifest) -> Result<(), GenflowError> {
    let paths = invalid_paths(manifest);
    if paths.is_empty() {
        Ok(())
    } else {
        Err(GenflowError::InvalidPaths { paths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        for path in ["src/App.tsx", "./components/Button", "../Loader/index.tsx", "a-b_c.d"] {
            assert!(is_valid_path(path), "{path}");
        }
    }

    #[test]
    fn test_invalid_paths() {
        for path in ["", "src//a.ts", "src/", "src/a b.ts", "src\\a.ts", "src/ä.ts", "a.ts?x"] {
            assert!(!is_valid_path(path), "{path}");
        }
    }

    #[test]
    fn test_all_invalid_paths_are_reported() {
        let manifest = FileManifest::new()
            .with_entry("src/ok.ts", ["./fine", "bad path"])
            .with_entry("src//double.ts", ["bad path"])
            .with_entry("src/dir/", Vec::<String>::new());

        let err = validate_paths(&manifest).unwrap_err();
        let GenflowError::InvalidPaths { paths } = err else {
            panic!("expected InvalidPaths");
        };
        let rejected: Vec<&str> = paths.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(rejected, vec!["bad path", "src//double.ts", "src/dir/"]);
    }

    #[test]
    fn test_valid_manifest_passes() {
        let manifest = FileManifest::new().with_entry("src/a.ts", ["./b"]);
        assert!(validate_paths(&manifest).is_ok());
    }
}
