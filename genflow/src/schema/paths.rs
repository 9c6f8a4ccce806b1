//! Slash-separated path normalization shared by the schema and the graph.
//!
//! These helpers never touch the filesystem.

use crate::errors::SchemaError;

/// Splits a path into canonical segments.
///
/// Backslashes count as separators, empty and `.` segments are dropped and
/// `..` pops the previous segment. Returns `None` when `..` climbs above the
/// first segment.
#[must_use]
pub fn canonical_segments(path: &str) -> Option<Vec<String>> {
    let unified = path.replace('\\', "/");
    let mut segments: Vec<String> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other.to_string()),
        }
    }

    Some(segments)
}

/// Normalizes a path to its canonical slash-separated form.
#[must_use]
pub fn normalize_path(path: &str) -> Option<String> {
    canonical_segments(path).map(|segments| segments.join("/"))
}

/// Returns the directory part of a slash-separated file path.
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Resolves `specifier` against the directory of `referencing_file`.
///
/// A specifier starting with `/` is resolved from the top of the tree.
///
/// # Errors
///
/// Returns [`SchemaError::EscapesRoot`] when `..` segments climb above the
/// top of the tree.
pub fn resolve_relative(specifier: &str, referencing_file: &str) -> Result<String, SchemaError> {
    let unified = specifier.replace('\\', "/");
    let joined = if unified.starts_with('/') {
        unified
    } else {
        format!("{}/{}", parent_dir(referencing_file), unified)
    };

    normalize_path(&joined).ok_or_else(|| SchemaError::EscapesRoot {
        specifier: specifier.to_string(),
        from: referencing_file.to_string(),
    })
}

/// Returns true if the final segment of `name` carries a dot-extension.
///
/// Leading-dot names such as `.gitignore` count as having one.
#[must_use]
pub fn has_extension(name: &str) -> bool {
    let last = name.rsplit('/').next().unwrap_or(name);
    last.rfind('.').is_some_and(|idx| idx + 1 < last.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./src//a/./b/").as_deref(), Some("src/a/b"));
        assert_eq!(normalize_path("src\\a\\b.ts").as_deref(), Some("src/a/b.ts"));
        assert_eq!(normalize_path("src/a/../b.ts").as_deref(), Some("src/b.ts"));
        assert_eq!(normalize_path("../outside"), None);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("src/components/App.tsx"), "src/components");
        assert_eq!(parent_dir("App.tsx"), "");
    }

    #[test]
    fn test_resolve_sibling_directory() {
        let resolved = resolve_relative(
            "../Loader/index.tsx",
            "src/components/common/Button/index.tsx",
        )
        .unwrap();
        assert_eq!(resolved, "src/components/common/Loader/index.tsx");
    }

    #[test]
    fn test_resolve_bare_and_dot_specifiers() {
        assert_eq!(
            resolve_relative("styles.css", "src/App.tsx").unwrap(),
            "src/styles.css"
        );
        assert_eq!(
            resolve_relative("./hooks/useAuth.ts", "src/App.tsx").unwrap(),
            "src/hooks/useAuth.ts"
        );
        assert_eq!(
            resolve_relative("/src/index.ts", "src/deep/nested/file.ts").unwrap(),
            "src/index.ts"
        );
    }

    #[test]
    fn test_resolve_escaping_root() {
        let err = resolve_relative("../../../etc/passwd", "src/App.tsx").unwrap_err();
        assert!(matches!(err, SchemaError::EscapesRoot { .. }));
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("index.tsx"));
        assert!(has_extension(".gitignore"));
        assert!(has_extension("src/utils/format.test.ts"));
        assert!(!has_extension("components"));
        assert!(!has_extension("trailing."));
        assert!(!has_extension("src/utils/helpers"));
    }
}
