//! The immutable in-memory virtual directory.

use super::parser::parse_tree;
use super::paths::{self, canonical_segments};
use crate::errors::SchemaError;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Write as _;

/// One file or directory of a virtual directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualDirectoryNode {
    name: String,
    is_file: bool,
    children: IndexMap<String, VirtualDirectoryNode>,
}

impl VirtualDirectoryNode {
    pub(crate) fn new(name: impl Into<String>, is_file: bool) -> Self {
        Self {
            name: name.into(),
            is_file,
            children: IndexMap::new(),
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut IndexMap<String, Self> {
        &mut self.children
    }

    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true for files.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        self.is_file
    }

    /// Returns true for directories.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        !self.is_file
    }

    /// Returns a child by exact name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.get(name)
    }

    /// Iterates children in declaration order.
    pub fn children(&self) -> impl Iterator<Item = &Self> {
        self.children.values()
    }
}

/// A parsed, read-only directory layout.
///
/// Paths are slash-separated and start with the root segment, e.g.
/// `src/components/App.tsx` for a listing whose root line is `src/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualDirectory {
    root: VirtualDirectoryNode,
}

impl VirtualDirectory {
    pub(crate) const fn from_root(root: VirtualDirectoryNode) -> Self {
        Self { root }
    }

    /// Parses a box-drawing tree listing.
    pub fn parse(listing: &str) -> Result<Self, SchemaError> {
        parse_tree(listing)
    }

    /// Returns the root node.
    #[must_use]
    pub const fn root(&self) -> &VirtualDirectoryNode {
        &self.root
    }

    /// Returns the name of the root segment.
    #[must_use]
    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    /// Looks up the node at `path`.
    #[must_use]
    pub fn node(&self, path: &str) -> Option<&VirtualDirectoryNode> {
        let segments = canonical_segments(path)?;
        let (first, rest) = segments.split_first()?;
        if *first != self.root.name {
            return None;
        }

        rest.iter()
            .try_fold(&self.root, |node, segment| node.child(segment))
    }

    /// Returns true if `path` names a file.
    #[must_use]
    pub fn is_file(&self, path: &str) -> bool {
        self.node(path).is_some_and(VirtualDirectoryNode::is_file)
    }

    /// Returns true if `path` names a directory.
    #[must_use]
    pub fn is_directory(&self, path: &str) -> bool {
        self.node(path).is_some_and(VirtualDirectoryNode::is_directory)
    }

    /// Resolves `specifier` against the directory of `referencing_file`.
    pub fn resolve_relative(
        &self,
        specifier: &str,
        referencing_file: &str,
    ) -> Result<String, SchemaError> {
        paths::resolve_relative(specifier, referencing_file)
    }

    /// Lists every file path, depth-first in declaration order.
    #[must_use]
    pub fn files(&self) -> Vec<String> {
        fn walk(node: &VirtualDirectoryNode, prefix: &str, out: &mut Vec<String>) {
            for child in node.children() {
                let path = format!("{prefix}/{}", child.name);
                if child.is_file {
                    out.push(path);
                } else {
                    walk(child, &path, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.root, &self.root.name, &mut out);
        out
    }

    /// Renders the tree back into box-drawing form.
    #[must_use]
    pub fn render(&self) -> String {
        fn walk(node: &VirtualDirectoryNode, prefix: &str, out: &mut String) {
            let count = node.children.len();
            for (idx, child) in node.children().enumerate() {
                let last = idx + 1 == count;
                let branch = if last { "└── " } else { "├── " };
                let suffix = if child.is_file { "" } else { "/" };
                let _ = writeln!(out, "{prefix}{branch}{}{suffix}", child.name);
                if !child.is_file {
                    let continuation = if last { "    " } else { "│   " };
                    walk(child, &format!("{prefix}{continuation}"), out);
                }
            }
        }

        let mut out = format!("{}/\n", self.root.name);
        walk(&self.root, "", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
src/
├── components/
│   └── common/
│       ├── Button/
│       │   └── index.tsx
│       └── Loader/
│           └── index.tsx
├── App.tsx
└── index.tsx
";

    fn schema() -> VirtualDirectory {
        VirtualDirectory::parse(LISTING).unwrap()
    }

    #[test]
    fn test_lookup_files_and_directories() {
        let schema = schema();

        assert!(schema.is_file("src/App.tsx"));
        assert!(schema.is_file("src/components/common/Button/index.tsx"));
        assert!(schema.is_directory("src/components/common"));
        assert!(schema.is_directory("src/components/"));
        assert!(schema.is_directory("src"));
        assert!(!schema.is_file("src/components"));
        assert!(!schema.is_directory("src/App.tsx"));
    }

    #[test]
    fn test_lookup_normalizes_separators() {
        let schema = schema();
        assert!(schema.is_file("./src\\components\\common\\Loader\\index.tsx"));
        assert!(schema.is_file("src/components/../App.tsx"));
    }

    #[test]
    fn test_lookup_requires_root_segment() {
        let schema = schema();
        assert!(!schema.is_file("App.tsx"));
        assert!(!schema.is_file("lib/App.tsx"));
        assert!(schema.node("").is_none());
    }

    #[test]
    fn test_missing_segment_is_not_found() {
        let schema = schema();
        assert!(schema.node("src/components/rare/Thing.tsx").is_none());
        assert!(schema.node("src/App.tsx/child.ts").is_none());
    }

    #[test]
    fn test_resolve_relative_button_to_loader() {
        let schema = schema();
        let resolved = schema
            .resolve_relative("../Loader/index.tsx", "src/components/common/Button/index.tsx")
            .unwrap();

        assert_eq!(resolved, "src/components/common/Loader/index.tsx");
        assert!(schema.is_file(&resolved));
    }

    #[test]
    fn test_files_in_declaration_order() {
        assert_eq!(
            schema().files(),
            vec![
                "src/components/common/Button/index.tsx",
                "src/components/common/Loader/index.tsx",
                "src/App.tsx",
                "src/index.tsx",
            ]
        );
    }

    #[test]
    fn test_render_round_trips() {
        let schema = schema();
        let rendered = schema.render();

        assert_eq!(rendered, LISTING);
        assert_eq!(VirtualDirectory::parse(&rendered).unwrap(), schema);
    }
}
