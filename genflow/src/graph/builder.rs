//! Dependency graph construction from a manifest.

use super::resolution::ResolutionStrategy;
use crate::errors::{GenflowError, MissingReference};
use crate::manifest::FileManifest;
use crate::schema::{has_extension, resolve_relative, VirtualDirectory};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

/// A directed edge: `dependency` must be written before `dependent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    /// The file that must exist first.
    pub dependency: String,
    /// The file that depends on it.
    pub dependent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Node {
    dependencies: Vec<String>,
    dependents: Vec<String>,
}

/// File dependency graph keyed by canonical path.
///
/// Nodes keep insertion order: manifest keys first-seen, then each resolved
/// dependency the first time it is referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: IndexMap<String, Node>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and validates the graph of `manifest` against `schema`.
    ///
    /// Manifest keys are canonicalized before they become nodes, so
    /// `./src/App.tsx` and a dependency resolving to `src/App.tsx` share one
    /// node. Specifiers resolve against the canonical key.
    ///
    /// Every node must be a file of the virtual directory. All missing
    /// references are collected and returned together in
    /// [`GenflowError::UnresolvedReferences`].
    pub fn build(
        manifest: &FileManifest,
        schema: &VirtualDirectory,
        strategy: &dyn ResolutionStrategy,
    ) -> Result<Self, GenflowError> {
        let mut graph = Self::new();
        let mut missing: Vec<MissingReference> = Vec::new();
        let mut keys: Vec<(String, &[String])> = Vec::with_capacity(manifest.len());
        // First manifest entry referencing each dependency-only node.
        let mut referenced_by: IndexMap<String, String> = IndexMap::new();

        for entry in manifest.entries() {
            match entry.canonical_path() {
                Some(key) => {
                    graph.add_node(&key);
                    keys.push((key, entry.depends_on.as_slice()));
                }
                None => push_missing(&mut missing, &entry.path, None),
            }
        }

        for (key, depends_on) in &keys {
            for specifier in *depends_on {
                let resolved = match resolve_relative(specifier, key) {
                    Ok(path) if has_extension(&path) => path,
                    Ok(path) => strategy.resolve(&path, schema),
                    Err(_) => {
                        push_missing(&mut missing, specifier, Some(key.as_str()));
                        continue;
                    }
                };

                debug!(from = %key, specifier = %specifier, resolved = %resolved, "Resolved dependency");
                referenced_by
                    .entry(resolved.clone())
                    .or_insert_with(|| key.clone());
                graph.add_edge(&resolved, key);
            }
        }

        for path in graph.nodes() {
            if !schema.is_file(path) {
                let from = if keys.iter().any(|(key, _)| key == path) {
                    None
                } else {
                    referenced_by.get(path).map(String::as_str)
                };
                push_missing(&mut missing, path, from);
            }
        }

        if missing.is_empty() {
            Ok(graph)
        } else {
            Err(GenflowError::UnresolvedReferences { missing })
        }
    }

    /// Adds a node if absent.
    pub fn add_node(&mut self, path: &str) {
        if !self.nodes.contains_key(path) {
            self.nodes.insert(path.to_string(), Node::default());
        }
    }

    /// Adds the edge `dependency -> dependent`, creating both nodes.
    pub fn add_edge(&mut self, dependency: &str, dependent: &str) {
        self.add_node(dependency);
        self.add_node(dependent);

        if let Some(node) = self.nodes.get_mut(dependent) {
            if node.dependencies.iter().any(|d| d == dependency) {
                return;
            }
            node.dependencies.push(dependency.to_string());
        }
        if let Some(node) = self.nodes.get_mut(dependency) {
            node.dependents.push(dependent.to_string());
        }
    }

    /// Iterates nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Returns the position of `path` in insertion order.
    #[must_use]
    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.nodes.get_index_of(path)
    }

    /// Returns the node at `index` in insertion order.
    #[must_use]
    pub fn node_at(&self, index: usize) -> Option<&str> {
        self.nodes.get_index(index).map(|(path, _)| path.as_str())
    }

    /// Returns true if `path` is a node.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Returns the files `path` depends on.
    #[must_use]
    pub fn dependencies_of(&self, path: &str) -> &[String] {
        self.nodes
            .get(path)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or_default()
    }

    /// Returns the files depending on `path`.
    #[must_use]
    pub fn dependents_of(&self, path: &str) -> &[String] {
        self.nodes
            .get(path)
            .map(|n| n.dependents.as_slice())
            .unwrap_or_default()
    }

    /// Returns every edge, grouped by dependent in node order.
    #[must_use]
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.nodes
            .iter()
            .flat_map(|(dependent, node)| {
                node.dependencies.iter().map(move |dependency| DependencyEdge {
                    dependency: dependency.clone(),
                    dependent: dependent.clone(),
                })
            })
            .collect()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.dependencies.len()).sum()
    }
}

fn push_missing(missing: &mut Vec<MissingReference>, path: &str, referenced_by: Option<&str>) {
    if missing.iter().any(|m| m.path == path) {
        return;
    }
    missing.push(MissingReference {
        path: path.to_string(),
        referenced_by: referenced_by.map(ToString::to_string),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ExactResolution, IndexFileResolution};
    use pretty_assertions::assert_eq;

    const LISTING: &str = "\
src/
├── components/
│   └── common/
│       ├── Button/
│       │   └── index.tsx
│       └── Loader/
│           └── index.tsx
├── utils.ts
└── App.tsx
";

    fn schema() -> VirtualDirectory {
        VirtualDirectory::parse(LISTING).unwrap()
    }

    #[test]
    fn test_button_depends_on_loader() {
        let manifest = FileManifest::new()
            .with_entry("src/components/common/Button/index.tsx", ["../Loader/index.tsx"])
            .with_entry("src/components/common/Loader/index.tsx", Vec::<String>::new());

        let graph = DependencyGraph::build(&manifest, &schema(), &IndexFileResolution::new()).unwrap();

        assert_eq!(
            graph.edges(),
            vec![DependencyEdge {
                dependency: "src/components/common/Loader/index.tsx".into(),
                dependent: "src/components/common/Button/index.tsx".into(),
            }]
        );
    }

    #[test]
    fn test_extensionless_specifiers_use_strategy() {
        let manifest = FileManifest::new().with_entry(
            "src/App.tsx",
            ["./components/common/Button", "./utils", "./components/common/Loader/index.tsx"],
        );

        let graph = DependencyGraph::build(&manifest, &schema(), &IndexFileResolution::new()).unwrap();

        assert_eq!(
            graph.dependencies_of("src/App.tsx"),
            &[
                "src/components/common/Button/index.tsx".to_string(),
                "src/utils.ts".to_string(),
                "src/components/common/Loader/index.tsx".to_string(),
            ]
        );
        // Dependency-only nodes join the graph after the manifest keys.
        assert_eq!(graph.nodes().next(), Some("src/App.tsx"));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_all_missing_references_reported() {
        let manifest = FileManifest::new()
            .with_entry("src/App.tsx", ["./Header", "./utils.ts", "./Footer.tsx"])
            .with_entry("src/Ghost.tsx", Vec::<String>::new())
            .with_entry("src/utils.ts", ["../../outside.ts"]);

        let err = DependencyGraph::build(&manifest, &schema(), &IndexFileResolution::new()).unwrap_err();
        let GenflowError::UnresolvedReferences { missing } = err else {
            panic!("expected UnresolvedReferences");
        };

        assert_eq!(
            missing,
            vec![
                MissingReference {
                    path: "../../outside.ts".into(),
                    referenced_by: Some("src/utils.ts".into()),
                },
                MissingReference {
                    path: "src/Ghost.tsx".into(),
                    referenced_by: None,
                },
                MissingReference {
                    path: "src/Header/index.tsx".into(),
                    referenced_by: Some("src/App.tsx".into()),
                },
                MissingReference {
                    path: "src/Footer.tsx".into(),
                    referenced_by: Some("src/App.tsx".into()),
                },
            ]
        );
    }

    #[test]
    fn test_directory_reference_is_missing_under_exact_resolution() {
        let manifest = FileManifest::new().with_entry("src/App.tsx", ["./components"]);

        let err = DependencyGraph::build(&manifest, &schema(), &ExactResolution).unwrap_err();
        assert_eq!(err.offending_paths(), vec!["src/components"]);
    }

    #[test]
    fn test_non_canonical_keys_share_one_node() {
        let manifest = FileManifest::new()
            .with_entry("./src/App.tsx", ["./utils.ts"])
            .with_file("src/utils.ts")
            .with_entry("src/components/../App.tsx", ["./components/common/Button"])
            .with_file("src/components/common/Button/index.tsx");

        let graph = DependencyGraph::build(&manifest, &schema(), &IndexFileResolution::new()).unwrap();

        assert_eq!(
            graph.nodes().collect::<Vec<_>>(),
            vec!["src/App.tsx", "src/utils.ts", "src/components/common/Button/index.tsx"]
        );
        assert_eq!(
            graph.dependencies_of("src/App.tsx"),
            &[
                "src/utils.ts".to_string(),
                "src/components/common/Button/index.tsx".to_string(),
            ]
        );
        assert!(!graph.contains("./src/App.tsx"));
    }

    #[test]
    fn test_missing_key_reported_in_canonical_form() {
        let manifest = FileManifest::new().with_file("./src/Ghost.tsx");

        let err = DependencyGraph::build(&manifest, &schema(), &IndexFileResolution::new()).unwrap_err();
        assert_eq!(err.offending_paths(), vec!["src/Ghost.tsx"]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("a", "b");
        graph.add_node("c");

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dependents_of("a"), &["b".to_string()]);
        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(graph.dependencies_of("zzz").is_empty());
    }
}
