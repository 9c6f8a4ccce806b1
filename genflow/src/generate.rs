//! Generate-from-manifest entry point.
//!
//! [`ManifestGenerator::generate`] runs the whole file subsystem:
//!
//! 1. extract the manifest block from the document
//! 2. check path syntax, reporting every invalid path
//! 3. build the dependency graph, reporting every missing file
//! 4. reject cycles, reporting every cycle
//! 5. sort dependencies first
//! 6. materialize under the project root
//!
//! Steps 1 to 5 never touch the filesystem and are available on their own
//! through [`ManifestGenerator::plan`].

use crate::cancellation::CancellationToken;
use crate::config::GenflowConfig;
use crate::errors::GenflowError;
use crate::events::{EventSink, NoOpEventSink};
use crate::fs::{ContentProducer, FileMaterializer, FileRequest, FileSystem, MaterializationReport};
use crate::graph::{ensure_acyclic, topological_order, DependencyGraph, IndexFileResolution, ResolutionStrategy};
use crate::manifest::{extract_manifest, validate_paths, FileManifest};
use crate::schema::VirtualDirectory;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A validated write plan.
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    /// The decoded manifest.
    pub manifest: FileManifest,
    /// The validated, acyclic dependency graph.
    pub graph: DependencyGraph,
    /// Every graph node, dependencies first.
    pub order: Vec<String>,
}

/// Serializable summary of a [`GenerationPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Write order.
    pub order: Vec<String>,
    /// Number of dependency edges.
    pub edges: usize,
    /// Nodes that only appear as dependencies.
    pub implied: Vec<String>,
}

impl GenerationPlan {
    /// Returns one request per file in write order.
    #[must_use]
    pub fn requests(&self) -> Vec<FileRequest> {
        self.order
            .iter()
            .map(|path| FileRequest::new(path.clone(), self.graph.dependencies_of(path).to_vec()))
            .collect()
    }

    /// Summarizes the plan.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            order: self.order.clone(),
            edges: self.graph.edge_count(),
            implied: self
                .order
                .iter()
                .filter(|path| !self.manifest.declares(path))
                .cloned()
                .collect(),
        }
    }
}

/// Turns a document with an embedded manifest into files on disk.
pub struct ManifestGenerator {
    config: GenflowConfig,
    fs: Arc<dyn FileSystem>,
    strategy: Box<dyn ResolutionStrategy>,
    cancellation: Option<Arc<CancellationToken>>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ManifestGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ManifestGenerator {
    /// Creates a generator using the configured resolution convention.
    pub fn new(config: GenflowConfig, fs: Arc<dyn FileSystem>) -> Self {
        let strategy = Box::new(IndexFileResolution::from_config(&config.resolution));
        Self {
            config,
            fs,
            strategy,
            cancellation: None,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the resolution strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl ResolutionStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// Checks `token` before every file write.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Sets the event sink for write events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &GenflowConfig {
        &self.config
    }

    /// Extracts and validates the manifest of `document` without any I/O.
    pub fn plan(&self, document: &str, schema: &VirtualDirectory) -> Result<GenerationPlan, GenflowError> {
        let manifest = extract_manifest(document, &self.config.manifest)?;
        self.plan_manifest(manifest, schema)
    }

    /// Validates an already decoded manifest without any I/O.
    ///
    /// The checks run in sequence and stop at the first failing one: path
    /// syntax, then missing references, then cycles. A manifest with both
    /// a missing file and a cycle reports only the missing file.
    pub fn plan_manifest(
        &self,
        manifest: FileManifest,
        schema: &VirtualDirectory,
    ) -> Result<GenerationPlan, GenflowError> {
        validate_paths(&manifest)?;
        let graph = DependencyGraph::build(&manifest, schema, self.strategy.as_ref())?;
        ensure_acyclic(&graph)?;
        let order = topological_order(&graph)?;

        info!(
            files = manifest.len(),
            nodes = graph.len(),
            edges = graph.edge_count(),
            "Planned manifest generation"
        );
        Ok(GenerationPlan {
            manifest,
            graph,
            order,
        })
    }

    /// Plans and materializes `document` under `root`.
    pub async fn generate(
        &self,
        document: &str,
        schema: &VirtualDirectory,
        root: impl AsRef<Path>,
        producer: &dyn ContentProducer,
    ) -> Result<MaterializationReport, GenflowError> {
        let plan = self.plan(document, schema)?;
        self.materialize(&plan, root, producer).await
    }

    /// Materializes a plan under `root`.
    pub async fn materialize(
        &self,
        plan: &GenerationPlan,
        root: impl AsRef<Path>,
        producer: &dyn ContentProducer,
    ) -> Result<MaterializationReport, GenflowError> {
        let mut materializer = FileMaterializer::new(self.fs.clone(), root.as_ref())
            .with_rollback(self.config.materialize.rollback_on_failure)
            .with_event_sink(self.event_sink.clone());
        if let Some(token) = &self.cancellation {
            materializer = materializer.with_cancellation(token.clone());
        }

        let report = materializer.materialize(&plan.requests(), producer).await?;
        info!(
            root = %report.root.display(),
            files = report.len(),
            bytes = report.total_bytes(),
            "Materialized manifest"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::PlaceholderContent;
    use crate::graph::ExactResolution;
    use crate::testing::{assert_dependencies_first, manifest_document, sample_schema, InMemoryFileSystem};
    use pretty_assertions::assert_eq;

    fn generator(fs: &Arc<InMemoryFileSystem>) -> ManifestGenerator {
        ManifestGenerator::new(GenflowConfig::default(), fs.clone())
    }

    #[test]
    fn test_plan_orders_dependencies_first() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(
            &FileManifest::new()
                .with_entry("src/App.tsx", ["./components/common/Button", "./utils/format.ts"])
                .with_entry("src/components/common/Button/index.tsx", ["../Loader/index.tsx"])
                .with_file("src/components/common/Loader/index.tsx")
                .with_file("src/utils/format.ts")
                .with_entry("src/index.tsx", ["./App.tsx"]),
        );

        let plan = generator(&fs).plan(&document, &sample_schema()).unwrap();

        assert_eq!(plan.order.len(), 5);
        assert_dependencies_first(&plan.order, &plan.graph);
        assert!(plan.summary().implied.is_empty());
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn test_plan_includes_dependency_only_files() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(&FileManifest::new().with_entry("src/index.tsx", ["./App.tsx"]));

        let plan = generator(&fs).plan(&document, &sample_schema()).unwrap();

        assert_eq!(plan.order, vec!["src/App.tsx", "src/index.tsx"]);
        assert_eq!(plan.summary().implied, vec!["src/App.tsx"]);
        assert_eq!(plan.requests()[1].dependencies, vec!["src/App.tsx"]);
    }

    #[tokio::test]
    async fn test_cycle_writes_nothing() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(
            &FileManifest::new()
                .with_entry("src/App.tsx", ["./index.tsx"])
                .with_entry("src/index.tsx", ["./App.tsx"]),
        );

        let err = generator(&fs)
            .generate(&document, &sample_schema(), "/root/app", &PlaceholderContent)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "GRAPH-CYCLE");
        assert_eq!(err.offending_paths(), vec!["src/App.tsx", "src/index.tsx"]);
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_named_and_nothing_written() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(
            &FileManifest::new()
                .with_entry("src/App.tsx", ["./components/Header.tsx"])
                .with_entry("src/index.tsx", ["./App.tsx"]),
        );

        let err = generator(&fs)
            .generate(&document, &sample_schema(), "/root/app", &PlaceholderContent)
            .await
            .unwrap_err();

        assert_eq!(err.offending_paths(), vec!["src/components/Header.tsx"]);
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_paths_reported_together() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(
            &FileManifest::new()
                .with_entry("src/a b.tsx", ["./x//y"])
                .with_file("src/ok.tsx"),
        );

        let err = generator(&fs)
            .generate(&document, &sample_schema(), "/root/app", &PlaceholderContent)
            .await
            .unwrap_err();

        assert_eq!(err.offending_paths(), vec!["src/a b.tsx", "./x//y"]);
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_manifest() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let err = generator(&fs)
            .generate("just prose", &sample_schema(), "/root/app", &PlaceholderContent)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "MANIFEST-NOT-FOUND");
        assert!(err.hint().is_some());
    }

    #[tokio::test]
    async fn test_generate_writes_every_file_once() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(
            &FileManifest::new()
                .with_entry("src/index.tsx", ["./App.tsx"])
                .with_entry("src/App.tsx", ["./components/common/Button/index.tsx"])
                .with_file("src/components/common/Button/index.tsx"),
        );

        let report = generator(&fs)
            .generate(&document, &sample_schema(), "/root/app", &PlaceholderContent)
            .await
            .unwrap();

        assert_eq!(
            report.paths().collect::<Vec<_>>(),
            vec!["src/components/common/Button/index.tsx", "src/App.tsx", "src/index.tsx"]
        );
        assert_eq!(
            fs.read_string("/root/app/src/index.tsx").as_deref(),
            Some("// src/index.tsx\n// depends on: src/App.tsx\n")
        );
    }

    #[tokio::test]
    async fn test_non_canonical_key_written_once_after_its_dependency() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(
            &FileManifest::new()
                .with_entry("./src/App.tsx", ["./utils/format.ts"])
                .with_file("src/utils/format.ts")
                .with_entry("src/index.tsx", ["./App.tsx"]),
        );
        let generator = generator(&fs);

        let plan = generator.plan(&document, &sample_schema()).unwrap();
        assert_eq!(plan.order, vec!["src/utils/format.ts", "src/App.tsx", "src/index.tsx"]);
        assert!(plan.summary().implied.is_empty());

        let report = generator
            .materialize(&plan, "/root/app", &PlaceholderContent)
            .await
            .unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(fs.write_count(), 3);
    }

    #[test]
    fn test_keys_colliding_after_normalization_appear_once() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(
            &FileManifest::new()
                .with_entry("src/App.tsx", ["./utils/format.ts"])
                .with_entry("./src/App.tsx", ["./components/common/Loader/index.tsx"])
                .with_entry("src/utils/../App.tsx", Vec::<String>::new())
                .with_file("src/utils/format.ts")
                .with_file("src/components/common/Loader/index.tsx"),
        );

        let plan = generator(&fs).plan(&document, &sample_schema()).unwrap();

        let mut distinct = plan.order.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), plan.order.len());
        assert_eq!(plan.order.len(), 3);
        assert_eq!(plan.order.last().map(String::as_str), Some("src/App.tsx"));
        assert_dependencies_first(&plan.order, &plan.graph);
    }

    #[test]
    fn test_exact_strategy_rejects_directory_specifier() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let document = manifest_document(
            &FileManifest::new().with_entry("src/App.tsx", ["./components/common/Button"]),
        );

        let err = generator(&fs)
            .with_strategy(ExactResolution)
            .plan(&document, &sample_schema())
            .unwrap_err();

        assert_eq!(err.offending_paths(), vec!["src/components/common/Button"]);
    }
}
