//! A stage that turns a manifest document into files.

use super::Stage;
use crate::config::GenflowConfig;
use crate::context::PipelineContext;
use crate::core::StageOutput;
use crate::errors::GenflowError;
use crate::fs::{FileSystem, ModelContentProducer, PlaceholderContent};
use crate::generate::ManifestGenerator;
use crate::schema::VirtualDirectory;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Where file bodies come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentSource {
    /// Deterministic headers naming each file and its dependencies.
    #[default]
    Placeholder,
    /// One model completion per file, optionally with a custom prompt.
    Model {
        /// Prompt template, the built-in one when `None`.
        template: Option<String>,
    },
}

/// Materializes the manifest found in a context document.
///
/// Reads the document from `document_key` and the tree listing from
/// `schema_key`, writes every file under `root` and stores the
/// [`MaterializationReport`](crate::fs::MaterializationReport) under
/// `report_key`.
pub struct MaterializeStage {
    id: String,
    document_key: String,
    schema_key: String,
    report_key: String,
    root: PathBuf,
    config: GenflowConfig,
    fs: Arc<dyn FileSystem>,
    content: ContentSource,
}

impl std::fmt::Debug for MaterializeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializeStage")
            .field("id", &self.id)
            .field("document_key", &self.document_key)
            .field("schema_key", &self.schema_key)
            .field("root", &self.root)
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl MaterializeStage {
    /// Creates a stage reading `document` and `schema` from the context.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            id: id.into(),
            document_key: "document".to_string(),
            schema_key: "schema".to_string(),
            report_key: "materialization".to_string(),
            root: root.into(),
            config: GenflowConfig::default(),
            fs,
            content: ContentSource::default(),
        }
    }

    /// Sets the context key holding the manifest document.
    #[must_use]
    pub fn with_document_key(mut self, key: impl Into<String>) -> Self {
        self.document_key = key.into();
        self
    }

    /// Sets the context key holding the tree listing.
    #[must_use]
    pub fn with_schema_key(mut self, key: impl Into<String>) -> Self {
        self.schema_key = key.into();
        self
    }

    /// Sets the context key the report is stored under.
    #[must_use]
    pub fn with_report_key(mut self, key: impl Into<String>) -> Self {
        self.report_key = key.into();
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: GenflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the content source.
    #[must_use]
    pub fn with_content(mut self, content: ContentSource) -> Self {
        self.content = content;
        self
    }
}

#[async_trait]
impl Stage for MaterializeStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        let document = ctx.require_str(&self.document_key)?;
        let schema = VirtualDirectory::parse(&ctx.require_str(&self.schema_key)?)?;

        let generator = ManifestGenerator::new(self.config.clone(), self.fs.clone())
            .with_cancellation(ctx.cancellation().clone())
            .with_event_sink(ctx.event_sink().clone());
        let plan = generator.plan(&document, &schema)?;

        let report = match &self.content {
            ContentSource::Placeholder => {
                generator.materialize(&plan, &self.root, &PlaceholderContent).await?
            }
            ContentSource::Model { template } => {
                let mut producer = ModelContentProducer::new(ctx, self.config.model_id.clone());
                if let Some(template) = template {
                    producer = producer.with_template(template.clone());
                }
                generator.materialize(&plan, &self.root, &producer).await?
            }
        };

        ctx.set_typed(self.report_key.clone(), &report)?;
        Ok(StageOutput::ok_value("files", serde_json::json!(report.len()))
            .with_value("order", serde_json::to_value(&plan.order)?))
    }
}
