//! Content producers for materialized files.

use crate::context::PipelineContext;
use crate::errors::GenflowError;
use crate::manifest::strip_fence;
use crate::model::render_prompt;
use async_trait::async_trait;
use serde::Serialize;

/// A file to produce, with its resolved dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRequest {
    /// Project-root-relative path.
    pub path: String,
    /// Files this one depends on, all written before it.
    pub dependencies: Vec<String>,
}

impl FileRequest {
    /// Creates a request.
    pub fn new<I, S>(path: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        }
    }
}

/// Produces the body of each materialized file.
#[async_trait]
pub trait ContentProducer: Send + Sync {
    /// Returns the content for `request`.
    async fn produce(&self, request: &FileRequest) -> Result<String, GenflowError>;
}

/// Writes a deterministic header naming the file and its dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderContent;

impl PlaceholderContent {
    fn comment(path: &str, line: &str) -> String {
        let ext = path.rsplit_once('.').map_or("", |(_, ext)| ext);
        match ext {
            "py" | "sh" | "rb" | "toml" | "yaml" | "yml" | "txt" | "gitignore" | "env" => {
                format!("# {line}\n")
            }
            "css" | "scss" => format!("/* {line} */\n"),
            "html" | "md" | "xml" | "svg" => format!("<!-- {line} -->\n"),
            _ => format!("// {line}\n"),
        }
    }
}

#[async_trait]
impl ContentProducer for PlaceholderContent {
    async fn produce(&self, request: &FileRequest) -> Result<String, GenflowError> {
        if request.path.ends_with(".json") {
            return Ok("{}\n".to_string());
        }

        let mut out = Self::comment(&request.path, &request.path);
        if !request.dependencies.is_empty() {
            let deps = request.dependencies.join(", ");
            out.push_str(&Self::comment(&request.path, &format!("depends on: {deps}")));
        }
        Ok(out)
    }
}

/// Default prompt for [`ModelContentProducer`].
pub const DEFAULT_FILE_PROMPT: &str = "Write the complete contents of the file `{path}`.\n\
It may import from these files, which already exist: {dependencies}.\n\
Reply with the file contents only.";

/// Asks the model for each file, one completion per file.
///
/// Calls go through the run's retry engine keyed by the file path, so a
/// transient failure on one file never counts against another.
pub struct ModelContentProducer<'a> {
    ctx: &'a PipelineContext,
    model_id: String,
    template: String,
}

impl<'a> ModelContentProducer<'a> {
    /// Creates a producer using the default prompt.
    pub fn new(ctx: &'a PipelineContext, model_id: impl Into<String>) -> Self {
        Self {
            ctx,
            model_id: model_id.into(),
            template: DEFAULT_FILE_PROMPT.to_string(),
        }
    }

    /// Sets the prompt template.
    ///
    /// `{path}` and `{dependencies}` name the file; other placeholders are
    /// filled from context data.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    fn prompt(&self, request: &FileRequest) -> String {
        render_prompt(&self.template, |key| match key {
            "path" => Some(request.path.clone()),
            "dependencies" if request.dependencies.is_empty() => Some("none".to_string()),
            "dependencies" => Some(request.dependencies.join(", ")),
            other => self.ctx.get_data(other).map(|value| match value {
                serde_json::Value::String(s) => s,
                v => v.to_string(),
            }),
        })
    }
}

#[async_trait]
impl ContentProducer for ModelContentProducer<'_> {
    async fn produce(&self, request: &FileRequest) -> Result<String, GenflowError> {
        let prompt = self.prompt(request);
        let response = self
            .ctx
            .retry()
            .execute(&request.path, || async {
                self.ctx
                    .model()
                    .complete(&prompt, &self.model_id)
                    .await
                    .map_err(GenflowError::from)
            })
            .await?;

        let mut body = strip_fence(&response).to_string();
        body.push('\n');
        Ok(body)
    }
}
