//! A stage that asks the model for one completion.

use super::Stage;
use crate::context::PipelineContext;
use crate::core::StageOutput;
use crate::errors::GenflowError;
use crate::model::render_prompt;
use async_trait::async_trait;
use tracing::debug;

/// Renders a prompt from context data and stores the model's reply.
///
/// `{key}` placeholders are filled from the context; strings are inserted
/// verbatim and other values as JSON. The reply is written to the context
/// under `output_key` and returned as the stage's `response` value.
#[derive(Debug, Clone)]
pub struct CompletionStage {
    id: String,
    template: String,
    model_id: String,
    output_key: String,
}

impl CompletionStage {
    /// Creates a stage storing the reply under `output_key`.
    pub fn new(
        id: impl Into<String>,
        template: impl Into<String>,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            model_id: "default".to_string(),
            output_key: output_key.into(),
        }
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Returns the context key the reply is stored under.
    #[must_use]
    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    fn prompt(&self, ctx: &PipelineContext) -> String {
        render_prompt(&self.template, |key| {
            ctx.get_data(key).map(|value| match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        })
    }
}

#[async_trait]
impl Stage for CompletionStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        let prompt = self.prompt(ctx);
        debug!(stage = %self.id, model = %self.model_id, chars = prompt.len(), "Requesting completion");

        let response = ctx.model().complete(&prompt, &self.model_id).await?;
        ctx.set_data(self.output_key.clone(), serde_json::Value::String(response.clone()));
        Ok(StageOutput::ok_value("response", serde_json::Value::String(response)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, ModelError};
    use crate::testing::{assert_output_value, ScriptedModelClient, TestContext};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_renders_prompt_and_stores_reply() {
        let model = Arc::new(ScriptedModelClient::new().with_response("<file_manifest></file_manifest>"));
        let ctx = TestContext::new()
            .with_model(model.clone())
            .with_data("app", json!("a todo app"))
            .with_data("pages", json!(3))
            .build();

        let stage = CompletionStage::new("plan", "Plan {app} with {pages} pages.", "document")
            .with_model_id("planner");
        let output = stage.run(&ctx).await.unwrap();

        assert_eq!(model.prompts(), vec!["Plan a todo app with 3 pages."]);
        assert_eq!(model.model_ids(), vec!["planner"]);
        assert_output_value(&output, "response", &json!("<file_manifest></file_manifest>"));
        assert_eq!(ctx.require_str("document").unwrap(), "<file_manifest></file_manifest>");
    }

    #[tokio::test]
    async fn test_model_error_keeps_its_kind() {
        let model = Arc::new(ScriptedModelClient::new().with_error(ModelError::timeout("slow")));
        let ctx = TestContext::new().with_model(model).build();

        let err = CompletionStage::new("plan", "hi", "document")
            .run(&ctx)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(ctx.get_data("document").is_none());
    }
}
