//! Mock collaborators and stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::context::PipelineContext;
use crate::core::StageOutput;
use crate::errors::{GenflowError, ModelError};
use crate::model::ModelClient;
use crate::stages::Stage;

/// A model client that replays a script of responses and errors.
///
/// Once the script runs out it returns the fallback response, or an
/// unclassified error when none is set.
#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
    model_ids: Mutex<Vec<String>>,
}

impl ScriptedModelClient {
    /// Creates a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a successful response.
    #[must_use]
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.push_response(response);
        self
    }

    /// Appends a failure.
    #[must_use]
    pub fn with_error(self, error: ModelError) -> Self {
        self.push_error(error);
        self
    }

    /// Sets the response returned once the script is exhausted.
    #[must_use]
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Appends a successful response.
    pub fn push_response(&self, response: impl Into<String>) {
        self.script.lock().push_back(Ok(response.into()));
    }

    /// Appends a failure.
    pub fn push_error(&self, error: ModelError) {
        self.script.lock().push_back(Err(error));
    }

    /// Returns the number of completions requested.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Returns every prompt received, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Returns every model id requested, in order.
    #[must_use]
    pub fn model_ids(&self) -> Vec<String> {
        self.model_ids.lock().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<String, ModelError> {
        self.prompts.lock().push(prompt.to_string());
        self.model_ids.lock().push(model_id.to_string());

        let next = self.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| ModelError::other("script exhausted")),
        }
    }
}

/// A mock stage that records calls and returns a configurable output.
#[derive(Debug)]
pub struct MockStage {
    id: String,
    output: Mutex<StageOutput>,
    call_count: Mutex<usize>,
}

impl MockStage {
    /// Creates a new mock stage with a success output.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            output: Mutex::new(StageOutput::ok_empty()),
            call_count: Mutex::new(0),
        }
    }

    /// Sets the output to return.
    #[must_use]
    pub fn with_output(self, output: StageOutput) -> Self {
        *self.output.lock() = output;
        self
    }

    /// Sets the output to return.
    pub fn set_output(&self, output: StageOutput) {
        *self.output.lock() = output;
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, _ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        *self.call_count.lock() += 1;
        Ok(self.output.lock().clone())
    }
}

/// A stage that fails.
#[derive(Debug)]
pub struct FailingStage {
    id: String,
    error: String,
    raise: bool,
}

impl FailingStage {
    /// Creates a stage returning a failed output.
    #[must_use]
    pub fn new(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
            raise: false,
        }
    }

    /// Creates a stage returning an unclassified error.
    #[must_use]
    pub fn raising(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
            raise: true,
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, _ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        if self.raise {
            Err(GenflowError::Internal(self.error.clone()))
        } else {
            Ok(StageOutput::fail(&self.error))
        }
    }
}

/// A stage that raises scripted model errors before succeeding.
#[derive(Debug)]
pub struct FlakyStage {
    id: String,
    errors: Mutex<VecDeque<ModelError>>,
    call_count: Mutex<usize>,
}

impl FlakyStage {
    /// Creates a stage that succeeds immediately.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            errors: Mutex::new(VecDeque::new()),
            call_count: Mutex::new(0),
        }
    }

    /// Queues an error for the next call.
    #[must_use]
    pub fn fail_with(self, error: ModelError) -> Self {
        self.errors.lock().push_back(error);
        self
    }

    /// Queues `times` copies of an error.
    #[must_use]
    pub fn fail_times(self, times: usize, error: &ModelError) -> Self {
        self.errors
            .lock()
            .extend(std::iter::repeat(error.clone()).take(times));
        self
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Stage for FlakyStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, _ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        let call = {
            let mut count = self.call_count.lock();
            *count += 1;
            *count
        };
        let next = self.errors.lock().pop_front();
        match next {
            Some(err) => Err(err.into()),
            None => Ok(StageOutput::ok_value("calls", serde_json::json!(call))),
        }
    }
}

/// A stage that appends its id to a shared log.
#[derive(Debug)]
pub struct RecordingStage {
    id: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingStage {
    /// Creates a stage writing into `log`.
    #[must_use]
    pub fn new(id: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { id: id.into(), log }
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        self.log.lock().push(self.id.clone());
        ctx.set_data(format!("{}.ran", self.id), serde_json::json!(true));
        Ok(StageOutput::ok_value("position", serde_json::json!(self.log.lock().len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DisabledModelClient;

    fn ctx() -> PipelineContext {
        PipelineContext::new(Arc::new(DisabledModelClient))
    }

    #[tokio::test]
    async fn test_scripted_client_replays_in_order() {
        let client = ScriptedModelClient::new()
            .with_error(ModelError::timeout("t"))
            .with_response("ok")
            .with_fallback("again");

        assert!(client.complete("a", "m1").await.is_err());
        assert_eq!(client.complete("b", "m2").await.unwrap(), "ok");
        assert_eq!(client.complete("c", "m3").await.unwrap(), "again");
        assert_eq!(client.prompts(), vec!["a", "b", "c"]);
        assert_eq!(client.model_ids(), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_scripted_client_without_fallback() {
        let err = ScriptedModelClient::new().complete("a", "m").await.unwrap_err();
        assert!(!err.kind().is_retryable());
    }

    #[tokio::test]
    async fn test_mock_stage() {
        let stage = MockStage::new("test");
        let ctx = ctx();

        assert!(stage.run(&ctx).await.unwrap().is_success());
        stage.set_output(StageOutput::fail("error"));
        assert!(stage.run(&ctx).await.unwrap().is_failure());
        assert_eq!(stage.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let ctx = ctx();
        assert!(FailingStage::new("f", "bad").run(&ctx).await.unwrap().is_failure());
        assert!(!FailingStage::raising("f", "bad").run(&ctx).await.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_flaky_stage() {
        let stage = FlakyStage::new("flaky").fail_times(2, &ModelError::service_unavailable("503"));
        let ctx = ctx();

        assert!(stage.run(&ctx).await.unwrap_err().is_retryable());
        assert!(stage.run(&ctx).await.is_err());
        let output = stage.run(&ctx).await.unwrap();
        assert_eq!(output.get("calls"), Some(&serde_json::json!(3)));
    }

    #[tokio::test]
    async fn test_recording_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = ctx();

        RecordingStage::new("a", log.clone()).run(&ctx).await.unwrap();
        RecordingStage::new("b", log.clone()).run(&ctx).await.unwrap();

        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert_eq!(ctx.get_data("b.ran"), Some(serde_json::json!(true)));
    }
}
