//! The mutable context shared by the stages of one pipeline run.

use super::{ContextBag, OutputBag, RunIdentity};
use crate::cancellation::CancellationToken;
use crate::errors::GenflowError;
use crate::events::{EventSink, NoOpEventSink};
use crate::model::ModelClient;
use crate::pipeline::{RetryConfig, RetryEngine};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// The context for a single pipeline run.
///
/// Created per build request and dropped when the run ends. It owns the
/// run's retry engine, cancellation token and event sink, so nothing is
/// shared between concurrent runs unless the caller shares it explicitly.
pub struct PipelineContext {
    run_id: RunIdentity,
    data: ContextBag,
    outputs: OutputBag,
    model: Arc<dyn ModelClient>,
    retry: RetryEngine,
    cancellation: Arc<CancellationToken>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("run_id", &self.run_id)
            .field("data_keys", &self.data.keys())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    /// Creates a new pipeline context around a model client.
    #[must_use]
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        let cancellation = Arc::new(CancellationToken::new());
        let event_sink: Arc<dyn EventSink> = Arc::new(NoOpEventSink);
        Self {
            run_id: RunIdentity::new(),
            data: ContextBag::new(),
            outputs: OutputBag::new(),
            model,
            retry: RetryEngine::new(RetryConfig::default())
                .with_cancellation(cancellation.clone())
                .with_event_sink(event_sink.clone()),
            cancellation,
            event_sink,
        }
    }

    /// Sets the run identity.
    #[must_use]
    pub fn with_run_id(mut self, run_id: RunIdentity) -> Self {
        self.run_id = run_id;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = self.build_retry(config);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self.retry = self.build_retry(self.retry.config().clone());
        self
    }

    /// Shares an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self.retry = self.build_retry(self.retry.config().clone());
        self
    }

    fn build_retry(&self, config: RetryConfig) -> RetryEngine {
        RetryEngine::new(config)
            .with_cancellation(self.cancellation.clone())
            .with_event_sink(self.event_sink.clone())
    }

    /// Returns the run identity.
    #[must_use]
    pub const fn run_id(&self) -> &RunIdentity {
        &self.run_id
    }

    /// Returns the unique id of this run.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.run_id.pipeline_run_id
    }

    /// Sets a named value, replacing any previous one.
    pub fn set_data(&self, key: impl Into<String>, value: serde_json::Value) {
        self.data.set(key, value);
    }

    /// Gets a named value.
    #[must_use]
    pub fn get_data(&self, key: &str) -> Option<serde_json::Value> {
        self.data.get(key)
    }

    /// Inserts a named value that must not exist yet.
    pub fn insert_data(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), GenflowError> {
        self.data.insert(key, value).map_err(GenflowError::from)
    }

    /// Serializes and stores a typed value.
    pub fn set_typed<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<(), GenflowError> {
        self.data.set(key, serde_json::to_value(value)?);
        Ok(())
    }

    /// Reads and deserializes a typed value, `Ok(None)` if absent.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, GenflowError> {
        self.data
            .get(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(GenflowError::from)
    }

    /// Reads a string value that a stage cannot run without.
    pub fn require_str(&self, key: &str) -> Result<String, GenflowError> {
        match self.data.get(key) {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(other) => Err(GenflowError::Serialization(format!(
                "context key '{key}' is not a string: {other}"
            ))),
            None => Err(GenflowError::MissingData {
                key: key.to_string(),
            }),
        }
    }

    /// Returns the keyed data bag.
    #[must_use]
    pub const fn data(&self) -> &ContextBag {
        &self.data
    }

    /// Returns the record of successful stage outputs.
    #[must_use]
    pub const fn outputs(&self) -> &OutputBag {
        &self.outputs
    }

    /// Returns the model-completion collaborator.
    #[must_use]
    pub fn model(&self) -> &Arc<dyn ModelClient> {
        &self.model
    }

    /// Returns the run's retry engine.
    #[must_use]
    pub const fn retry(&self) -> &RetryEngine {
        &self.retry
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Requests cancellation of the run.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancellation.cancel(reason);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Emits an event enriched with the run identity.
    pub fn emit(&self, event_type: &str, data: serde_json::Value) {
        let mut enriched = self.run_id.to_json();
        if let (serde_json::Value::Object(target), serde_json::Value::Object(extra)) =
            (&mut enriched, data)
        {
            target.extend(extra);
        }
        self.event_sink.emit(event_type, enriched);
    }
}
