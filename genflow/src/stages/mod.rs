//! Stage trait and implementations.
//!
//! Stages are the units of work of a genflow pipeline. Each one reads and
//! writes the shared [`PipelineContext`].

mod completion;
mod materialize;

pub use completion::CompletionStage;
pub use materialize::{ContentSource, MaterializeStage};

use crate::context::PipelineContext;
use crate::core::StageOutput;
use crate::errors::GenflowError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;

/// Trait for pipeline stages.
///
/// `Ok(StageOutput)` reports the stage's own verdict; a failed output stops
/// the pipeline without retry. `Err` is routed through the run's retry
/// engine, which retries transient model errors.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the stable id of the stage.
    fn id(&self) -> &str;

    /// Returns the display name of the stage.
    fn name(&self) -> &str {
        self.id()
    }

    /// Runs the stage.
    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, GenflowError>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&PipelineContext) -> Result<StageOutput, GenflowError> + Send + Sync,
{
    id: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&PipelineContext) -> Result<StageOutput, GenflowError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(id: impl Into<String>, func: F) -> Self {
        Self {
            id: id.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&PipelineContext) -> Result<StageOutput, GenflowError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&PipelineContext) -> Result<StageOutput, GenflowError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        (self.func)(ctx)
    }
}

/// An async function-based stage.
///
/// ```rust,ignore
/// let stage = AsyncFnStage::new("fetch", |ctx| Box::pin(async move {
///     let text = ctx.model().complete("hello", "small").await?;
///     Ok(StageOutput::ok_value("text", text.into()))
/// }));
/// ```
pub struct AsyncFnStage<F>
where
    F: for<'a> Fn(&'a PipelineContext) -> BoxFuture<'a, Result<StageOutput, GenflowError>>
        + Send
        + Sync,
{
    id: String,
    func: F,
}

impl<F> AsyncFnStage<F>
where
    F: for<'a> Fn(&'a PipelineContext) -> BoxFuture<'a, Result<StageOutput, GenflowError>>
        + Send
        + Sync,
{
    /// Creates a new async function-based stage.
    pub fn new(id: impl Into<String>, func: F) -> Self {
        Self {
            id: id.into(),
            func,
        }
    }
}

impl<F> Debug for AsyncFnStage<F>
where
    F: for<'a> Fn(&'a PipelineContext) -> BoxFuture<'a, Result<StageOutput, GenflowError>>
        + Send
        + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for AsyncFnStage<F>
where
    F: for<'a> Fn(&'a PipelineContext) -> BoxFuture<'a, Result<StageOutput, GenflowError>>
        + Send
        + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        (self.func)(ctx).await
    }
}

/// A stage that does nothing.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    id: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, _ctx: &PipelineContext) -> Result<StageOutput, GenflowError> {
        Ok(StageOutput::ok_empty())
    }
}
