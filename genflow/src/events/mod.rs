//! Lifecycle events for pipeline runs.
//!
//! Every [`PipelineContext`](crate::context::PipelineContext) owns one sink.
//! There is no process-wide sink, so concurrent runs never observe each
//! other's events.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event emitted when a pipeline run begins.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Event emitted when every stage succeeded.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Event emitted when a stage failure ended the run.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// Event emitted when the run observed cancellation.
pub const PIPELINE_CANCELLED: &str = "pipeline.cancelled";
/// Event emitted before a stage runs.
pub const STAGE_STARTED: &str = "stage.started";
/// Event emitted after a stage succeeded.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Event emitted after a stage failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// Event emitted before each retry sleep.
pub const RETRY_SCHEDULED: &str = "retry.scheduled";
/// Event emitted when retries are exhausted.
pub const RETRY_EXHAUSTED: &str = "retry.exhausted";
/// Event emitted after each file write.
pub const FILE_WRITTEN: &str = "file.written";
/// Event emitted when a partial materialization was rolled back.
pub const MATERIALIZE_ROLLED_BACK: &str = "materialize.rolled_back";
