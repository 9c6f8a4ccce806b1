//! Sequential pipeline execution.

use crate::context::PipelineContext;
use crate::core::{StageOutput, StageStatus};
use crate::errors::{ErrorSummary, GenflowError};
use crate::events;
use crate::stages::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Builder for a [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    /// Creates a builder for a named pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Appends a stage. Stages run in the order they are added.
    #[must_use]
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Appends a shared stage.
    #[must_use]
    pub fn shared_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validates and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`GenflowError::Validation`] for an empty pipeline or a
    /// repeated stage id.
    pub fn build(self) -> Result<Pipeline, GenflowError> {
        if self.stages.is_empty() {
            return Err(GenflowError::Validation(format!(
                "pipeline '{}' has no stages",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.id()) {
                return Err(GenflowError::Validation(format!(
                    "pipeline '{}' declares stage '{}' more than once",
                    self.name,
                    stage.id()
                )));
            }
        }

        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
        })
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
}

/// What happened to one stage during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage id.
    pub id: String,
    /// Final status.
    pub status: StageStatus,
    /// Calls made, including retries.
    pub attempts: u32,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// Wall time including backoff sleeps.
    pub duration_ms: f64,
    /// Failure message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Run id of the context.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// True if every stage succeeded.
    pub success: bool,
    /// Stages that started, in order.
    pub stages: Vec<StageRecord>,
    /// Context data at the end of the run.
    pub data: HashMap<String, serde_json::Value>,
    /// The error that ended the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total wall time.
    pub duration_ms: f64,
}

impl PipelineResult {
    /// Returns the record of a stage.
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|record| record.id == id)
    }

    /// Returns true if the run ended because of cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.code == "PIPELINE-CANCELLED")
    }
}

impl Pipeline {
    /// Returns a builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage ids in execution order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage in order against `ctx`.
    ///
    /// Stops at the first failed output, unrecoverable error or observed
    /// cancellation. Never panics on stage failure; the outcome is always
    /// described by the returned [`PipelineResult`].
    pub async fn run(&self, ctx: &PipelineContext) -> PipelineResult {
        let span = info_span!("pipeline", name = %self.name, run_id = %ctx.id());
        self.run_inner(ctx).instrument(span).await
    }

    async fn run_inner(&self, ctx: &PipelineContext) -> PipelineResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut records = Vec::with_capacity(self.stages.len());

        info!(stages = self.stages.len(), "Pipeline started");
        ctx.emit(
            events::PIPELINE_STARTED,
            serde_json::json!({ "pipeline": self.name, "stages": self.stage_ids() }),
        );

        let mut failure = None;
        for stage in &self.stages {
            if let Err(err) = ctx.cancellation().check() {
                failure = Some(err);
                break;
            }

            let (record, outcome) = run_stage(stage.as_ref(), ctx)
                .instrument(info_span!("stage", id = %stage.id()))
                .await;
            records.push(record);
            if let Err(err) = outcome {
                failure = Some(err);
                break;
            }
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let error = failure.map(|err| {
            let event = if matches!(err, GenflowError::Cancelled(_)) {
                events::PIPELINE_CANCELLED
            } else {
                events::PIPELINE_FAILED
            };
            warn!(code = err.code(), error = %err, "Pipeline stopped");
            let summary = err.summary();
            ctx.emit(
                event,
                serde_json::json!({ "pipeline": self.name, "error": summary, "duration_ms": duration_ms }),
            );
            summary
        });

        if error.is_none() {
            info!(duration_ms, "Pipeline completed");
            ctx.emit(
                events::PIPELINE_COMPLETED,
                serde_json::json!({ "pipeline": self.name, "duration_ms": duration_ms }),
            );
        }

        PipelineResult {
            run_id: ctx.id(),
            pipeline: self.name.clone(),
            success: error.is_none(),
            stages: records,
            data: ctx.data().to_dict(),
            error,
            started_at,
            duration_ms,
        }
    }
}

async fn run_stage(
    stage: &dyn Stage,
    ctx: &PipelineContext,
) -> (StageRecord, Result<(), GenflowError>) {
    let id = stage.id();
    let started_at = Utc::now();
    let start = Instant::now();
    ctx.emit(events::STAGE_STARTED, serde_json::json!({ "stage": id }));

    let mut attempts = 0_u32;
    let result = ctx
        .retry()
        .execute(id, || {
            attempts += 1;
            stage.run(ctx)
        })
        .await;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let outcome = match result {
        Ok(output) if output.is_success() => Ok(output),
        Ok(StageOutput { error, .. }) => Err(GenflowError::StageFailed {
            stage: id.to_string(),
            message: error.unwrap_or_else(|| "stage reported failure".to_string()),
        }),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(output) => {
            info!(stage = %id, status = %output.status, attempts, duration_ms, "Stage completed");
            ctx.emit(
                events::STAGE_COMPLETED,
                serde_json::json!({ "stage": id, "status": output.status, "attempts": attempts, "duration_ms": duration_ms }),
            );
            let record = StageRecord {
                id: id.to_string(),
                status: output.status,
                attempts,
                started_at,
                duration_ms,
                error: None,
            };
            ctx.outputs().record(id, output.data);
            (record, Ok(()))
        }
        Err(err) => {
            warn!(stage = %id, attempts, error = %err, "Stage failed");
            ctx.emit(
                events::STAGE_FAILED,
                serde_json::json!({ "stage": id, "code": err.code(), "error": err.to_string(), "attempts": attempts }),
            );
            let record = StageRecord {
                id: id.to_string(),
                status: StageStatus::Fail,
                attempts,
                started_at,
                duration_ms,
                error: Some(err.to_string()),
            };
            (record, Err(err))
        }
    }
}
