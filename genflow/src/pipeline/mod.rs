//! Pipeline building and execution.
//!
//! This module provides:
//! - The sequential [`Pipeline`] runner and its builder
//! - The per-run retry engine

mod retry;
mod runner;

pub use retry::{BackoffStrategy, JitterStrategy, RetryConfig, RetryEngine, RetryState, MAX_RETRY};
pub use runner::{Pipeline, PipelineBuilder, PipelineResult, StageRecord};
