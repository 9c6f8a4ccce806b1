//! Context management for pipeline execution.
//!
//! This module provides:
//! - The per-run [`PipelineContext`] shared by every stage
//! - Keyed value bags for stage data and outputs
//! - Run identity

mod bags;
mod execution;
mod identity;

pub use bags::{ContextBag, OutputBag};
pub use execution::PipelineContext;
pub use identity::RunIdentity;
