//! Testing utilities for genflow pipelines.
//!
//! This module provides:
//! - Scripted model clients and mock stages
//! - An in-memory filesystem
//! - Schema and manifest fixtures
//! - Assertions for stage outputs and write orders

mod assertions;
mod fixtures;
mod memory_fs;
mod mocks;

pub use assertions::{
    assert_dependencies_first, assert_output_contains, assert_output_failed,
    assert_output_status, assert_output_succeeded, assert_output_value,
};
pub use fixtures::{
    fast_retry, manifest_document, sample_manifest, sample_schema, TestContext, SAMPLE_LISTING,
};
pub use memory_fs::{FsSnapshot, InMemoryFileSystem};
pub use mocks::{FailingStage, FlakyStage, MockStage, RecordingStage, ScriptedModelClient};
