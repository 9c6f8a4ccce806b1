//! # Genflow
//!
//! Staged, model-driven project generation.
//!
//! Genflow runs a sequence of stages over a shared context. A planning stage
//! asks a generative model for a document that embeds a file manifest; a
//! materialization stage validates that manifest against a declared
//! directory layout and writes every file, dependencies first, under a
//! project root.
//!
//! - **Sequential stages**: stages run strictly in declared order
//! - **Typed retries**: transient model errors are retried with linear backoff
//! - **Validated manifests**: bad paths, missing files and cycles are all
//!   reported before anything is written
//! - **Safe writes**: every target must stay inside the project root, and a
//!   failed materialization is rolled back
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use genflow::prelude::*;
//!
//! let pipeline = Pipeline::builder("scaffold")
//!     .stage(CompletionStage::new("plan", "Plan {app} using:\n{schema}", "document"))
//!     .stage(MaterializeStage::new("write", "./out", Arc::new(LocalFileSystem::new())))
//!     .build()?;
//!
//! let ctx = PipelineContext::new(model);
//! ctx.set_data("app", "a todo list".into());
//! ctx.set_data("schema", listing.into());
//! let result = pipeline.run(&ctx).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod fs;
pub mod generate;
pub mod graph;
pub mod manifest;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod schema;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::GenflowConfig;
    pub use crate::context::{PipelineContext, RunIdentity};
    pub use crate::core::{StageOutput, StageStatus};
    pub use crate::errors::{ErrorKind, ErrorSummary, GenflowError, ModelError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::fs::{FileSystem, LocalFileSystem, PlaceholderContent};
    pub use crate::generate::ManifestGenerator;
    pub use crate::manifest::FileManifest;
    pub use crate::model::ModelClient;
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineResult, RetryConfig};
    pub use crate::schema::VirtualDirectory;
    pub use crate::stages::{CompletionStage, ContentSource, MaterializeStage, Stage};
}
