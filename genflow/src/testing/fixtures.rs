//! Shared fixtures for genflow tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::PipelineContext;
use crate::events::EventSink;
use crate::manifest::{FileManifest, DEFAULT_CLOSE_TAG, DEFAULT_OPEN_TAG};
use crate::model::{DisabledModelClient, ModelClient};
use crate::pipeline::{BackoffStrategy, RetryConfig};
use crate::schema::VirtualDirectory;

/// A small React-style project layout.
pub const SAMPLE_LISTING: &str = "\
src/
├── components/
│   └── common/
│       ├── Button/
│       │   └── index.tsx
│       └── Loader/
│           └── index.tsx
├── utils/
│   └── format.ts
├── App.tsx
└── index.tsx
";

/// Parses [`SAMPLE_LISTING`].
///
/// # Panics
///
/// Never, the listing is well formed.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sample_schema() -> VirtualDirectory {
    VirtualDirectory::parse(SAMPLE_LISTING).expect("sample listing parses")
}

/// A manifest covering every file of [`sample_schema`].
#[must_use]
pub fn sample_manifest() -> FileManifest {
    FileManifest::new()
        .with_entry("src/index.tsx", ["./App.tsx"])
        .with_entry("src/App.tsx", ["./components/common/Button", "./utils/format.ts"])
        .with_entry("src/components/common/Button/index.tsx", ["../Loader/index.tsx"])
        .with_file("src/components/common/Loader/index.tsx")
        .with_file("src/utils/format.ts")
}

/// Wraps `manifest` in a model-style document using the default tags.
#[must_use]
pub fn manifest_document(manifest: &FileManifest) -> String {
    let body = serde_json::to_string_pretty(&manifest.to_json()).unwrap_or_default();
    format!(
        "Here is the plan for your project.\n\n{DEFAULT_OPEN_TAG}\n```json\n{body}\n```\n{DEFAULT_CLOSE_TAG}\n\nLet me know if anything should change.\n"
    )
}

/// A retry policy with millisecond delays.
#[must_use]
pub fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_base_delay_ms(1)
        .with_max_delay_ms(5)
        .with_backoff(BackoffStrategy::Linear)
}

/// Builder for a [`PipelineContext`] under test.
pub struct TestContext {
    data: HashMap<String, serde_json::Value>,
    model: Arc<dyn ModelClient>,
    retry: RetryConfig,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("data", &self.data)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self {
            data: HashMap::new(),
            model: Arc::new(DisabledModelClient),
            retry: fast_retry(),
            event_sink: None,
        }
    }
}

impl TestContext {
    /// Creates a builder with a disabled model and fast retries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a context value.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Sets the model client.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = model;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> PipelineContext {
        let mut ctx = PipelineContext::new(self.model).with_retry_config(self.retry);
        if let Some(sink) = self.event_sink {
            ctx = ctx.with_event_sink(sink);
        }
        for (key, value) in self.data {
            ctx.set_data(key, value);
        }
        ctx
    }
}
