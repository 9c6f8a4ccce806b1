//! Error types for the genflow framework.
//!
//! Errors are a closed taxonomy. Every [`GenflowError`] maps to an
//! [`ErrorKind`], which is what the retry engine matches on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The model call timed out.
    Timeout,
    /// The model service is temporarily unavailable.
    ServiceUnavailable,
    /// The model service rejected the call due to rate limiting.
    RateLimitExceeded,
    /// The model responded with something that could not be parsed.
    ResponseParsing,
    /// Anything else. Never retried.
    Unclassified,
}

impl ErrorKind {
    /// Returns true for the transient kinds the retry engine handles.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::Unclassified)
    }

    /// Returns the stable snake_case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ServiceUnavailable => "service_unavailable",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::ResponseParsing => "response_parsing",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reported by a model-completion collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The request timed out.
    #[error("Model request timed out: {message}")]
    Timeout {
        /// Provider message.
        message: String,
    },

    /// The service is temporarily unavailable.
    #[error("Model service temporarily unavailable: {message}")]
    ServiceUnavailable {
        /// Provider message.
        message: String,
    },

    /// The caller is being rate limited.
    #[error("Model rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Provider message.
        message: String,
    },

    /// The response could not be parsed.
    #[error("Failed to parse model response: {message}")]
    ResponseParsing {
        /// Parser message.
        message: String,
    },

    /// Any other provider failure.
    #[error("Model error: {message}")]
    Other {
        /// Provider message.
        message: String,
    },
}

impl ModelError {
    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a service-unavailable error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates a rate-limit error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimitExceeded {
            message: message.into(),
        }
    }

    /// Creates a response-parsing error.
    #[must_use]
    pub fn response_parsing(message: impl Into<String>) -> Self {
        Self::ResponseParsing {
            message: message.into(),
        }
    }

    /// Creates an unclassified provider error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns the retry classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Self::ResponseParsing { .. } => ErrorKind::ResponseParsing,
            Self::Other { .. } => ErrorKind::Unclassified,
        }
    }
}

/// Errors raised while locating or decoding the embedded manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// The document has no manifest block.
    #[error("No manifest found: expected a block delimited by '{open_tag}' and '{close_tag}'")]
    NotFound {
        /// Opening sentinel.
        open_tag: String,
        /// Closing sentinel.
        close_tag: String,
    },

    /// The opening sentinel has no matching closing sentinel.
    #[error("Manifest block opened with '{open_tag}' is never closed")]
    Unterminated {
        /// Opening sentinel.
        open_tag: String,
    },

    /// More than one manifest block was found.
    #[error("Expected exactly one manifest block, found {count}")]
    MultipleBlocks {
        /// Number of blocks found.
        count: usize,
    },

    /// The block body is not a valid manifest.
    #[error("Invalid manifest: {message}")]
    Invalid {
        /// Decoder message.
        message: String,
    },
}

/// Errors raised while parsing or querying a virtual directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The listing contains no entries.
    #[error("Directory listing is empty")]
    Empty,

    /// A branch entry appeared before any root line.
    #[error("Line {line}: entry '{name}' appears before the root directory")]
    MissingRoot {
        /// 1-based line number.
        line: usize,
        /// Entry name.
        name: String,
    },

    /// A second unprefixed entry was found.
    #[error("Line {line}: second root entry '{name}'")]
    MultipleRoots {
        /// 1-based line number.
        line: usize,
        /// Entry name.
        name: String,
    },

    /// An entry is nested deeper than any open directory.
    #[error("Line {line}: entry '{name}' is nested below a file or a missing directory")]
    Orphan {
        /// 1-based line number.
        line: usize,
        /// Entry name.
        name: String,
    },

    /// The same name is declared as a file and as a directory.
    #[error("Line {line}: '{name}' is declared both as a file and as a directory")]
    ConflictingEntry {
        /// 1-based line number.
        line: usize,
        /// Entry name.
        name: String,
    },

    /// A relative specifier climbs above the top of the tree.
    #[error("Path '{specifier}' relative to '{from}' escapes the directory root")]
    EscapesRoot {
        /// The specifier being resolved.
        specifier: String,
        /// The referencing file.
        from: String,
    },
}

/// A manifest path rejected by the syntax check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidPath {
    /// The offending path as written.
    pub path: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for InvalidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.path, self.reason)
    }
}

/// A graph node that does not exist as a file in the virtual directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingReference {
    /// The canonical path that was not found.
    pub path: String,
    /// The manifest entry that referenced it, if it came from a dependency.
    pub referenced_by: Option<String>,
}

impl fmt::Display for MissingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.referenced_by {
            Some(from) => write!(f, "'{}' (required by '{}')", self.path, from),
            None => write!(f, "'{}'", self.path),
        }
    }
}

/// Error raised when the dependency graph contains cycles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Dependency cycle detected: {}", render_cycles(.cycles))]
pub struct CycleDetectedError {
    /// Every distinct cycle found, each closed (first node repeated last).
    pub cycles: Vec<Vec<String>>,
}

impl CycleDetectedError {
    /// Creates a new cycle error.
    #[must_use]
    pub fn new(cycles: Vec<Vec<String>>) -> Self {
        Self { cycles }
    }

    /// Returns every node taking part in a cycle, without duplicates.
    #[must_use]
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = Vec::new();
        for node in self.cycles.iter().flatten() {
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        }
        nodes
    }
}

fn render_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| cycle.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error raised when a write target escapes its declared root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unauthorized access: '{}' resolves outside root '{}'", .candidate.display(), .root.display())]
pub struct UnauthorizedAccessError {
    /// The declared root.
    pub root: PathBuf,
    /// The rejected candidate path.
    pub candidate: PathBuf,
}

impl UnauthorizedAccessError {
    /// Creates a new unauthorized access error.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, candidate: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            candidate: candidate.into(),
        }
    }
}

/// Error raised when inserting an existing key into a context bag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Data conflict: key '{key}' already exists")]
pub struct DataConflictError {
    /// The conflicting key.
    pub key: String,
}

impl DataConflictError {
    /// Creates a new data conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// The main error type for genflow operations.
#[derive(Debug, Error)]
pub enum GenflowError {
    /// A model call failed.
    #[error("{0}")]
    Model(#[from] ModelError),

    /// The manifest could not be extracted or decoded.
    #[error("{0}")]
    Manifest(#[from] ManifestError),

    /// The virtual directory listing is malformed.
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// One or more manifest paths failed the syntax check.
    #[error("Invalid manifest paths: {}", join_display(.paths))]
    InvalidPaths {
        /// Every rejected path.
        paths: Vec<InvalidPath>,
    },

    /// One or more graph nodes are absent from the virtual directory.
    #[error("Manifest references files missing from the virtual directory: {}", join_display(.missing))]
    UnresolvedReferences {
        /// Every missing reference.
        missing: Vec<MissingReference>,
    },

    /// The dependency graph has cycles.
    #[error("{0}")]
    Cycle(#[from] CycleDetectedError),

    /// A write target escapes the project root.
    #[error("{0}")]
    UnauthorizedAccess(#[from] UnauthorizedAccessError),

    /// A context key was inserted twice.
    #[error("{0}")]
    DataConflict(#[from] DataConflictError),

    /// A retryable error persisted through every retry.
    #[error("Operation '{operation}' failed after {attempts} retries on {kind} errors: {source}")]
    MaxRetriesExceeded {
        /// Retry operation key.
        operation: String,
        /// The kind being retried.
        kind: ErrorKind,
        /// Retries performed.
        attempts: u32,
        /// The last error seen.
        #[source]
        source: Box<GenflowError>,
    },

    /// A retry attempt failed with a different kind than the one being retried.
    #[error("Operation '{operation}' aborted on retry {attempts}: retrying {retrying} errors but got {encountered}: {source}")]
    RetryKindChanged {
        /// Retry operation key.
        operation: String,
        /// The kind being retried.
        retrying: ErrorKind,
        /// The kind that interrupted the loop.
        encountered: ErrorKind,
        /// Retries performed, including the interrupted one.
        attempts: u32,
        /// The interrupting error.
        #[source]
        source: Box<GenflowError>,
    },

    /// A stage reported failure.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed {
        /// Stage id.
        stage: String,
        /// Failure message.
        message: String,
    },

    /// A pipeline definition is invalid.
    #[error("Pipeline validation failed: {0}")]
    Validation(String),

    /// The run was cancelled.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// A stage expected a context key that was not set.
    #[error("Missing context data: '{key}'")]
    MissingData {
        /// The absent key.
        key: String,
    },

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A filesystem call failed.
    #[error("IO error at '{}': {source}", .path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<serde_json::Error> for GenflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl GenflowError {
    /// Wraps an IO error with the path it concerns.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the retry classification of this error.
    ///
    /// Terminal retry errors are unclassified so an outer retry loop never
    /// restarts an exhausted inner one.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Model(err) => err.kind(),
            _ => ErrorKind::Unclassified,
        }
    }

    /// Returns true if the retry engine should retry this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Returns true for validation failures raised before any filesystem mutation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Manifest(_)
                | Self::Schema(_)
                | Self::InvalidPaths { .. }
                | Self::UnresolvedReferences { .. }
                | Self::Cycle(_)
        )
    }

    /// Returns a stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Model(err) => match err {
                ModelError::Timeout { .. } => "MODEL-TIMEOUT",
                ModelError::ServiceUnavailable { .. } => "MODEL-UNAVAILABLE",
                ModelError::RateLimitExceeded { .. } => "MODEL-RATE-LIMIT",
                ModelError::ResponseParsing { .. } => "MODEL-PARSE",
                ModelError::Other { .. } => "MODEL-OTHER",
            },
            Self::Manifest(err) => match err {
                ManifestError::NotFound { .. } => "MANIFEST-NOT-FOUND",
                ManifestError::Unterminated { .. } => "MANIFEST-UNTERMINATED",
                ManifestError::MultipleBlocks { .. } => "MANIFEST-MULTIPLE",
                ManifestError::Invalid { .. } => "MANIFEST-INVALID",
            },
            Self::Schema(_) => "SCHEMA-INVALID",
            Self::InvalidPaths { .. } => "MANIFEST-INVALID-PATH",
            Self::UnresolvedReferences { .. } => "GRAPH-MISSING-FILE",
            Self::Cycle(_) => "GRAPH-CYCLE",
            Self::UnauthorizedAccess(_) => "FS-UNAUTHORIZED",
            Self::DataConflict(_) => "CONTEXT-CONFLICT",
            Self::MaxRetriesExceeded { .. } => "RETRY-EXHAUSTED",
            Self::RetryKindChanged { .. } => "RETRY-KIND-CHANGED",
            Self::StageFailed { .. } => "STAGE-FAILED",
            Self::Validation(_) => "PIPELINE-INVALID",
            Self::Cancelled(_) => "PIPELINE-CANCELLED",
            Self::MissingData { .. } => "CONTEXT-MISSING",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Io { .. } => "FS-IO",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Returns a hint for fixing the error, if one is known.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Manifest(ManifestError::NotFound { .. }) => {
                Some("Ask the model to wrap the JSON file manifest in the manifest tags.")
            }
            Self::UnresolvedReferences { .. } => Some(
                "Every manifest key and dependency must name a file declared in the directory listing.",
            ),
            Self::Cycle(_) => Some("Remove one of the dependencies in each cycle to break it."),
            Self::UnauthorizedAccess(_) => {
                Some("Manifest paths must stay inside the project root.")
            }
            _ => None,
        }
    }

    /// Returns the paths this error is about, if any.
    #[must_use]
    pub fn offending_paths(&self) -> Vec<String> {
        match self {
            Self::InvalidPaths { paths } => paths.iter().map(|p| p.path.clone()).collect(),
            Self::UnresolvedReferences { missing } => {
                missing.iter().map(|m| m.path.clone()).collect()
            }
            Self::Cycle(err) => err.nodes(),
            Self::UnauthorizedAccess(err) => vec![err.candidate.display().to_string()],
            Self::Io { path, .. } => vec![path.display().to_string()],
            Self::MaxRetriesExceeded { source, .. } | Self::RetryKindChanged { source, .. } => {
                source.offending_paths()
            }
            _ => Vec::new(),
        }
    }

    /// Returns a serializable summary of this error.
    #[must_use]
    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary {
            kind: self.kind(),
            code: self.code().to_string(),
            message: self.to_string(),
            paths: self.offending_paths(),
            hint: self.hint().map(str::to_string),
        }
    }
}

/// Serializable view of a [`GenflowError`] carried by pipeline results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Retry classification.
    pub kind: ErrorKind,
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Offending paths, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    /// Fix hint, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
