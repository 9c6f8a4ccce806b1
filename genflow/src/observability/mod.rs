//! Observability utilities.
//!
//! Spans and log lines come from `tracing` throughout the crate; this
//! module only installs the subscriber.

mod logging;

pub use logging::{init_logging, LogFormat, ENV_LOG};
