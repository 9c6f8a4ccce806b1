//! Typed-error retry engine with configurable backoff.
//!
//! Only the transient [`ErrorKind`]s are retried. Counters are keyed by
//! `(operation, kind)` and live in one [`RetryEngine`] per pipeline run, so
//! concurrent runs never interleave their attempt counts.

use crate::cancellation::CancellationToken;
use crate::errors::{ErrorKind, GenflowError};
use crate::events::{self, EventSink, NoOpEventSink};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * (attempt + 1)
    #[default]
    Linear,
    /// delay = base * 2^attempt
    Exponential,
    /// delay = base
    Constant,
}

/// Jitter strategy applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
}

/// Retries performed before a transient error becomes terminal.
pub const MAX_RETRY: u32 = 3;

const fn default_max_retries() -> u32 {
    MAX_RETRY
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::Linear,
            jitter_strategy: JitterStrategy::None,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum retries.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub const fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Calculates the delay before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;

        let delay = match self.backoff_strategy {
            BackoffStrategy::Linear => base.saturating_mul(u64::from(attempt) + 1),
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(attempt)),
            BackoffStrategy::Constant => base,
        }
        .min(max);

        let jittered = match self.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Attempt counters keyed by operation and error kind.
#[derive(Debug, Default, Clone)]
pub struct RetryState {
    counters: HashMap<(String, ErrorKind), u32>,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter and returns its new value.
    pub fn increment(&mut self, operation: &str, kind: ErrorKind) -> u32 {
        let counter = self
            .counters
            .entry((operation.to_string(), kind))
            .or_insert(0);
        *counter += 1;
        *counter
    }

    /// Returns the current counter value.
    #[must_use]
    pub fn attempts(&self, operation: &str, kind: ErrorKind) -> u32 {
        self.counters
            .get(&(operation.to_string(), kind))
            .copied()
            .unwrap_or(0)
    }

    /// Clears one counter.
    pub fn clear(&mut self, operation: &str, kind: ErrorKind) {
        self.counters.remove(&(operation.to_string(), kind));
    }

    /// Returns true if no counter is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// Wraps fallible operations with typed-error classification and backoff.
pub struct RetryEngine {
    config: RetryConfig,
    state: Mutex<RetryState>,
    cancellation: Arc<CancellationToken>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for RetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryEngine")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryEngine {
    /// Creates an engine with its own cancellation token and no event sink.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RetryState::new()),
            cancellation: Arc::new(CancellationToken::new()),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the cancellation token raced against backoff sleeps.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets the event sink for retry events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the retry configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the live counter for an operation and kind.
    #[must_use]
    pub fn attempts(&self, operation: &str, kind: ErrorKind) -> u32 {
        self.state.lock().attempts(operation, kind)
    }

    /// Returns a copy of all live counters.
    #[must_use]
    pub fn state(&self) -> RetryState {
        self.state.lock().clone()
    }

    /// Runs `operation`, retrying transient failures.
    ///
    /// The first failure fixes the kind being retried. A retry that fails
    /// with a different kind aborts with [`GenflowError::RetryKindChanged`];
    /// running out of retries yields [`GenflowError::MaxRetriesExceeded`].
    /// Non-retryable errors are returned unchanged.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, GenflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenflowError>>,
    {
        let first = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let kind = first.kind();
        if !kind.is_retryable() {
            return Err(first);
        }

        let mut last = first;
        for attempt in 0..self.config.max_retries {
            let count = self.state.lock().increment(operation, kind);
            let delay = self.config.delay_for(attempt);

            debug!(
                operation = %operation,
                kind = %kind,
                attempt = count,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %last,
                "Retrying after transient error"
            );
            self.event_sink.emit(
                events::RETRY_SCHEDULED,
                serde_json::json!({
                    "operation": operation,
                    "kind": kind,
                    "attempt": count,
                    "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                }),
            );

            if let Err(cancelled) = self.sleep(delay).await {
                self.state.lock().clear(operation, kind);
                return Err(cancelled);
            }

            match op().await {
                Ok(value) => {
                    self.state.lock().clear(operation, kind);
                    return Ok(value);
                }
                Err(err) if err.kind() == kind => last = err,
                Err(err) => {
                    self.state.lock().clear(operation, kind);
                    warn!(
                        operation = %operation,
                        retrying = %kind,
                        encountered = %err.kind(),
                        "Retry aborted by a different error kind"
                    );
                    return Err(GenflowError::RetryKindChanged {
                        operation: operation.to_string(),
                        retrying: kind,
                        encountered: err.kind(),
                        attempts: count,
                        source: Box::new(err),
                    });
                }
            }
        }

        self.state.lock().clear(operation, kind);
        warn!(operation = %operation, kind = %kind, "Retries exhausted");
        self.event_sink.emit(
            events::RETRY_EXHAUSTED,
            serde_json::json!({
                "operation": operation,
                "kind": kind,
                "attempts": self.config.max_retries,
            }),
        );

        Err(GenflowError::MaxRetriesExceeded {
            operation: operation.to_string(),
            kind,
            attempts: self.config.max_retries,
            source: Box::new(last),
        })
    }

    async fn sleep(&self, delay: Duration) -> Result<(), GenflowError> {
        self.cancellation.check()?;
        tokio::select! {
            () = tokio::time::sleep(delay) => Ok(()),
            () = self.cancellation.cancelled() => self.cancellation.check(),
        }
    }
}
