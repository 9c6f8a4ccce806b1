//! Cooperative cancellation for pipeline runs.
//!
//! A [`CancellationToken`] is owned by each pipeline context and checked
//! between stages, between retries and between file writes.

mod token;

pub use token::CancellationToken;
