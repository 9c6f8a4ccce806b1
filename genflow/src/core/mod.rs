//! Core domain types for stage results.

mod output;
mod status;

pub use output::StageOutput;
pub use status::StageStatus;
