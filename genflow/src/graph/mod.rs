//! File dependency graph.
//!
//! [`DependencyGraph::build`] resolves every manifest dependency against the
//! virtual directory, [`detect_cycles`] reports all cycles and
//! [`topological_order`] yields the write order.

mod builder;
mod resolution;
mod sort;

pub use builder::{DependencyEdge, DependencyGraph};
pub use resolution::{ExactResolution, IndexFileResolution, ResolutionStrategy};
pub use sort::{detect_cycles, topological_order};

use crate::errors::{CycleDetectedError, GenflowError};

/// Fails with every cycle of `graph`, if any.
pub fn ensure_acyclic(graph: &DependencyGraph) -> Result<(), GenflowError> {
    let cycles = detect_cycles(graph);
    if cycles.is_empty() {
        Ok(())
    } else {
        Err(CycleDetectedError::new(cycles).into())
    }
}
