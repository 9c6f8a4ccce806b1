//! Test assertions for stage outputs and write orders.

use crate::core::{StageOutput, StageStatus};
use crate::graph::DependencyGraph;
use std::collections::HashMap;

/// Asserts that the output indicates success.
pub fn assert_output_succeeded(output: &StageOutput) {
    assert!(
        output.is_success(),
        "Expected success, got status: {:?} ({:?})",
        output.status,
        output.error
    );
}

/// Asserts that the output indicates failure.
pub fn assert_output_failed(output: &StageOutput) {
    assert!(
        output.is_failure(),
        "Expected failure, got status: {:?}",
        output.status
    );
}

/// Asserts that the output has the expected status.
pub fn assert_output_status(output: &StageOutput, expected: StageStatus) {
    assert_eq!(
        output.status, expected,
        "Expected status {:?}, got {:?}",
        expected, output.status
    );
}

/// Asserts that the output contains a specific key.
pub fn assert_output_contains(output: &StageOutput, key: &str) {
    assert!(
        output.get(key).is_some(),
        "Expected output to contain key '{key}'. Keys: {:?}",
        output.data.keys().collect::<Vec<_>>()
    );
}

/// Asserts that the output data contains a specific value.
pub fn assert_output_value(output: &StageOutput, key: &str, expected: &serde_json::Value) {
    let actual = output.get(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected value {expected:?} for key '{key}', got {actual:?}"
    );
}

/// Asserts that `order` lists every graph node exactly once, each after
/// all of its dependencies.
pub fn assert_dependencies_first(order: &[String], graph: &DependencyGraph) {
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(idx, path)| (path.as_str(), idx))
        .collect();

    assert_eq!(position.len(), order.len(), "Duplicate entries in {order:?}");
    assert_eq!(
        order.len(),
        graph.len(),
        "Expected {} nodes, got {order:?}",
        graph.len()
    );

    for edge in graph.edges() {
        let dependency = position.get(edge.dependency.as_str());
        let dependent = position.get(edge.dependent.as_str());
        assert!(
            matches!((dependency, dependent), (Some(a), Some(b)) if a < b),
            "Expected '{}' before '{}' in {order:?}",
            edge.dependency,
            edge.dependent
        );
    }
}
