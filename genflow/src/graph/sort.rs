//! Cycle detection and dependency-first ordering.

use super::builder::DependencyGraph;
use crate::errors::CycleDetectedError;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Finds every distinct cycle of `graph`.
///
/// Each cycle follows "depends on" edges and is closed, e.g.
/// `["a.ts", "b.ts", "a.ts"]` when `a.ts` and `b.ts` import each other.
/// The search always runs over the whole graph.
#[must_use]
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let count = graph.len();
    let mut colour = vec![Colour::White; count];
    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();

    for start in 0..count {
        if colour[start] != Colour::White {
            continue;
        }

        // (node, index of the next dependency to visit)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        colour[start] = Colour::Grey;

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            frame.1 += 1;

            let dependencies = graph
                .node_at(node)
                .map(|path| graph.dependencies_of(path))
                .unwrap_or_default();
            let Some(dependency) = dependencies.get(next) else {
                colour[node] = Colour::Black;
                stack.pop();
                continue;
            };

            let Some(target) = graph.index_of(dependency) else {
                continue;
            };
            match colour[target] {
                Colour::White => {
                    colour[target] = Colour::Grey;
                    stack.push((target, 0));
                }
                Colour::Grey => {
                    let from = stack.iter().position(|(n, _)| *n == target).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[from..]
                        .iter()
                        .filter_map(|(n, _)| graph.node_at(*n).map(ToString::to_string))
                        .collect();
                    if seen.insert(canonical_rotation(&cycle)) {
                        cycle.push(dependency.clone());
                        cycles.push(cycle);
                    }
                }
                Colour::Black => {}
            }
        }
    }

    cycles
}

fn canonical_rotation(cycle: &[String]) -> Vec<String> {
    let pivot = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, node)| *node)
        .map_or(0, |(idx, _)| idx);
    cycle[pivot..].iter().chain(&cycle[..pivot]).cloned().collect()
}

/// Orders every node so that each dependency precedes its dependents.
///
/// Kahn's algorithm seeded in node insertion order: nodes without
/// dependencies, including isolated ones, keep their relative order.
///
/// # Errors
///
/// Returns every cycle of the graph when no complete order exists.
pub fn topological_order(graph: &DependencyGraph) -> Result<Vec<String>, CycleDetectedError> {
    let mut remaining: Vec<usize> = graph
        .nodes()
        .map(|path| graph.dependencies_of(path).len())
        .collect();
    let mut ready: VecDeque<&str> = graph
        .nodes()
        .zip(&remaining)
        .filter(|(_, pending)| **pending == 0)
        .map(|(path, _)| path)
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(graph.len());

    while let Some(path) = ready.pop_front() {
        order.push(path.to_string());
        for dependent in graph.dependents_of(path) {
            let Some(idx) = graph.index_of(dependent) else {
                continue;
            };
            remaining[idx] -= 1;
            if remaining[idx] == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        Err(CycleDetectedError::new(detect_cycles(graph)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph(edges: &[(&str, &str)], isolated: &[&str]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (dependency, dependent) in edges {
            graph.add_edge(dependency, dependent);
        }
        for node in isolated {
            graph.add_node(node);
        }
        graph
    }

    fn position(order: &[String], node: &str) -> usize {
        order.iter().position(|n| n == node).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let graph = graph(&[("b", "a"), ("c", "a"), ("d", "b"), ("d", "c")], &["z"]);
        let order = topological_order(&graph).unwrap();

        assert_eq!(order.len(), 5);
        for edge in graph.edges() {
            assert!(position(&order, &edge.dependency) < position(&order, &edge.dependent));
        }
    }

    #[test]
    fn test_isolated_nodes_keep_insertion_order() {
        let graph = graph(&[], &["c", "a", "b"]);
        assert_eq!(topological_order(&graph).unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_empty_graph() {
        assert!(topological_order(&DependencyGraph::new()).unwrap().is_empty());
        assert!(detect_cycles(&DependencyGraph::new()).is_empty());
    }

    #[test]
    fn test_two_node_cycle() {
        // a depends on b and b depends on a.
        let graph = graph(&[("b", "a"), ("a", "b")], &[]);

        assert_eq!(detect_cycles(&graph), vec![vec!["b", "a", "b"]]);
        let err = topological_order(&graph).unwrap_err();
        assert_eq!(err.nodes(), vec!["b", "a"]);
    }

    #[test]
    fn test_every_cycle_is_reported() {
        let graph = graph(
            &[("y", "x"), ("x", "y"), ("q", "p"), ("r", "q"), ("p", "r"), ("ok", "x")],
            &["free"],
        );

        let cycles = detect_cycles(&graph);
        assert_eq!(cycles.len(), 2);
        assert!(cycles.iter().all(|c| c.first() == c.last()));
        let err = topological_order(&graph).unwrap_err();
        assert_eq!(err.cycles, cycles);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = graph(&[("a", "a")], &[]);
        assert_eq!(detect_cycles(&graph), vec![vec!["a", "a"]]);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let names: Vec<String> = (0..20_000).map(|i| format!("f{i}.ts")).collect();
        let mut graph = DependencyGraph::new();
        for pair in names.windows(2) {
            graph.add_edge(&pair[0], &pair[1]);
        }

        assert!(detect_cycles(&graph).is_empty());
        assert_eq!(topological_order(&graph).unwrap(), names);
    }
}
