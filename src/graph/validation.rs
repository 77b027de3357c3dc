// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Whole-graph validation.
//!
//! Validation runs every check and accumulates the findings in a
//! [`ValidationReport`] instead of stopping at the first problem:
//!
//! 1. **Edge endpoints**: both ends name an existing node and slot of the right direction
//! 2. **Edge types**: the source type is assignable to the target type
//! 3. **Input arity**: no input exceeds its connection limit, required inputs are connected
//! 4. **Cycles**: DFS with a recursion stack, reporting the cycle path
//! 5. **Algorithm checks**: each node's algorithm reports its own parameter problems
//!
//! Cycle detection is skipped when endpoints are unresolved since it needs a
//! structurally valid graph.

use crate::data::SlotDirection;
use crate::errors::{ValidationContext, ValidationIssue, ValidationReport};
use crate::graph::{Graph, SlotRef};

impl Graph {
    /// Checks the whole graph. A run must not start unless the report is valid.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        let endpoints_ok = validate_edges(self, &mut report);
        validate_inputs(self, &mut report);
        if endpoints_ok {
            validate_acyclic(self, &mut report);
        }
        for node in self.nodes() {
            node.algorithm().report_validity(node, &mut report);
        }
        report
    }
}

/// Returns `false` if any edge endpoint could not be resolved.
fn validate_edges(graph: &Graph, report: &mut ValidationReport) -> bool {
    let mut all_resolved = true;
    for edge in graph.edges() {
        let context = || ValidationContext::Edge {
            from: edge.from.clone(),
            to: edge.to.clone(),
        };
        let from = graph.slot_info(&edge.from, SlotDirection::Output);
        let to = graph.slot_info(&edge.to, SlotDirection::Input);
        match (from, to) {
            (Ok(from), Ok(to)) => {
                if !from.data_type.is_assignable_to(&to.data_type) {
                    report.error(
                        context(),
                        ValidationIssue::TypeMismatch {
                            source_type: from.data_type.id().to_string(),
                            target_type: to.data_type.id().to_string(),
                        },
                    );
                }
            }
            (from, to) => {
                all_resolved = false;
                if from.is_err() {
                    report.error(
                        context(),
                        ValidationIssue::UnknownEndpoint {
                            endpoint: edge.from.clone(),
                        },
                    );
                }
                if to.is_err() {
                    report.error(
                        context(),
                        ValidationIssue::UnknownEndpoint {
                            endpoint: edge.to.clone(),
                        },
                    );
                }
            }
        }
    }
    all_resolved
}

fn validate_inputs(graph: &Graph, report: &mut ValidationReport) {
    for node in graph.nodes() {
        for input in node.inputs() {
            let slot = SlotRef::new(node.id(), input.name.clone());
            let connections = graph.incoming(&slot).count();
            if connections > input.max_connections {
                report.error(
                    ValidationContext::Slot { slot: slot.clone() },
                    ValidationIssue::ArityExceeded {
                        connections,
                        max: input.max_connections,
                    },
                );
            }
            if connections == 0 && !input.optional {
                report.error(
                    ValidationContext::Node {
                        id: node.id(),
                        name: node.name().to_string(),
                    },
                    ValidationIssue::MissingInput {
                        slot: input.name.clone(),
                    },
                );
            }
        }
    }
}

fn validate_acyclic(graph: &Graph, report: &mut ValidationReport) {
    if let Some(cycle) = graph.find_cycle() {
        report.error(
            ValidationContext::Graph,
            ValidationIssue::CyclicDependency {
                cycle: cycle.iter().map(|id| graph.display_name(*id)).collect(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{ChangeTextCase, JoinText, SourceText};
    use crate::data::{DataType, SlotInfo};
    use crate::errors::ValidationLevel;
    use crate::graph::{GraphNode, NodeId};
    use serde_json::json;
    use std::sync::Arc;

    fn source(graph: &mut Graph) -> NodeId {
        graph
            .add_node(GraphNode::new("source", Arc::new(SourceText::default())))
            .unwrap()
    }

    fn upper(graph: &mut Graph, name: &str) -> NodeId {
        graph
            .add_node(GraphNode::new(name, Arc::new(ChangeTextCase::upper())))
            .unwrap()
    }

    #[test]
    fn test_valid_graph_has_no_errors() {
        let mut graph = Graph::new();
        let s = source(&mut graph);
        let u = upper(&mut graph, "upper");
        graph
            .connect(SlotRef::new(s, "Output"), SlotRef::new(u, "Input"))
            .unwrap();

        let report = graph.validate();
        assert!(report.is_valid(), "{}", report);
    }

    #[test]
    fn test_missing_required_input_is_reported() {
        let mut graph = Graph::new();
        upper(&mut graph, "dangling");

        let report = graph.validate();
        assert_eq!(report.error_count(), 1);
        assert!(matches!(
            report.entries()[0].issue,
            ValidationIssue::MissingInput { ref slot } if slot == "Input"
        ));
    }

    #[test]
    fn test_optional_input_may_stay_unconnected() {
        let mut graph = Graph::new();
        graph
            .add_node(
                GraphNode::new("lonely", Arc::new(ChangeTextCase::upper()))
                    .with_inputs(vec![SlotInfo::input("Input", DataType::text()).optional()]),
            )
            .unwrap();
        assert!(graph.validate().is_valid());
    }

    #[test]
    fn test_all_problems_are_collected() {
        let mut graph = Graph::new();
        let a = upper(&mut graph, "a");
        let b = upper(&mut graph, "b");
        let ghost = NodeId::new();
        graph.push_edge_unchecked(SlotRef::new(a, "Output"), SlotRef::new(b, "Input"));
        graph.push_edge_unchecked(SlotRef::new(ghost, "Output"), SlotRef::new(b, "Input"));

        let report = graph.validate();
        let issues: Vec<&ValidationIssue> = report.errors().map(|e| &e.issue).collect();
        assert!(issues.iter().any(|i| matches!(i, ValidationIssue::UnknownEndpoint { .. })));
        assert!(issues.iter().any(|i| matches!(i, ValidationIssue::ArityExceeded { connections: 2, max: 1 })));
        assert!(issues.iter().any(|i| matches!(i, ValidationIssue::MissingInput { .. })));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = Graph::new();
        let a = upper(&mut graph, "a");
        let b = upper(&mut graph, "b");
        graph.push_edge_unchecked(SlotRef::new(a, "Output"), SlotRef::new(b, "Input"));
        graph.push_edge_unchecked(SlotRef::new(b, "Output"), SlotRef::new(a, "Input"));

        let report = graph.validate();
        assert_eq!(report.error_count(), 1);
        assert!(matches!(
            report.entries()[0].issue,
            ValidationIssue::CyclicDependency { ref cycle } if cycle == &vec!["a", "b", "a"]
        ));
    }

    #[test]
    fn test_algorithm_findings_are_included() {
        let mut graph = Graph::new();
        let s = source(&mut graph);
        let t = source(&mut graph);
        let join = graph
            .add_node(
                GraphNode::new("join", Arc::new(JoinText::default()))
                    .with_parameter("separator", json!(42)),
            )
            .unwrap();
        graph
            .connect(SlotRef::new(s, "Output"), SlotRef::new(join, "Left"))
            .unwrap();
        graph
            .connect(SlotRef::new(t, "Output"), SlotRef::new(join, "Right"))
            .unwrap();

        let report = graph.validate();
        assert_eq!(report.error_count(), 1);
        assert!(matches!(report.entries()[0].issue, ValidationIssue::Algorithm { .. }));
        assert_eq!(report.entries()[0].level, ValidationLevel::Error);
    }
}
