// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::data::SlotDirection;
use crate::graph::{NodeId, SlotRef};

/// Errors raised by structural graph edits.
///
/// `connect()` checks every invariant eagerly, so a graph built only through
/// the public API never holds an edge that would fail validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Node {0} already exists in the graph")]
    DuplicateNode(NodeId),

    #[error("Node '{node_name}' has no {direction} slot named '{slot}'")]
    UnknownSlot {
        node_name: String,
        slot: String,
        direction: SlotDirection,
    },

    #[error("Cannot connect {from} ({from_type}) to {to} ({to_type}): incompatible data types")]
    TypeMismatch {
        from: SlotRef,
        to: SlotRef,
        from_type: String,
        to_type: String,
    },

    #[error("Connecting {from} to {to} would create a cycle: {}", .path.join(" -> "))]
    Cycle {
        from: SlotRef,
        to: SlotRef,
        /// Node names along the cycle, first and last entries are equal
        path: Vec<String>,
    },

    #[error("Graph contains a cycle: {}", .path.join(" -> "))]
    NotAcyclic { path: Vec<String> },

    #[error("Input {slot} already has {max} connection(s)")]
    ArityExceeded { slot: SlotRef, max: usize },

    #[error("{from} is already connected to {to}")]
    DuplicateConnection { from: SlotRef, to: SlotRef },
}
