// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline graph: nodes, typed connections, validation, and ordering.

mod node;
mod pipeline_graph;
mod validation;

pub use node::{GraphNode, IdPolicy, NodeId};
pub use pipeline_graph::{Edge, Graph, SlotRef};
