// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The node graph: structure, connection rules, and execution order.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{SlotDirection, SlotInfo};
use crate::errors::GraphError;
use crate::graph::{GraphNode, IdPolicy, NodeId};

/// A slot addressed by owning node and slot name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub node: NodeId,
    pub slot: String,
}

impl SlotRef {
    pub fn new(node: NodeId, slot: impl Into<String>) -> Self {
        Self {
            node,
            slot: slot.into(),
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.slot)
    }
}

/// A connection from an output slot to an input slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: SlotRef,
    pub to: SlotRef,
}

/// Directed acyclic graph of nodes connected through typed slots.
///
/// Nodes remember their insertion order, which breaks ties in
/// [`execution_order`](Self::execution_order). Edges keep the order in which
/// they were connected, which is the order upstream rows are concatenated
/// into an input slot with several connections.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: HashMap<NodeId, GraphNode>,
    order: Vec<NodeId>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: GraphNode) -> Result<NodeId, GraphError> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        self.order.push(id);
        Ok(id)
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<GraphNode, GraphError> {
        let node = self.nodes.remove(&id).ok_or(GraphError::UnknownNode(id))?;
        self.order.retain(|n| *n != id);
        self.edges.retain(|e| e.from.node != id && e.to.node != id);
        Ok(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut GraphNode, GraphError> {
        self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up the declaration of a slot.
    pub fn slot_info(&self, slot: &SlotRef, direction: SlotDirection) -> Result<&SlotInfo, GraphError> {
        let node = self
            .nodes
            .get(&slot.node)
            .ok_or(GraphError::UnknownNode(slot.node))?;
        node.slot(&slot.slot, direction)
            .ok_or_else(|| GraphError::UnknownSlot {
                node_name: node.name().to_string(),
                slot: slot.slot.clone(),
                direction,
            })
    }

    /// Connects an output slot to an input slot.
    ///
    /// Fails without modifying the graph when either slot is unknown, the
    /// data types are incompatible, the edge already exists, the input is
    /// saturated, or the edge would close a cycle.
    pub fn connect(&mut self, from: SlotRef, to: SlotRef) -> Result<(), GraphError> {
        let from_info = self.slot_info(&from, SlotDirection::Output)?;
        let to_info = self.slot_info(&to, SlotDirection::Input)?;

        if !from_info.data_type.is_assignable_to(&to_info.data_type) {
            return Err(GraphError::TypeMismatch {
                from_type: from_info.data_type.id().to_string(),
                to_type: to_info.data_type.id().to_string(),
                from,
                to,
            });
        }

        let max = to_info.max_connections;
        let edge = Edge { from, to };
        if self.edges.contains(&edge) {
            return Err(GraphError::DuplicateConnection {
                from: edge.from,
                to: edge.to,
            });
        }
        if self.incoming(&edge.to).count() >= max {
            return Err(GraphError::ArityExceeded { slot: edge.to, max });
        }
        if let Some(path) = self.path_between(edge.to.node, edge.from.node) {
            let mut cycle: Vec<String> = vec![self.display_name(edge.from.node)];
            cycle.extend(path.iter().map(|id| self.display_name(*id)));
            return Err(GraphError::Cycle {
                from: edge.from,
                to: edge.to,
                path: cycle,
            });
        }

        self.edges.push(edge);
        Ok(())
    }

    /// Removes an edge. Returns whether it existed.
    pub fn disconnect(&mut self, from: &SlotRef, to: &SlotRef) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| !(&e.from == from && &e.to == to));
        self.edges.len() != before
    }

    /// Edges ending at `slot`, in connection order.
    pub fn incoming<'a>(&'a self, slot: &'a SlotRef) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.to == slot)
    }

    /// Distinct direct predecessors of `node`.
    pub fn upstream(&self, node: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| e.to.node == node)
            .map(|e| e.from.node)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Every node reachable from `node`, excluding `node`, in breadth-first order.
    pub fn downstream(&self, node: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::from([node]);
        let mut queue = VecDeque::from([node]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            for edge in self.edges.iter().filter(|e| e.from.node == current) {
                if seen.insert(edge.to.node) {
                    result.push(edge.to.node);
                    queue.push_back(edge.to.node);
                }
            }
        }
        result
    }

    /// Topological order computed with Kahn's algorithm.
    ///
    /// Among nodes that are ready at the same time, the one inserted first is
    /// emitted first, so the order is deterministic for a given graph.
    pub fn execution_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let position: HashMap<NodeId, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let mut in_degree: HashMap<NodeId, usize> = self.order.iter().map(|id| (*id, 0)).collect();
        let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for edge in &self.edges {
            if !position.contains_key(&edge.from.node) || !position.contains_key(&edge.to.node) {
                continue;
            }
            *in_degree.entry(edge.to.node).or_insert(0) += 1;
            successors
                .entry(edge.from.node)
                .or_default()
                .push(edge.to.node);
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| position[id])
            .collect();

        let mut result = Vec::with_capacity(self.order.len());
        while let Some(next) = ready.pop_first() {
            let id = self.order[next];
            result.push(id);
            for successor in successors.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(successor) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(position[successor]);
                    }
                }
            }
        }

        if result.len() != self.order.len() {
            let path = self.find_cycle().unwrap_or_default();
            return Err(GraphError::NotAcyclic {
                path: path.iter().map(|id| self.display_name(*id)).collect(),
            });
        }
        Ok(result)
    }

    /// Copies the graph.
    ///
    /// Returns the copy and the mapping from original to copied node ids,
    /// which is the identity under [`IdPolicy::Preserve`].
    pub fn duplicate(&self, policy: IdPolicy) -> (Graph, HashMap<NodeId, NodeId>) {
        let mut copy = Graph::new();
        let mut mapping = HashMap::with_capacity(self.order.len());
        for node in self.nodes() {
            let duplicated = node.duplicate(policy);
            mapping.insert(node.id(), duplicated.id());
            copy.order.push(duplicated.id());
            copy.nodes.insert(duplicated.id(), duplicated);
        }
        copy.edges = self
            .edges
            .iter()
            .filter_map(|edge| {
                Some(Edge {
                    from: SlotRef::new(*mapping.get(&edge.from.node)?, edge.from.slot.clone()),
                    to: SlotRef::new(*mapping.get(&edge.to.node)?, edge.to.slot.clone()),
                })
            })
            .collect();
        (copy, mapping)
    }

    pub(crate) fn display_name(&self, id: NodeId) -> String {
        self.nodes
            .get(&id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Shortest path of node ids from `start` to `goal`, both included.
    fn path_between(&self, start: NodeId, goal: NodeId) -> Option<Vec<NodeId>> {
        let mut previous: HashMap<NodeId, NodeId> = HashMap::new();
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            if current == goal {
                let mut path = vec![goal];
                let mut cursor = goal;
                while let Some(prev) = previous.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for edge in self.edges.iter().filter(|e| e.from.node == current) {
                if seen.insert(edge.to.node) {
                    previous.insert(edge.to.node, current);
                    queue.push_back(edge.to.node);
                }
            }
        }
        None
    }

    /// Depth-first search with a recursion stack. Returns the node ids of the
    /// first cycle found, closed by repeating its first node.
    pub(crate) fn find_cycle(&self) -> Option<Vec<NodeId>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();
        for id in &self.order {
            if !visited.contains(id) {
                if let Some(cycle) = self.dfs_cycle(*id, &mut visited, &mut on_stack, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        node: NodeId,
        visited: &mut HashSet<NodeId>,
        on_stack: &mut HashSet<NodeId>,
        path: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for edge in self.edges.iter().filter(|e| e.from.node == node) {
            let next = edge.to.node;
            if on_stack.contains(&next) {
                let start = path.iter().position(|id| *id == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            if !visited.contains(&next) {
                if let Some(cycle) = self.dfs_cycle(next, visited, on_stack, path) {
                    return Some(cycle);
                }
            }
        }

        on_stack.remove(&node);
        path.pop();
        None
    }

    /// Inserts an edge without checks. Used to build invalid graphs in tests.
    #[cfg(test)]
    pub(crate) fn push_edge_unchecked(&mut self, from: SlotRef, to: SlotRef) {
        self.edges.push(Edge { from, to });
    }
}
