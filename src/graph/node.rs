// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::data::{SlotDirection, SlotInfo};
use crate::iteration::ExecutionStrategy;
use crate::traits::Algorithm;

/// Stable identity of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identity handling when nodes or graphs are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Copies receive new ids
    #[default]
    Fresh,
    /// Copies keep the ids of their originals and refer to the same logical nodes
    Preserve,
}

/// A node of the pipeline graph.
///
/// One type covers every node kind. What differs between nodes is the
/// algorithm they run and the [`ExecutionStrategy`] that feeds it.
#[derive(Clone)]
pub struct GraphNode {
    id: NodeId,
    name: String,
    inputs: Vec<SlotInfo>,
    outputs: Vec<SlotInfo>,
    strategy: ExecutionStrategy,
    parameters: Map<String, Value>,
    parallel_steps: bool,
    algorithm: Arc<dyn Algorithm>,
}

impl GraphNode {
    /// Creates a node with the algorithm's declared ports and default strategy.
    pub fn new(name: impl Into<String>, algorithm: Arc<dyn Algorithm>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            inputs: algorithm.input_slots(),
            outputs: algorithm.output_slots(),
            strategy: algorithm.default_strategy(),
            parameters: Map::new(),
            parallel_steps: false,
            algorithm,
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_parallel_steps(mut self, parallel: bool) -> Self {
        self.parallel_steps = parallel;
        self
    }

    /// Replaces the declared input ports, e.g. to make one optional.
    pub fn with_inputs(mut self, inputs: Vec<SlotInfo>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[SlotInfo] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SlotInfo] {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Option<&SlotInfo> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&SlotInfo> {
        self.outputs.iter().find(|slot| slot.name == name)
    }

    pub fn slot(&self, name: &str, direction: SlotDirection) -> Option<&SlotInfo> {
        match direction {
            SlotDirection::Input => self.input(name),
            SlotDirection::Output => self.output(name),
        }
    }

    pub fn strategy(&self) -> &ExecutionStrategy {
        &self.strategy
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// Sets a parameter and returns the previous value.
    pub fn set_parameter(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.parameters.insert(key.into(), value)
    }

    pub fn set_strategy(&mut self, strategy: ExecutionStrategy) {
        self.strategy = strategy;
    }

    pub fn parallel_steps(&self) -> bool {
        self.parallel_steps
    }

    pub fn algorithm(&self) -> &Arc<dyn Algorithm> {
        &self.algorithm
    }

    pub fn duplicate(&self, policy: IdPolicy) -> GraphNode {
        let mut copy = self.clone();
        if policy == IdPolicy::Fresh {
            copy.id = NodeId::new();
        }
        copy
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("algorithm", &self.algorithm.name())
            .field("strategy", &self.strategy.name())
            .field("inputs", &self.inputs.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("outputs", &self.outputs.iter().map(|s| &s.name).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::ChangeTextCase;
    use serde_json::json;

    #[test]
    fn test_node_takes_ports_from_algorithm() {
        let node = GraphNode::new("upper", Arc::new(ChangeTextCase::upper()));
        assert!(node.input("Input").is_some());
        assert!(node.output("Output").is_some());
        assert!(node.slot("Output", SlotDirection::Input).is_none());
    }

    #[test]
    fn test_fresh_duplicate_gets_new_id() {
        let node = GraphNode::new("upper", Arc::new(ChangeTextCase::upper()))
            .with_parameter("case", json!("lower"));
        let copy = node.duplicate(IdPolicy::Fresh);
        assert_ne!(copy.id(), node.id());
        assert_eq!(copy.parameter("case"), Some(&json!("lower")));
    }

    #[test]
    fn test_preserved_duplicate_keeps_id() {
        let node = GraphNode::new("upper", Arc::new(ChangeTextCase::upper()));
        assert_eq!(node.duplicate(IdPolicy::Preserve).id(), node.id());
    }

    #[test]
    fn test_node_id_round_trips_through_serde() {
        let id = NodeId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(id.to_string().parse::<NodeId>().unwrap(), id);
    }
}
