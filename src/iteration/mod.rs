// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Turning input slots into iteration steps.
//!
//! A node's [`ExecutionStrategy`] decides how the rows of its input slots are
//! grouped into steps. Each step is handed to the node's algorithm exactly once.

mod context;
pub mod merging;
pub mod simple;
mod step;

use serde::{Deserialize, Serialize};

pub use context::{IterationContext, PendingRow};
pub use step::{
    ColumnMatching, InputSlot, IterationSettings, IterationStep, MergingSettings, StepInput,
    UnmatchedRowPolicy,
};

use crate::errors::StepGenerationError;

/// How a node turns its inputs into steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One step per row position, see [`simple::generate`]
    SingleIteration(IterationSettings),
    /// One step per annotation key, see [`merging::generate`]
    Merging(MergingSettings),
    /// One step holding every row of every input
    FreeForm,
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        ExecutionStrategy::SingleIteration(IterationSettings::default())
    }
}

impl ExecutionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionStrategy::SingleIteration(_) => "single_iteration",
            ExecutionStrategy::Merging(_) => "merging",
            ExecutionStrategy::FreeForm => "free_form",
        }
    }

    pub fn generate_steps(
        &self,
        inputs: &[InputSlot],
    ) -> Result<Vec<IterationStep>, StepGenerationError> {
        match self {
            ExecutionStrategy::SingleIteration(settings) => simple::generate(inputs, settings),
            ExecutionStrategy::Merging(settings) => merging::generate(inputs, settings),
            ExecutionStrategy::FreeForm => Ok(free_form(inputs)),
        }
    }
}

fn free_form(inputs: &[InputSlot]) -> Vec<IterationStep> {
    let rows = inputs
        .iter()
        .map(|input| StepInput {
            name: input.name.clone(),
            slot: input.slot.clone(),
            rows: (0..input.row_count()).collect(),
        })
        .collect();
    vec![IterationStep::new(rows, Default::default())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Annotations, DataContext, DataSlot, DataType, TextData};
    use crate::graph::NodeId;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_free_form_takes_everything() {
        let mut slot = DataSlot::new(NodeId::new(), "Input", DataType::text());
        for text in ["a", "b", "c"] {
            slot.add_row(TextData::item(text), Annotations::new(), DataContext::default())
                .unwrap();
        }
        let inputs = vec![InputSlot::new("Input", false, Arc::new(slot))];

        let steps = ExecutionStrategy::FreeForm.generate_steps(&inputs).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].rows("Input"), &[0, 1, 2]);
    }

    #[test]
    fn test_strategy_deserializes_from_parameters() {
        let value = json!({
            "merging": { "column_matching": "intersection", "unmatched": "divert" }
        });
        let strategy: ExecutionStrategy = serde_json::from_value(value).unwrap();
        match strategy {
            ExecutionStrategy::Merging(settings) => {
                assert_eq!(settings.column_matching, ColumnMatching::Intersection);
                assert_eq!(settings.unmatched, UnmatchedRowPolicy::Divert);
            }
            other => panic!("unexpected strategy {:?}", other),
        }
    }

    #[test]
    fn test_merging_requires_unmatched_policy() {
        let value = json!({ "merging": { "column_matching": "union" } });
        assert!(serde_json::from_value::<ExecutionStrategy>(value).is_err());
    }
}
