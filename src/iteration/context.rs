// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::data::{AnnotationMergeMode, Annotations, DataContext, DataItem, SlotInfo};
use crate::errors::SlotError;
use crate::graph::NodeId;
use crate::iteration::IterationStep;

/// A row produced by one step, not yet committed to its output slot.
#[derive(Debug, Clone)]
pub struct PendingRow {
    pub slot: String,
    pub item: DataItem,
    pub annotations: Annotations,
    pub context: DataContext,
}

/// Everything an algorithm sees while executing one step.
///
/// Outputs are buffered here and committed to the node's output slots in
/// step order once the step returns, so a failing step leaves no partial rows.
pub struct IterationContext {
    node_id: NodeId,
    step_index: usize,
    step_count: usize,
    parameters: Arc<Map<String, Value>>,
    outputs: Arc<Vec<SlotInfo>>,
    step_annotations: Annotations,
    parents: Vec<uuid::Uuid>,
    pending: Vec<PendingRow>,
}

impl IterationContext {
    pub fn new(
        node_id: NodeId,
        step: &IterationStep,
        step_count: usize,
        parameters: Arc<Map<String, Value>>,
        outputs: Arc<Vec<SlotInfo>>,
    ) -> Self {
        Self {
            node_id,
            step_index: step.index(),
            step_count,
            parameters,
            outputs,
            step_annotations: step.annotations().clone(),
            parents: step.parent_contexts(),
            pending: Vec::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Deserializes parameter `key`. `Ok(None)` when it is not set.
    pub fn parameter<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.parameters.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Queues `item` for output slot `slot`.
    ///
    /// The row carries the step's merged annotations overwritten by `extra`,
    /// and a context derived from every participating input row.
    pub fn add_output(
        &mut self,
        slot: &str,
        item: DataItem,
        extra: Annotations,
    ) -> Result<(), SlotError> {
        let info = self
            .outputs
            .iter()
            .find(|info| info.name == slot)
            .ok_or_else(|| SlotError::UnknownOutput {
                slot: slot.to_string(),
            })?;
        let actual = item.data_type();
        if !actual.is_assignable_to(&info.data_type) {
            return Err(SlotError::TypeMismatch {
                slot: slot.to_string(),
                expected: info.data_type.id().to_string(),
                actual: actual.id().to_string(),
            });
        }

        let mut annotations = self.step_annotations.clone();
        annotations.merge_from(&extra, AnnotationMergeMode::OverwriteExisting);
        self.pending.push(PendingRow {
            slot: slot.to_string(),
            item,
            annotations,
            context: DataContext::derived(self.node_id, self.parents.clone()),
        });
        Ok(())
    }

    pub fn pending(&self) -> &[PendingRow] {
        &self.pending
    }

    pub fn into_pending(self) -> Vec<PendingRow> {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataSlot, DataType, TextData};
    use crate::iteration::{InputSlot, IterationSettings};
    use serde_json::json;

    fn context_for_single_row() -> IterationContext {
        let node = NodeId::new();
        let mut slot = DataSlot::new(node, "Input", DataType::text());
        slot.add_row(
            TextData::item("in"),
            Annotations::new().with("Sample", "1"),
            DataContext::default(),
        )
        .unwrap();
        slot.seal();
        let inputs = vec![InputSlot::new("Input", false, Arc::new(slot))];
        let steps = crate::iteration::simple::generate(&inputs, &IterationSettings::default())
            .unwrap();

        let mut parameters = Map::new();
        parameters.insert("case".to_string(), json!("upper"));
        IterationContext::new(
            node,
            &steps[0],
            steps.len(),
            Arc::new(parameters),
            Arc::new(vec![SlotInfo::output("Output", DataType::text())]),
        )
    }

    #[test]
    fn test_output_inherits_step_annotations_and_provenance() {
        let mut ctx = context_for_single_row();
        ctx.add_output(
            "Output",
            TextData::item("out"),
            Annotations::new().with("Length", "3"),
        )
        .unwrap();

        let row = &ctx.pending()[0];
        assert_eq!(row.annotations.get("Sample"), Some("1"));
        assert_eq!(row.annotations.get("Length"), Some("3"));
        assert_eq!(row.context.source, Some(ctx.node_id()));
        assert_eq!(row.context.parents.len(), 1);
    }

    #[test]
    fn test_unknown_output_is_rejected() {
        let mut ctx = context_for_single_row();
        let err = ctx
            .add_output("Missing", TextData::item("x"), Annotations::new())
            .unwrap_err();
        assert!(matches!(err, SlotError::UnknownOutput { .. }));
    }

    #[test]
    fn test_parameters_deserialize() {
        let ctx = context_for_single_row();
        assert_eq!(ctx.parameter::<String>("case").unwrap(), Some("upper".to_string()));
        assert_eq!(ctx.parameter::<String>("missing").unwrap(), None);
        assert!(ctx.parameter::<u32>("case").is_err());
    }
}
