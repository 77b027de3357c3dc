// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::algorithms::text_of;
use crate::data::{Annotations, DataType, ReadMode, SlotInfo, TextData};
use crate::engine::ProgressInfo;
use crate::errors::{ValidationContext, ValidationIssue, ValidationReport};
use crate::graph::GraphNode;
use crate::iteration::{
    ExecutionStrategy, IterationContext, IterationStep, MergingSettings, UnmatchedRowPolicy,
};
use crate::traits::Algorithm;

pub const LEFT: &str = "Left";
pub const RIGHT: &str = "Right";
pub const OUTPUT: &str = "Joined";
pub const SEPARATOR_PARAMETER: &str = "separator";
pub const DEFAULT_SEPARATOR: &str = " ";

/// Joins the texts of all `Left` rows and then all `Right` rows of a step
/// into one row.
///
/// Defaults to merging by annotation, keeping unmatched groups as their own
/// steps.
#[derive(Debug, Clone, Default)]
pub struct JoinText;

#[async_trait]
impl Algorithm for JoinText {
    fn name(&self) -> &'static str {
        "join_text"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        vec![
            SlotInfo::input(LEFT, DataType::text()),
            SlotInfo::input(RIGHT, DataType::text()),
        ]
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        vec![SlotInfo::output(OUTPUT, DataType::text())]
    }

    fn default_strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Merging(MergingSettings::new(UnmatchedRowPolicy::Divert))
    }

    fn report_validity(&self, node: &GraphNode, report: &mut ValidationReport) {
        match node.parameter(SEPARATOR_PARAMETER) {
            None | Some(Value::String(_)) => {}
            Some(other) => report.error(
                ValidationContext::Node {
                    id: node.id(),
                    name: node.name().to_string(),
                },
                ValidationIssue::Algorithm {
                    message: format!(
                        "Parameter '{}' must be a string, got {}",
                        SEPARATOR_PARAMETER, other
                    ),
                },
            ),
        }
    }

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        _progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        let separator: String = ctx
            .parameter(SEPARATOR_PARAMETER)?
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());

        let mut parts = Vec::new();
        for slot in [LEFT, RIGHT] {
            for item in step.data(slot, ReadMode::Share)? {
                parts.push(text_of(&item)?.to_string());
            }
        }
        ctx.add_output(OUTPUT, TextData::item(parts.join(&separator)), Annotations::new())?;
        Ok(())
    }
}
