// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::Deserialize;

use crate::data::{Annotations, DataType, SlotInfo, TextData};
use crate::engine::ProgressInfo;
use crate::errors::{ValidationContext, ValidationIssue, ValidationReport};
use crate::graph::GraphNode;
use crate::iteration::{IterationContext, IterationStep};
use crate::traits::Algorithm;

pub const OUTPUT: &str = "Output";
pub const ROWS_PARAMETER: &str = "rows";

/// One row emitted by [`SourceText`].
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRow {
    pub text: String,
    #[serde(default)]
    pub annotations: Annotations,
}

/// Emits the rows listed in its `rows` parameter.
///
/// ```json
/// { "rows": [ { "text": "a", "annotations": { "Sample": "1" } } ] }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SourceText;

#[async_trait]
impl Algorithm for SourceText {
    fn name(&self) -> &'static str {
        "source_text"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        Vec::new()
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        vec![SlotInfo::output(OUTPUT, DataType::text())]
    }

    fn report_validity(&self, node: &GraphNode, report: &mut ValidationReport) {
        if let Some(value) = node.parameter(ROWS_PARAMETER) {
            if let Err(e) = serde_json::from_value::<Vec<SourceRow>>(value.clone()) {
                report.error(
                    ValidationContext::Node {
                        id: node.id(),
                        name: node.name().to_string(),
                    },
                    ValidationIssue::Algorithm {
                        message: format!("Parameter '{}' is malformed: {}", ROWS_PARAMETER, e),
                    },
                );
            }
        }
    }

    async fn run_iteration(
        &self,
        _step: &IterationStep,
        ctx: &mut IterationContext,
        progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        let rows: Vec<SourceRow> = ctx.parameter(ROWS_PARAMETER)?.unwrap_or_default();
        progress.log(format!("Emitting {} row(s)", rows.len()));
        for row in rows {
            ctx.add_output(OUTPUT, TextData::item(row.text), row.annotations)?;
        }
        Ok(())
    }
}
