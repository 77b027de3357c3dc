// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::data::SlotInfo;
use crate::engine::ProgressInfo;
use crate::errors::ValidationReport;
use crate::graph::GraphNode;
use crate::iteration::{ExecutionStrategy, IterationContext, IterationStep};

/// The work a node performs, one iteration step at a time.
///
/// Implementations are opaque to the engine. They declare their ports, pick a
/// default execution strategy, and process steps. `run_iteration` is invoked
/// exactly once per generated step; with parallel steps enabled it may run
/// concurrently for different steps of the same node.
#[async_trait]
pub trait Algorithm: Send + Sync {
    fn name(&self) -> &'static str;

    fn input_slots(&self) -> Vec<SlotInfo>;

    fn output_slots(&self) -> Vec<SlotInfo>;

    fn default_strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::default()
    }

    /// Whether steps of one node may execute concurrently.
    fn supports_parallel_steps(&self) -> bool {
        true
    }

    /// Adds parameter problems of `node` to `report`.
    fn report_validity(&self, _node: &GraphNode, _report: &mut ValidationReport) {}

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        progress: &ProgressInfo,
    ) -> anyhow::Result<()>;
}
