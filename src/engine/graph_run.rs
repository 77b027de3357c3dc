// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Executing a graph node by node.
//!
//! A [`GraphRun`] owns a snapshot of a graph and walks it in
//! [`execution_order`](crate::graph::Graph::execution_order). For each node it:
//!
//! 1. Checks for cancellation
//! 2. Skips the node if every output is already cached
//! 3. Concatenates upstream outputs into sealed input slots, in edge order
//! 4. Generates iteration steps from the node's strategy
//! 5. Runs the algorithm once per step, sequentially or bounded-parallel
//! 6. Commits step outputs in step order and seals the output slots
//! 7. Stores the outputs in the cache, evicting downstream entries
//!
//! Nothing is written to the cache for a node whose steps did not all succeed.
//! A run with recorded cache generations also skips nodes that were
//! invalidated after the run was created.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::{AbortHandle, JoinSet};

use crate::cache::MemoryCache;
use crate::config::consts::default_max_parallel_steps;
use crate::data::{DataSlot, SlotInfo};
use crate::engine::ProgressInfo;
use crate::errors::{
    GraphError, IterationError, RunError, SlotError, ValidationContext, ValidationIssue,
    ValidationReport,
};
use crate::graph::{Graph, GraphNode, NodeId, SlotRef};
use crate::iteration::{InputSlot, IterationContext, IterationStep, PendingRow};
use crate::observability::messages::engine::{
    IterationStepFailed, NodeExecutionCompleted, NodeExecutionStarted, NodeSkippedCached,
    RunCancelled, RunCompleted, RunStarted,
};
use crate::observability::messages::validation::{ValidationFailed, ValidationWarning};
use crate::observability::messages::StructuredLog;
use crate::traits::{Algorithm, Runnable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Skip nodes whose outputs are all cached
    pub use_cache: bool,
    /// Store node outputs in the cache after execution
    pub store_to_cache: bool,
    /// Upper bound on concurrently executing steps of one node
    pub max_parallel_steps: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            use_cache: true,
            store_to_cache: true,
            max_parallel_steps: default_max_parallel_steps(),
        }
    }
}

/// Output slots produced or reused by a run, keyed by node id and slot name.
#[derive(Debug, Clone, Default)]
pub struct RunOutputs {
    slots: HashMap<NodeId, HashMap<String, Arc<DataSlot>>>,
    executed: Vec<NodeId>,
    cached: Vec<NodeId>,
}

impl RunOutputs {
    pub fn get(&self, node: NodeId, slot: &str) -> Option<&Arc<DataSlot>> {
        self.slots.get(&node).and_then(|slots| slots.get(slot))
    }

    pub fn node_outputs(&self, node: NodeId) -> Option<&HashMap<String, Arc<DataSlot>>> {
        self.slots.get(&node)
    }

    /// Nodes whose algorithm ran, in execution order.
    pub fn executed(&self) -> &[NodeId] {
        &self.executed
    }

    /// Nodes served from the cache, in execution order.
    pub fn cached(&self) -> &[NodeId] {
        &self.cached
    }
}

/// A runnable snapshot of a graph.
pub struct GraphRun {
    name: String,
    graph: Graph,
    cache: Option<Arc<MemoryCache>>,
    settings: RunSettings,
    /// Run node id to the node it was copied from
    origins: HashMap<NodeId, NodeId>,
    /// Cache generation of each entry owner when the run was created
    generations: HashMap<NodeId, u64>,
    outputs_tx: Option<oneshot::Sender<RunOutputs>>,
}

impl GraphRun {
    pub fn new(graph: Graph) -> Self {
        Self {
            name: "Graph run".to_string(),
            graph,
            cache: None,
            settings: RunSettings::default(),
            origins: HashMap::new(),
            generations: HashMap::new(),
            outputs_tx: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_cache(mut self, cache: Arc<MemoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Cache entries of a copied node are parented to its origin, so editing
    /// the origin invalidates them.
    pub fn with_origins(mut self, origins: HashMap<NodeId, NodeId>) -> Self {
        self.origins = origins;
        self
    }

    /// Generations read from the cache when the graph snapshot was taken,
    /// keyed by origin node. Outputs of a node whose origin was invalidated
    /// since then are not stored. Nodes without a recorded generation are
    /// stored unconditionally.
    pub fn with_generations(mut self, generations: HashMap<NodeId, u64>) -> Self {
        self.generations = generations;
        self
    }

    /// Delivers the outputs through the returned receiver once the run
    /// finishes. The sender is dropped on failure.
    pub fn with_outputs(mut self) -> (Self, oneshot::Receiver<RunOutputs>) {
        let (tx, rx) = oneshot::channel();
        self.outputs_tx = Some(tx);
        (self, rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub async fn execute(&self, progress: &ProgressInfo) -> Result<RunOutputs, RunError> {
        let started = Instant::now();
        let report = self.graph.validate();
        if report.has_errors() {
            ValidationFailed {
                graph: &self.name,
                errors: report.error_count(),
                warnings: report.warning_count(),
            }
            .log();
            return Err(RunError::Validation(report));
        }
        for warning in report.warnings() {
            ValidationWarning {
                graph: &self.name,
                message: &warning.to_string(),
            }
            .log();
        }

        let order = self.graph.execution_order()?;
        RunStarted {
            run: &self.name,
            node_count: order.len(),
        }
        .log();

        let root = progress.resolve(self.name.clone());
        root.set_max(order.len());
        root.set_progress(0);

        let mut outputs = RunOutputs::default();
        for (position, &node_id) in order.iter().enumerate() {
            let node = self
                .graph
                .node(node_id)
                .ok_or(GraphError::UnknownNode(node_id))?;
            let node_progress = root.resolve(format!(
                "{} ({}/{})",
                node.name(),
                position + 1,
                order.len()
            ));

            if node_progress.is_cancelled() {
                RunCancelled {
                    run: &self.name,
                    node_name: node.name(),
                }
                .log();
                return Err(RunError::Cancelled);
            }

            if let Some(cached) = self.cached_outputs(node) {
                NodeSkippedCached {
                    node_id: &node_id,
                    node_name: node.name(),
                }
                .log();
                node_progress.log("Outputs cached, skipping");
                outputs.slots.insert(node_id, cached);
                outputs.cached.push(node_id);
                root.increment_progress();
                continue;
            }

            let produced = match self.execute_node(node, &outputs, &node_progress).await {
                Err(RunError::Cancelled) => {
                    RunCancelled {
                        run: &self.name,
                        node_name: node.name(),
                    }
                    .log();
                    return Err(RunError::Cancelled);
                }
                other => other?,
            };
            self.store_outputs(node_id, &produced, &node_progress);
            outputs.slots.insert(node_id, produced);
            outputs.executed.push(node_id);
            root.increment_progress();
        }

        RunCompleted {
            run: &self.name,
            executed: outputs.executed.len(),
            cached: outputs.cached.len(),
            duration: started.elapsed(),
        }
        .log();
        Ok(outputs)
    }

    /// All outputs of `node` from the cache, or `None` if any is missing.
    fn cached_outputs(&self, node: &GraphNode) -> Option<HashMap<String, Arc<DataSlot>>> {
        if !self.settings.use_cache || node.outputs().is_empty() {
            return None;
        }
        let cache = self.cache.as_ref()?;
        node.outputs()
            .iter()
            .map(|info| {
                cache
                    .query(node.id(), &info.name)
                    .map(|slot| (info.name.clone(), slot))
            })
            .collect()
    }

    fn store_outputs(
        &self,
        node_id: NodeId,
        produced: &HashMap<String, Arc<DataSlot>>,
        progress: &ProgressInfo,
    ) {
        if !self.settings.store_to_cache {
            return;
        }
        let Some(cache) = &self.cache else {
            return;
        };
        for downstream in self.graph.downstream(node_id) {
            cache.evict(downstream);
        }
        let parent = self
            .origins
            .get(&node_id)
            .copied()
            .filter(|origin| *origin != node_id);
        let recorded = self.generations.get(&parent.unwrap_or(node_id)).copied();
        for slot in produced.values() {
            match recorded {
                Some(generation) => {
                    cache.store_if_current(node_id, parent, slot.clone(), generation, progress);
                }
                None => cache.store(node_id, parent, slot.clone(), progress),
            }
        }
    }

    async fn execute_node(
        &self,
        node: &GraphNode,
        outputs: &RunOutputs,
        progress: &ProgressInfo,
    ) -> Result<HashMap<String, Arc<DataSlot>>, RunError> {
        let started = Instant::now();
        let inputs = self.gather_inputs(node, outputs)?;
        let steps = node.strategy().generate_steps(&inputs).map_err(|error| {
            let mut report = ValidationReport::new();
            report.error(
                ValidationContext::Node {
                    id: node.id(),
                    name: node.name().to_string(),
                },
                ValidationIssue::StepGeneration {
                    message: error.to_string(),
                },
            );
            RunError::Validation(report)
        })?;

        NodeExecutionStarted {
            node_id: &node.id(),
            node_name: node.name(),
            strategy: node.strategy().name(),
            step_count: steps.len(),
        }
        .log();

        let runner = StepRunner {
            node_id: node.id(),
            node_name: Arc::from(node.name()),
            algorithm: node.algorithm().clone(),
            parameters: Arc::new(node.parameters().clone()),
            outputs: Arc::new(node.outputs().to_vec()),
            step_count: steps.len(),
        };
        let parallel = node.parallel_steps()
            && node.algorithm().supports_parallel_steps()
            && self.settings.max_parallel_steps > 1
            && steps.len() > 1;
        let results = if parallel {
            self.run_parallel(&runner, steps, progress).await?
        } else {
            run_sequential(&runner, &steps, progress).await?
        };

        let mut slots: Vec<DataSlot> = node
            .outputs()
            .iter()
            .map(|info| DataSlot::from_info(node.id(), info))
            .collect();
        for pending in results.into_iter().flatten() {
            let slot = slots
                .iter_mut()
                .find(|slot| slot.name() == pending.slot)
                .ok_or_else(|| SlotError::UnknownOutput {
                    slot: pending.slot.clone(),
                })?;
            slot.add_row(pending.item, pending.annotations, pending.context)?;
        }

        let mut rows_produced = 0;
        let mut produced = HashMap::new();
        for mut slot in slots {
            slot.seal();
            rows_produced += slot.row_count();
            produced.insert(slot.name().to_string(), Arc::new(slot));
        }

        NodeExecutionCompleted {
            node_id: &node.id(),
            node_name: node.name(),
            step_count: runner.step_count,
            rows_produced,
            duration: started.elapsed(),
        }
        .log();
        Ok(produced)
    }

    /// One sealed slot per input, holding the rows of every incoming edge in
    /// edge order.
    fn gather_inputs(
        &self,
        node: &GraphNode,
        outputs: &RunOutputs,
    ) -> Result<Vec<InputSlot>, RunError> {
        let mut inputs = Vec::with_capacity(node.inputs().len());
        for info in node.inputs() {
            let target = SlotRef::new(node.id(), info.name.clone());
            let mut slot = DataSlot::from_info(node.id(), info);
            for edge in self.graph.incoming(&target) {
                if let Some(source) = outputs.get(edge.from.node, &edge.from.slot) {
                    slot.add_rows_from(source)?;
                }
            }
            slot.seal();
            inputs.push(InputSlot::new(info.name.clone(), info.optional, Arc::new(slot)));
        }
        Ok(inputs)
    }

    /// Runs steps on a bounded pool and returns their outputs in step order.
    ///
    /// The step tasks live in a `JoinSet` owned by this future, so dropping
    /// it (a forced cancel aborting the run) aborts every step still running.
    /// On failure the lowest-indexed failing step wins and the steps after it
    /// are aborted.
    async fn run_parallel(
        &self,
        runner: &StepRunner,
        steps: Vec<IterationStep>,
        progress: &ProgressInfo,
    ) -> Result<Vec<Vec<PendingRow>>, RunError> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel_steps));
        let total = steps.len();
        let mut tasks = JoinSet::new();
        let mut aborts: Vec<AbortHandle> = Vec::with_capacity(total);
        for (position, step) in steps.into_iter().enumerate() {
            let runner = runner.clone();
            let semaphore = semaphore.clone();
            let step_progress =
                progress.resolve(format!("Iteration step {}/{}", position + 1, total));
            aborts.push(tasks.spawn(async move {
                let outcome = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| RunError::Cancelled)?;
                    if step_progress.is_cancelled() {
                        return Err(RunError::Cancelled);
                    }
                    step_progress.log("");
                    runner.run(&step, &step_progress).await
                }
                .await;
                (position, outcome)
            }));
        }

        let mut results: Vec<Option<Vec<PendingRow>>> = (0..total).map(|_| None).collect();
        let mut failure: Option<(usize, RunError)> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, Ok(pending))) => results[position] = Some(pending),
                Ok((position, Err(error))) => {
                    if failure.as_ref().map_or(true, |(lowest, _)| position < *lowest) {
                        for handle in &aborts[position + 1..] {
                            handle.abort();
                        }
                        failure = Some((position, error));
                    }
                }
                // Aborted after an earlier step failed
                Err(error) if error.is_cancelled() => {}
                Err(error) => return Err(RunError::Panicked(error.to_string())),
            }
        }
        if let Some((_, error)) = failure {
            return Err(error);
        }
        Ok(results.into_iter().flatten().collect())
    }
}

async fn run_sequential(
    runner: &StepRunner,
    steps: &[IterationStep],
    progress: &ProgressInfo,
) -> Result<Vec<Vec<PendingRow>>, RunError> {
    let mut results = Vec::with_capacity(steps.len());
    for step in steps {
        if progress.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        let step_progress = progress.resolve_and_log("Iteration step", step.index(), steps.len());
        results.push(runner.run(step, &step_progress).await?);
    }
    Ok(results)
}

/// Everything needed to run one step of a node, cheap to clone into tasks.
#[derive(Clone)]
struct StepRunner {
    node_id: NodeId,
    node_name: Arc<str>,
    algorithm: Arc<dyn Algorithm>,
    parameters: Arc<Map<String, Value>>,
    outputs: Arc<Vec<SlotInfo>>,
    step_count: usize,
}

impl StepRunner {
    async fn run(
        &self,
        step: &IterationStep,
        progress: &ProgressInfo,
    ) -> Result<Vec<PendingRow>, RunError> {
        let mut ctx = IterationContext::new(
            self.node_id,
            step,
            self.step_count,
            self.parameters.clone(),
            self.outputs.clone(),
        );
        match self.algorithm.run_iteration(step, &mut ctx, progress).await {
            Ok(()) => Ok(ctx.into_pending()),
            Err(_) if progress.is_cancelled() => Err(RunError::Cancelled),
            Err(cause) => {
                let error = IterationError {
                    node_id: self.node_id,
                    node_name: self.node_name.to_string(),
                    step_index: step.index(),
                    step_count: self.step_count,
                    rows: step.row_summary(),
                    annotations: step.annotations().clone(),
                    cause,
                };
                IterationStepFailed {
                    node_name: &self.node_name,
                    step_index: step.index(),
                    step_count: self.step_count,
                    error: &error,
                }
                .log();
                Err(error.into())
            }
        }
    }
}

#[async_trait]
impl Runnable for GraphRun {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn run(self: Box<Self>, progress: ProgressInfo) -> Result<(), RunError> {
        let outputs = self.execute(&progress).await?;
        let GraphRun { outputs_tx, .. } = *self;
        if let Some(tx) = outputs_tx {
            let _ = tx.send(outputs);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{ChangeTextCase, SourceText};
    use serde_json::json;

    fn source_with(graph: &mut Graph, texts: &[&str]) -> NodeId {
        let rows: Vec<Value> = texts.iter().map(|text| json!({ "text": text })).collect();
        graph
            .add_node(
                GraphNode::new("source", Arc::new(SourceText::default()))
                    .with_parameter("rows", Value::Array(rows)),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_node_run() {
        let mut graph = Graph::new();
        let source = source_with(&mut graph, &["a", "b"]);

        let outputs = GraphRun::new(graph)
            .execute(&ProgressInfo::detached())
            .await
            .unwrap();

        let slot = outputs.get(source, "Output").unwrap();
        assert!(slot.is_sealed());
        assert_eq!(slot.row_count(), 2);
        assert_eq!(outputs.executed(), &[source]);
    }

    #[tokio::test]
    async fn test_invalid_graph_is_refused() {
        let mut graph = Graph::new();
        graph
            .add_node(GraphNode::new("upper", Arc::new(ChangeTextCase::upper())))
            .unwrap();

        let err = GraphRun::new(graph)
            .execute(&ProgressInfo::detached())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Validation(ref report) if report.error_count() == 1));
    }

    #[tokio::test]
    async fn test_cancel_before_start_runs_nothing() {
        let mut graph = Graph::new();
        source_with(&mut graph, &["a"]);
        let progress = ProgressInfo::detached();
        progress.cancel();

        let err = GraphRun::new(graph).execute(&progress).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_outputs_are_delivered_through_receiver() {
        let mut graph = Graph::new();
        let source = source_with(&mut graph, &["only"]);
        let (run, outputs) = GraphRun::new(graph).with_outputs();

        Box::new(run).run(ProgressInfo::detached()).await.unwrap();
        let outputs = outputs.await.unwrap();
        assert_eq!(outputs.get(source, "Output").unwrap().row_count(), 1);
    }
}
