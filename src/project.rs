// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A graph together with the cache of its results.
//!
//! Every edit made through a [`Project`] invalidates the cached outputs of the
//! edited node and everything downstream of it before the call returns, so a
//! later run never reuses results computed from an older graph.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use crate::cache::MemoryCache;
use crate::config::consts::DEFAULT_EVENT_CAPACITY;
use crate::config::EngineConfig;
use crate::data::{self, DataSlot, DataTypeRegistry};
use crate::engine::{GraphRun, ProgressInfo, RunId, RunOutputs, RunQueue, RunSettings};
use crate::errors::{ExportError, GraphError, ImportError, RunError, SlotError, ValidationReport};
use crate::graph::{Graph, GraphNode, IdPolicy, NodeId, SlotRef};
use crate::iteration::ExecutionStrategy;
use crate::observability::messages::validation::ValidationFailed;
use crate::observability::messages::StructuredLog;

/// Structural and cache changes of a project.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeAdded { node: NodeId },
    NodeRemoved { node: NodeId },
    Connected { from: SlotRef, to: SlotRef },
    Disconnected { from: SlotRef, to: SlotRef },
    ParameterChanged { node: NodeId, key: String },
    StrategyChanged { node: NodeId },
    CacheInvalidated { node: NodeId, removed: usize },
}

pub struct Project {
    name: String,
    graph: Graph,
    cache: Arc<MemoryCache>,
    settings: RunSettings,
    events: broadcast::Sender<GraphEvent>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parts(name, RunSettings::default(), DEFAULT_EVENT_CAPACITY)
    }

    pub fn from_config(name: impl Into<String>, config: &EngineConfig) -> Self {
        Self::with_parts(name, config.run_settings(), config.events.get_capacity())
    }

    fn with_parts(name: impl Into<String>, settings: RunSettings, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            graph: Graph::new(),
            cache: Arc::new(MemoryCache::with_event_capacity(capacity)),
            settings,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RunSettings) {
        self.settings = settings;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    pub fn add_node(&mut self, node: GraphNode) -> Result<NodeId, GraphError> {
        let id = self.graph.add_node(node)?;
        self.invalidate_from(id);
        self.emit(GraphEvent::NodeAdded { node: id });
        Ok(id)
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<GraphNode, GraphError> {
        if !self.graph.contains(id) {
            return Err(GraphError::UnknownNode(id));
        }
        self.invalidate_from(id);
        let node = self.graph.remove_node(id)?;
        self.emit(GraphEvent::NodeRemoved { node: id });
        Ok(node)
    }

    pub fn connect(&mut self, from: SlotRef, to: SlotRef) -> Result<(), GraphError> {
        self.graph.connect(from.clone(), to.clone())?;
        self.invalidate_from(to.node);
        self.emit(GraphEvent::Connected { from, to });
        Ok(())
    }

    /// Returns `false` if the edge did not exist.
    pub fn disconnect(&mut self, from: &SlotRef, to: &SlotRef) -> bool {
        if !self.graph.disconnect(from, to) {
            return false;
        }
        self.invalidate_from(to.node);
        self.emit(GraphEvent::Disconnected {
            from: from.clone(),
            to: to.clone(),
        });
        true
    }

    /// Sets a node parameter and returns the previous value.
    pub fn set_parameter(
        &mut self,
        node: NodeId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, GraphError> {
        let key = key.into();
        let previous = self.graph.node_mut(node)?.set_parameter(key.clone(), value);
        self.invalidate_from(node);
        self.emit(GraphEvent::ParameterChanged { node, key });
        Ok(previous)
    }

    pub fn set_strategy(
        &mut self,
        node: NodeId,
        strategy: ExecutionStrategy,
    ) -> Result<(), GraphError> {
        self.graph.node_mut(node)?.set_strategy(strategy);
        self.invalidate_from(node);
        self.emit(GraphEvent::StrategyChanged { node });
        Ok(())
    }

    /// Drops cached outputs of `node` and of every node downstream of it.
    /// Returns the number of removed entries.
    pub fn invalidate_from(&self, node: NodeId) -> usize {
        let mut removed = self.cache.invalidate(node);
        for downstream in self.graph.downstream(node) {
            removed += self.cache.invalidate(downstream);
        }
        if removed > 0 {
            self.emit(GraphEvent::CacheInvalidated { node, removed });
        }
        removed
    }

    pub fn validate(&self) -> ValidationReport {
        self.graph.validate()
    }

    /// A run over a snapshot of the current graph, sharing this project's
    /// cache. Refused when validation reports errors.
    ///
    /// The run records the cache generation of every node, so edits made
    /// while it executes keep its results for the edited nodes, and
    /// everything downstream of them, out of the cache.
    pub fn create_run(&self) -> Result<GraphRun, RunError> {
        let report = self.validate();
        if report.has_errors() {
            ValidationFailed {
                graph: &self.name,
                errors: report.error_count(),
                warnings: report.warning_count(),
            }
            .log();
            return Err(RunError::Validation(report));
        }
        let (graph, copies) = self.graph.duplicate(IdPolicy::Preserve);
        let generations = self.cache.generations(copies.keys().copied());
        let origins = copies.into_iter().map(|(origin, copy)| (copy, origin)).collect();
        Ok(GraphRun::new(graph)
            .with_name(self.name.clone())
            .with_cache(self.cache.clone())
            .with_settings(self.settings)
            .with_origins(origins)
            .with_generations(generations))
    }

    /// Validates and enqueues a run. Nothing is enqueued for an invalid graph.
    pub fn submit(&self, queue: &RunQueue) -> Result<RunId, RunError> {
        let run = self.create_run()?;
        Ok(queue.submit(Box::new(run))?)
    }

    /// Like [`submit`](Self::submit), also returning a receiver for the
    /// run's outputs.
    pub fn submit_with_outputs(
        &self,
        queue: &RunQueue,
    ) -> Result<(RunId, oneshot::Receiver<RunOutputs>), RunError> {
        let (run, outputs) = self.create_run()?.with_outputs();
        let id = queue.submit(Box::new(run))?;
        Ok((id, outputs))
    }

    /// Reads an exported slot from `dir` and caches it as an output of
    /// `node`, as if the node had computed it.
    pub fn import_slot(
        &self,
        node: NodeId,
        dir: &Path,
        registry: &DataTypeRegistry,
        progress: &ProgressInfo,
    ) -> Result<Arc<DataSlot>, ImportError> {
        let target = self.graph.node(node).ok_or(ImportError::UnknownNode(node))?;
        let slot = data::import_slot(dir, registry, node, progress)?;
        let info = target
            .output(slot.name())
            .ok_or_else(|| ImportError::UnknownSlot {
                slot: slot.name().to_string(),
            })?;
        if !slot.data_type().is_assignable_to(&info.data_type) {
            return Err(ImportError::Slot(SlotError::TypeMismatch {
                slot: slot.name().to_string(),
                expected: info.data_type.id().to_string(),
                actual: slot.data_type().id().to_string(),
            }));
        }

        for downstream in self.graph.downstream(node) {
            self.cache.invalidate(downstream);
        }
        let slot = Arc::new(slot);
        self.cache.store(node, None, slot.clone(), progress);
        Ok(slot)
    }

    /// Writes the cached output `slot` of `node` to `dir`. Returns `false`
    /// when nothing is cached.
    pub fn export_cached(
        &self,
        node: NodeId,
        slot: &str,
        dir: &Path,
        progress: &ProgressInfo,
    ) -> Result<bool, ExportError> {
        match self.cache.acquire(node, slot) {
            Some(handle) => {
                data::export_slot(&handle, dir, progress)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn emit(&self, event: GraphEvent) {
        let _ = self.events.send(event);
    }
}
