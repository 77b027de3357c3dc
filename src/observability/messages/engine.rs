// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph run lifecycle and node execution events.
//!
//! This module contains message types for logging events related to:
//! * Graph run start, completion, and cancellation
//! * Node execution and cache hits
//! * Iteration step failures

use crate::graph::NodeId;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A graph run started executing its nodes.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_slotflow::observability::messages::engine::RunStarted;
///
/// let msg = RunStarted {
///     run: "pipeline",
///     node_count: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunStarted<'a> {
    pub run: &'a str,
    pub node_count: usize,
}

impl Display for RunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting graph run '{}' with {} node(s)",
            self.run, self.node_count
        )
    }
}

impl StructuredLog for RunStarted<'_> {
    fn log(&self) {
        tracing::info!(run = self.run, node_count = self.node_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph_run",
            span_name = name,
            run = self.run,
            node_count = self.node_count,
        )
    }
}

/// A node is about to execute its iteration steps.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeExecutionStarted<'a> {
    pub node_id: &'a NodeId,
    pub node_name: &'a str,
    pub strategy: &'a str,
    pub step_count: usize,
}

impl Display for NodeExecutionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Executing node '{}' with {} strategy: {} step(s)",
            self.node_name, self.strategy, self.step_count
        )
    }
}

impl StructuredLog for NodeExecutionStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = %self.node_id,
            node_name = self.node_name,
            strategy = self.strategy,
            step_count = self.step_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node_execution",
            span_name = name,
            node_id = %self.node_id,
            node_name = self.node_name,
            strategy = self.strategy,
        )
    }
}

/// A node was skipped because all of its outputs were cached.
///
/// # Log Level
/// `info!` - Important operational event
pub struct NodeSkippedCached<'a> {
    pub node_id: &'a NodeId,
    pub node_name: &'a str,
}

impl Display for NodeSkippedCached<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' outputs are cached, skipping", self.node_name)
    }
}

impl StructuredLog for NodeSkippedCached<'_> {
    fn log(&self) {
        tracing::info!(
            node_id = %self.node_id,
            node_name = self.node_name,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "node_cached",
            span_name = name,
            node_id = %self.node_id,
            node_name = self.node_name,
        )
    }
}

/// A node finished all of its iteration steps.
///
/// # Log Level
/// `debug!` - Per-node detail
///
/// # Example
/// ```
/// use the_slotflow::graph::NodeId;
/// use the_slotflow::observability::messages::engine::NodeExecutionCompleted;
/// use std::time::Duration;
///
/// let id = NodeId::new();
/// let msg = NodeExecutionCompleted {
///     node_id: &id,
///     node_name: "upper",
///     step_count: 3,
///     rows_produced: 3,
///     duration: Duration::from_millis(12),
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct NodeExecutionCompleted<'a> {
    pub node_id: &'a NodeId,
    pub node_name: &'a str,
    pub step_count: usize,
    pub rows_produced: usize,
    pub duration: Duration,
}

impl Display for NodeExecutionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' completed {} step(s), produced {} row(s) in {:?}",
            self.node_name, self.step_count, self.rows_produced, self.duration
        )
    }
}

impl StructuredLog for NodeExecutionCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = %self.node_id,
            node_name = self.node_name,
            step_count = self.step_count,
            rows_produced = self.rows_produced,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node_completed",
            span_name = name,
            node_id = %self.node_id,
            node_name = self.node_name,
            duration = ?self.duration,
        )
    }
}

/// An algorithm failed on one iteration step.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct IterationStepFailed<'a> {
    pub node_name: &'a str,
    pub step_index: usize,
    pub step_count: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for IterationStepFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' failed at step {}/{}: {}",
            self.node_name,
            self.step_index + 1,
            self.step_count,
            self.error
        )
    }
}

impl StructuredLog for IterationStepFailed<'_> {
    fn log(&self) {
        tracing::error!(
            node_name = self.node_name,
            step_index = self.step_index,
            step_count = self.step_count,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "iteration_step_failed",
            span_name = name,
            node_name = self.node_name,
            step_index = self.step_index,
            error = %self.error,
        )
    }
}

/// A graph run finished every node.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunCompleted<'a> {
    pub run: &'a str,
    pub executed: usize,
    pub cached: usize,
    pub duration: Duration,
}

impl Display for RunCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph run '{}' completed: {} node(s) executed, {} from cache in {:?}",
            self.run, self.executed, self.cached, self.duration
        )
    }
}

impl StructuredLog for RunCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            run = self.run,
            executed = self.executed,
            cached = self.cached,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph_run_completed",
            span_name = name,
            run = self.run,
            executed = self.executed,
            cached = self.cached,
            duration = ?self.duration,
        )
    }
}

/// A graph run stopped at a cancellation check.
///
/// # Log Level
/// `warn!` - Run ended without results
pub struct RunCancelled<'a> {
    pub run: &'a str,
    /// Node that was executing or about to execute
    pub node_name: &'a str,
}

impl Display for RunCancelled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph run '{}' cancelled at node '{}'",
            self.run, self.node_name
        )
    }
}

impl StructuredLog for RunCancelled<'_> {
    fn log(&self) {
        tracing::warn!(run = self.run, node_name = self.node_name, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "graph_run_cancelled",
            span_name = name,
            run = self.run,
            node_name = self.node_name,
        )
    }
}
