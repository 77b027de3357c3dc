// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while generating iteration steps and executing runs.

use std::error::Error;
use std::fmt;

use thiserror::Error;

use crate::data::Annotations;
use crate::engine::RunId;
use crate::errors::{GraphError, SlotError, ValidationReport};
use crate::graph::NodeId;

/// Input slots could not be turned into iteration steps.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepGenerationError {
    #[error("Input slots have incompatible row counts: {}", format_sizes(.sizes))]
    SizeMismatch {
        /// Slot name and row count for every participating slot
        sizes: Vec<(String, usize)>,
    },

    #[error("Incomplete iteration step {annotations}: no rows for required input '{slot}'")]
    IncompleteStep { slot: String, annotations: Annotations },
}

fn format_sizes(sizes: &[(String, usize)]) -> String {
    sizes
        .iter()
        .map(|(name, rows)| format!("{}={}", name, rows))
        .collect::<Vec<_>>()
        .join(", ")
}

/// An algorithm failed while processing one iteration step.
///
/// Carries enough context to locate the offending input rows: the node, the
/// step position, the row indices taken from each input slot, and the merged
/// annotations of the step.
#[derive(Debug)]
pub struct IterationError {
    pub node_id: NodeId,
    pub node_name: String,
    pub step_index: usize,
    pub step_count: usize,
    pub rows: Vec<(String, Vec<usize>)>,
    pub annotations: Annotations,
    pub cause: anyhow::Error,
}

impl fmt::Display for IterationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node '{}' failed at iteration step {}/{}",
            self.node_name,
            self.step_index + 1,
            self.step_count
        )?;
        if !self.rows.is_empty() {
            let rows = self
                .rows
                .iter()
                .map(|(slot, rows)| format!("{}{:?}", slot, rows))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " (rows {})", rows)?;
        }
        if !self.annotations.is_empty() {
            write!(f, " {}", self.annotations)?;
        }
        write!(f, ": {}", self.cause)
    }
}

impl Error for IterationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.cause)
    }
}

/// Outcome of a failed or interrupted run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Validation failed with {} error(s):\n{}", .0.error_count(), .0)]
    Validation(ValidationReport),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Run was cancelled")]
    Cancelled,

    #[error(transparent)]
    Iteration(#[from] IterationError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Queue(#[from] RunQueueError),

    #[error("Run task panicked: {0}")]
    Panicked(String),
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}

/// Errors returned by the [`RunQueue`](crate::engine::RunQueue) handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunQueueError {
    #[error("Run queue worker has shut down")]
    Closed,

    #[error("Unknown run: {0}")]
    UnknownRun(RunId),
}
