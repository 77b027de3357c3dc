// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod graph;
mod slot;
mod storage;
mod validation;

pub use config::ConfigError;
pub use execution::{IterationError, RunError, RunQueueError, StepGenerationError};
pub use graph::GraphError;
pub use slot::SlotError;
pub use storage::{ExportError, ImportError};
pub use validation::{
    ValidationContext, ValidationEntry, ValidationIssue, ValidationLevel, ValidationReport,
};
