// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph validation outcomes.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A graph failed validation and will not be run.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_slotflow::observability::messages::validation::ValidationFailed;
///
/// let msg = ValidationFailed {
///     graph: "pipeline",
///     errors: 2,
///     warnings: 1,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ValidationFailed<'a> {
    pub graph: &'a str,
    pub errors: usize,
    pub warnings: usize,
}

impl Display for ValidationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' failed validation: {} error(s), {} warning(s)",
            self.graph, self.errors, self.warnings
        )
    }
}

impl StructuredLog for ValidationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            graph = self.graph,
            errors = self.errors,
            warnings = self.warnings,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "validation_failed",
            span_name = name,
            graph = self.graph,
            errors = self.errors,
        )
    }
}

/// A validation finding reported as a warning.
///
/// # Log Level
/// `warn!` - Potential issue
pub struct ValidationWarning<'a> {
    pub graph: &'a str,
    pub message: &'a str,
}

impl Display for ValidationWarning<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Graph '{}': {}", self.graph, self.message)
    }
}

impl StructuredLog for ValidationWarning<'_> {
    fn log(&self) {
        tracing::warn!(graph = self.graph, message = self.message, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "validation_warning",
            span_name = name,
            graph = self.graph,
        )
    }
}
