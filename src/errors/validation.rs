// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph validation report.
//!
//! Validation never stops at the first problem. Every check appends to a
//! [`ValidationReport`] so that a user can see all issues at once. A run is
//! refused whenever the report contains at least one [`ValidationLevel::Error`].

use std::fmt;

use crate::graph::{NodeId, SlotRef};

/// Severity of a single report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    /// Reported to the user but does not block execution
    Warning,
    /// Blocks execution
    Error,
}

/// Where an issue was found.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationContext {
    Graph,
    Node { id: NodeId, name: String },
    Slot { slot: SlotRef },
    Edge { from: SlotRef, to: SlotRef },
    Import { path: String },
}

/// The problem itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    /// An edge references a node or slot that does not exist
    UnknownEndpoint { endpoint: SlotRef },
    /// An edge connects slots whose data types are not assignable
    TypeMismatch {
        source_type: String,
        target_type: String,
    },
    /// An input slot has more incoming edges than it accepts
    ArityExceeded { connections: usize, max: usize },
    /// The graph contains a cycle
    CyclicDependency {
        /// Node names along the cycle, first and last entries are equal
        cycle: Vec<String>,
    },
    /// A required input slot has no incoming edge
    MissingInput { slot: String },
    /// Iteration steps could not be generated for a node
    StepGeneration { message: String },
    /// Reported by a node's algorithm
    Algorithm { message: String },
    /// A slot could not be imported from disk
    Import { message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::UnknownEndpoint { endpoint } => {
                write!(f, "Connection references unknown slot '{}'", endpoint)
            }
            ValidationIssue::TypeMismatch {
                source_type,
                target_type,
            } => {
                write!(
                    f,
                    "Cannot pass '{}' data into a slot that accepts '{}'",
                    source_type, target_type
                )
            }
            ValidationIssue::ArityExceeded { connections, max } => {
                write!(
                    f,
                    "Input has {} incoming connections but accepts at most {}",
                    connections, max
                )
            }
            ValidationIssue::CyclicDependency { cycle } => {
                write!(f, "Cyclic dependency detected: {}", cycle.join(" -> "))
            }
            ValidationIssue::MissingInput { slot } => {
                write!(f, "Required input '{}' is not connected", slot)
            }
            ValidationIssue::StepGeneration { message } => {
                write!(f, "Unable to generate iteration steps: {}", message)
            }
            ValidationIssue::Algorithm { message } => write!(f, "{}", message),
            ValidationIssue::Import { message } => write!(f, "Import failed: {}", message),
        }
    }
}

impl fmt::Display for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationContext::Graph => write!(f, "graph"),
            ValidationContext::Node { name, .. } => write!(f, "node '{}'", name),
            ValidationContext::Slot { slot } => write!(f, "slot '{}'", slot),
            ValidationContext::Edge { from, to } => write!(f, "connection {} -> {}", from, to),
            ValidationContext::Import { path } => write!(f, "import '{}'", path),
        }
    }
}

/// One finding of a validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationEntry {
    pub level: ValidationLevel,
    pub context: ValidationContext,
    pub issue: ValidationIssue,
}

impl fmt::Display for ValidationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            ValidationLevel::Warning => "warning",
            ValidationLevel::Error => "error",
        };
        write!(f, "[{}] {}: {}", level, self.context, self.issue)
    }
}

/// Accumulated result of a validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    entries: Vec<ValidationEntry>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ValidationEntry) {
        self.entries.push(entry);
    }

    pub fn error(&mut self, context: ValidationContext, issue: ValidationIssue) {
        self.push(ValidationEntry {
            level: ValidationLevel::Error,
            context,
            issue,
        });
    }

    pub fn warning(&mut self, context: ValidationContext, issue: ValidationIssue) {
        self.push(ValidationEntry {
            level: ValidationLevel::Warning,
            context,
            issue,
        });
    }

    /// Appends all entries of another report.
    pub fn merge(&mut self, other: ValidationReport) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.level == ValidationLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.level == ValidationLevel::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// `true` when nothing blocks execution. Warnings are allowed.
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "no issues");
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts_levels_separately() {
        let mut report = ValidationReport::new();
        report.warning(
            ValidationContext::Graph,
            ValidationIssue::Algorithm {
                message: "separator is empty".to_string(),
            },
        );
        assert!(report.is_valid());

        report.error(
            ValidationContext::Graph,
            ValidationIssue::CyclicDependency {
                cycle: vec!["a".into(), "b".into(), "a".into()],
            },
        );
        assert!(!report.is_valid());
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_cycle_display_joins_names() {
        let issue = ValidationIssue::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(issue.to_string(), "Cyclic dependency detected: a -> b -> a");
    }

    #[test]
    fn test_merge_keeps_all_entries() {
        let mut first = ValidationReport::new();
        first.error(
            ValidationContext::Graph,
            ValidationIssue::MissingInput {
                slot: "Input".into(),
            },
        );
        let mut second = ValidationReport::new();
        second.error(
            ValidationContext::Import {
                path: "/tmp/x".into(),
            },
            ValidationIssue::Import {
                message: "boom".into(),
            },
        );
        first.merge(second);
        assert_eq!(first.error_count(), 2);
        assert!(first.to_string().contains("import '/tmp/x'"));
    }
}
