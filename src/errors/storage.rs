// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

use crate::errors::{SlotError, ValidationContext, ValidationEntry, ValidationIssue, ValidationLevel};
use crate::graph::NodeId;

/// Errors raised while reading a slot back from its on-disk layout.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data table {path}: {source}")]
    MalformedManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown data type '{type_id}'")]
    UnknownDataType { type_id: String },

    #[error("Row {row} has no data folder at {path}")]
    MissingRowFolder { row: usize, path: PathBuf },

    #[error("Failed to load row {row}: {message}")]
    RowLoadFailed { row: usize, message: String },

    #[error("Cannot import into unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Node has no output slot named '{slot}'")]
    UnknownSlot { slot: String },

    #[error(transparent)]
    Slot(#[from] SlotError),
}

impl ImportError {
    /// Presents the failure as an error-level report entry for `path`.
    pub fn to_validation_entry(&self, path: impl Into<String>) -> ValidationEntry {
        ValidationEntry {
            level: ValidationLevel::Error,
            context: ValidationContext::Import { path: path.into() },
            issue: ValidationIssue::Import {
                message: self.to_string(),
            },
        }
    }
}

/// Errors raised while writing a slot to disk.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize data table: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to save row {row}: {message}")]
    RowSaveFailed { row: usize, message: String },
}
