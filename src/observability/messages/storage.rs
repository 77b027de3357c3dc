// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for slot import and export.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing::Span;

/// A slot was written to disk.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_slotflow::observability::messages::storage::SlotExported;
/// use std::path::Path;
///
/// let msg = SlotExported {
///     slot: "Output",
///     rows: 3,
///     path: Path::new("/tmp/export"),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct SlotExported<'a> {
    pub slot: &'a str,
    pub rows: usize,
    pub path: &'a Path,
}

impl Display for SlotExported<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Exported slot '{}' ({} rows) to {}",
            self.slot,
            self.rows,
            self.path.display()
        )
    }
}

impl StructuredLog for SlotExported<'_> {
    fn log(&self) {
        tracing::info!(
            slot = self.slot,
            rows = self.rows,
            path = %self.path.display(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "slot_export",
            span_name = name,
            slot = self.slot,
            path = %self.path.display(),
        )
    }
}

/// A slot was read back from disk.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SlotImported<'a> {
    pub slot: &'a str,
    pub rows: usize,
    pub path: &'a Path,
}

impl Display for SlotImported<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Imported slot '{}' ({} rows) from {}",
            self.slot,
            self.rows,
            self.path.display()
        )
    }
}

impl StructuredLog for SlotImported<'_> {
    fn log(&self) {
        tracing::info!(
            slot = self.slot,
            rows = self.rows,
            path = %self.path.display(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "slot_import",
            span_name = name,
            slot = self.slot,
            path = %self.path.display(),
        )
    }
}
