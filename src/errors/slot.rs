// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Misuse of a [`DataSlot`](crate::data::DataSlot).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlotError {
    #[error("Slot '{slot}' accepts '{expected}' but received '{actual}'")]
    TypeMismatch {
        slot: String,
        expected: String,
        actual: String,
    },

    #[error("Slot '{slot}' is sealed and cannot be modified")]
    Sealed { slot: String },

    #[error("Row {index} is out of range for slot '{slot}' with {rows} row(s)")]
    RowOutOfRange {
        slot: String,
        index: usize,
        rows: usize,
    },

    #[error("Node has no output slot named '{slot}'")]
    UnknownOutput { slot: String },
}
