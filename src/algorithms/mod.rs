// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in text algorithms for demos and tests.
//!
//! * `SourceText` - emits rows listed in its parameters
//! * `ChangeTextCase` - converts each row to upper, lower, proper, or title case
//! * `JoinText` - joins annotation-matched rows of two inputs

pub mod change_text_case;
mod factory;
pub mod join_text;
pub mod source_text;
#[cfg(test)]
pub(crate) mod stub;

use anyhow::anyhow;

pub use change_text_case::{CaseType, ChangeTextCase};
pub use factory::AlgorithmFactory;
pub use join_text::JoinText;
pub use source_text::{SourceRow, SourceText};

use crate::data::{DataItem, TextData};

/// The text of a `TextData` item.
pub(crate) fn text_of(item: &DataItem) -> anyhow::Result<&str> {
    item.downcast_ref::<TextData>()
        .map(TextData::text)
        .ok_or_else(|| anyhow!("Expected text data, got {}", item.data_type()))
}
