// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed data items, annotations, and slots.

mod annotations;
mod slot;
pub mod storage;
mod types;

pub use annotations::{AnnotationMergeMode, Annotations};
pub use slot::{
    DataContext, DataRow, DataSlot, ReadMode, SlotDirection, SlotInfo, DEFAULT_INPUT_CONNECTIONS,
};
pub use storage::{export_slot, import_slot, DataLoader, DataTypeRegistry};
pub use types::{CopyPolicy, Data, DataItem, DataType, TextData, ROOT_DATA_TYPE, TEXT_DATA_TYPE};
