// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed, ordered row containers.
//!
//! A [`DataSlot`] belongs to one node and holds the rows that node produced
//! (or received) for one named port. Rows keep their insertion order for the
//! lifetime of the slot. Once sealed, a slot is shared read-only through
//! `Arc<DataSlot>` and every attempt to modify it fails.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::{Annotations, CopyPolicy, DataItem, DataType};
use crate::errors::SlotError;
use crate::graph::NodeId;

/// Default number of connections an input slot accepts.
pub const DEFAULT_INPUT_CONNECTIONS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotDirection {
    Input,
    Output,
}

impl fmt::Display for SlotDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotDirection::Input => write!(f, "input"),
            SlotDirection::Output => write!(f, "output"),
        }
    }
}

/// Declaration of a node port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub name: String,
    pub data_type: DataType,
    pub direction: SlotDirection,
    /// An optional input may stay unconnected or receive no rows
    pub optional: bool,
    /// Upper bound of incoming connections. Outputs are unbounded.
    pub max_connections: usize,
}

impl SlotInfo {
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            direction: SlotDirection::Input,
            optional: false,
            max_connections: DEFAULT_INPUT_CONNECTIONS,
        }
    }

    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            direction: SlotDirection::Output,
            optional: false,
            max_connections: usize::MAX,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn is_input(&self) -> bool {
        self.direction == SlotDirection::Input
    }
}

/// Provenance of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataContext {
    pub id: Uuid,
    /// Node that produced the item, if known
    pub source: Option<NodeId>,
    /// Contexts of the rows the item was derived from
    #[serde(default)]
    pub parents: Vec<Uuid>,
}

impl DataContext {
    pub fn new(source: Option<NodeId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            parents: Vec::new(),
        }
    }

    pub fn derived(source: NodeId, parents: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: Some(source),
            parents,
        }
    }
}

impl Default for DataContext {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Clone)]
pub struct DataRow {
    pub item: DataItem,
    pub annotations: Annotations,
    pub context: DataContext,
}

/// How a reader wants to receive an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Share the stored instance unless the item asks to be duplicated
    #[default]
    Share,
    /// Always hand out a private duplicate
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct DataSlot {
    node_id: NodeId,
    name: String,
    data_type: DataType,
    rows: Vec<DataRow>,
    sealed: bool,
}

impl DataSlot {
    pub fn new(node_id: NodeId, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            node_id,
            name: name.into(),
            data_type,
            rows: Vec::new(),
            sealed: false,
        }
    }

    pub fn from_info(node_id: NodeId, info: &SlotInfo) -> Self {
        Self::new(node_id, info.name.clone(), info.data_type.clone())
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.node_id)
    }

    /// Appends a row. Fails when the item's type is not assignable to the
    /// slot's declared type, or after [`seal`](Self::seal).
    pub fn add_row(
        &mut self,
        item: DataItem,
        annotations: Annotations,
        context: DataContext,
    ) -> Result<(), SlotError> {
        if self.sealed {
            return Err(SlotError::Sealed {
                slot: self.name.clone(),
            });
        }
        let actual = item.data_type();
        if !actual.is_assignable_to(&self.data_type) {
            return Err(SlotError::TypeMismatch {
                slot: self.name.clone(),
                expected: self.data_type.id().to_string(),
                actual: actual.id().to_string(),
            });
        }
        self.rows.push(DataRow {
            item,
            annotations,
            context,
        });
        Ok(())
    }

    /// Appends every row of `other`, sharing the items.
    pub fn add_rows_from(&mut self, other: &DataSlot) -> Result<(), SlotError> {
        for row in &other.rows {
            self.add_row(row.item.clone(), row.annotations.clone(), row.context.clone())?;
        }
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Result<&DataRow, SlotError> {
        self.rows.get(index).ok_or_else(|| SlotError::RowOutOfRange {
            slot: self.name.clone(),
            index,
            rows: self.rows.len(),
        })
    }

    /// Reads the item of row `index` according to `mode` and the item's own
    /// [`CopyPolicy`].
    pub fn data(&self, index: usize, mode: ReadMode) -> Result<DataItem, SlotError> {
        let item = &self.row(index)?.item;
        let duplicate =
            mode == ReadMode::Duplicate || item.copy_policy() == CopyPolicy::DuplicateOnRead;
        Ok(if duplicate {
            item.duplicate()
        } else {
            item.clone()
        })
    }

    pub fn annotations(&self, index: usize) -> Result<&Annotations, SlotError> {
        Ok(&self.row(index)?.annotations)
    }

    pub fn annotation(&self, index: usize, name: &str) -> Option<&str> {
        self.rows.get(index).and_then(|row| row.annotations.get(name))
    }

    /// Sorted union of the annotation names over all rows.
    pub fn annotation_columns(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|row| row.annotations.names())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// A sealed copy sharing this slot's items.
    pub fn sealed_copy(&self) -> DataSlot {
        let mut copy = self.clone();
        copy.sealed = true;
        copy
    }
}

impl fmt::Display for DataSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {} row(s)",
            self.display_name(),
            self.data_type,
            self.rows.len()
        )?;
        let columns = self.annotation_columns();
        if !columns.is_empty() {
            write!(f, ", annotations: {}", columns.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Data, TextData};
    use std::any::Any;
    use std::path::Path;
    use std::sync::Arc;

    #[derive(Debug)]
    struct MaskData;

    impl Data for MaskData {
        fn data_type(&self) -> DataType {
            DataType::new("mask").with_supertype("image")
        }

        fn duplicate(&self) -> DataItem {
            Arc::new(MaskData)
        }

        fn copy_policy(&self) -> CopyPolicy {
            CopyPolicy::DuplicateOnRead
        }

        fn save_to(&self, _dir: &Path) -> anyhow::Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn text_slot() -> DataSlot {
        DataSlot::new(NodeId::new(), "Output", DataType::text())
    }

    #[test]
    fn test_rows_keep_insertion_order() {
        let mut slot = text_slot();
        for text in ["a", "b", "c"] {
            slot.add_row(TextData::item(text), Annotations::new(), DataContext::default())
                .unwrap();
        }
        let texts: Vec<String> = slot.rows().iter().map(|r| r.item.summary()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut slot = text_slot();
        let err = slot
            .add_row(Arc::new(MaskData), Annotations::new(), DataContext::default())
            .unwrap_err();
        assert!(matches!(err, SlotError::TypeMismatch { .. }));
        assert!(slot.is_empty());
    }

    #[test]
    fn test_subtype_is_accepted() {
        let mut slot = DataSlot::new(NodeId::new(), "Image", DataType::new("image"));
        slot.add_row(Arc::new(MaskData), Annotations::new(), DataContext::default())
            .unwrap();
        assert_eq!(slot.row_count(), 1);
    }

    #[test]
    fn test_sealed_slot_rejects_rows() {
        let mut slot = text_slot();
        slot.seal();
        let err = slot
            .add_row(TextData::item("late"), Annotations::new(), DataContext::default())
            .unwrap_err();
        assert_eq!(
            err,
            SlotError::Sealed {
                slot: "Output".to_string()
            }
        );
    }

    #[test]
    fn test_read_modes() {
        let mut slot = DataSlot::new(NodeId::new(), "Any", DataType::root());
        slot.add_row(TextData::item("shared"), Annotations::new(), DataContext::default())
            .unwrap();
        slot.add_row(Arc::new(MaskData), Annotations::new(), DataContext::default())
            .unwrap();

        let stored = slot.row(0).unwrap().item.clone();
        assert!(Arc::ptr_eq(&stored, &slot.data(0, ReadMode::Share).unwrap()));
        assert!(!Arc::ptr_eq(&stored, &slot.data(0, ReadMode::Duplicate).unwrap()));

        let mask = slot.row(1).unwrap().item.clone();
        assert!(!Arc::ptr_eq(&mask, &slot.data(1, ReadMode::Share).unwrap()));
    }

    #[test]
    fn test_annotation_columns_are_a_sorted_union() {
        let mut slot = text_slot();
        slot.add_row(
            TextData::item("a"),
            Annotations::new().with("Sample", "1"),
            DataContext::default(),
        )
        .unwrap();
        slot.add_row(
            TextData::item("b"),
            Annotations::new().with("Channel", "red"),
            DataContext::default(),
        )
        .unwrap();
        assert_eq!(slot.annotation_columns(), vec!["Channel", "Sample"]);
        assert_eq!(slot.annotation(0, "Sample"), Some("1"));
        assert_eq!(slot.annotation(1, "Sample"), None);
    }

    #[test]
    fn test_row_out_of_range() {
        let slot = text_slot();
        assert!(matches!(
            slot.data(3, ReadMode::Share),
            Err(SlotError::RowOutOfRange { index: 3, rows: 0, .. })
        ));
    }
}
