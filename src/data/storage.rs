// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! On-disk layout of an exported slot.
//!
//! ```text
//! <dir>/data-table.json   manifest: slot name, type, and one entry per row
//! <dir>/0/                payload of row 0, written by `Data::save_to`
//! <dir>/1/                ...
//! ```
//!
//! Import resolves each row's type id through a [`DataTypeRegistry`] and
//! rebuilds a sealed slot. Any failure is returned as an [`ImportError`],
//! which converts into a validation report entry.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{Annotations, DataContext, DataItem, DataSlot, DataType, TextData};
use crate::engine::ProgressInfo;
use crate::errors::{ExportError, ImportError};
use crate::graph::NodeId;
use crate::observability::messages::storage::{SlotExported, SlotImported};
use crate::observability::messages::StructuredLog;

/// File name of the manifest inside an exported slot folder.
pub const DATA_TABLE_FILE: &str = "data-table.json";

/// Reads one row folder back into an item.
pub type DataLoader = Arc<dyn Fn(&Path) -> anyhow::Result<DataItem> + Send + Sync>;

#[derive(Debug, Serialize, Deserialize)]
struct SlotManifest {
    slot: String,
    data_type: String,
    rows: Vec<RowManifest>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RowManifest {
    index: usize,
    data_type: String,
    #[serde(default)]
    annotations: Annotations,
    context: DataContext,
}

/// Known data types and how to load them.
#[derive(Clone, Default)]
pub struct DataTypeRegistry {
    types: HashMap<String, (DataType, DataLoader)>,
}

impl DataTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that knows the root type and [`TextData`].
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register(DataType::text(), Arc::new(TextData::load));
        registry
    }

    pub fn register(&mut self, data_type: DataType, loader: DataLoader) {
        self.types
            .insert(data_type.id().to_string(), (data_type, loader));
    }

    /// Resolves a type id. The root type is always known.
    pub fn resolve(&self, type_id: &str) -> Option<DataType> {
        if type_id == DataType::root().id() {
            return Some(DataType::root());
        }
        self.types.get(type_id).map(|(data_type, _)| data_type.clone())
    }

    fn loader(&self, type_id: &str) -> Option<&DataLoader> {
        self.types.get(type_id).map(|(_, loader)| loader)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.resolve(type_id).is_some()
    }
}

/// Writes `slot` into `dir`, creating it when needed.
pub fn export_slot(slot: &DataSlot, dir: &Path, progress: &ProgressInfo) -> Result<(), ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let total = slot.row_count();
    let mut rows = Vec::with_capacity(total);
    for (index, row) in slot.rows().iter().enumerate() {
        progress.resolve_and_log("Data row", index, total);
        let row_dir = dir.join(index.to_string());
        fs::create_dir_all(&row_dir).map_err(|source| ExportError::Io {
            path: row_dir.clone(),
            source,
        })?;
        row.item
            .save_to(&row_dir)
            .map_err(|e| ExportError::RowSaveFailed {
                row: index,
                message: e.to_string(),
            })?;
        rows.push(RowManifest {
            index,
            data_type: row.item.data_type().id().to_string(),
            annotations: row.annotations.clone(),
            context: row.context.clone(),
        });
    }

    let manifest = SlotManifest {
        slot: slot.name().to_string(),
        data_type: slot.data_type().id().to_string(),
        rows,
    };
    let path = dir.join(DATA_TABLE_FILE);
    let content = serde_json::to_string_pretty(&manifest)?;
    fs::write(&path, content).map_err(|source| ExportError::Io { path, source })?;

    SlotExported {
        slot: slot.name(),
        rows: total,
        path: dir,
    }
    .log();
    Ok(())
}

/// Reads a slot exported by [`export_slot`] and assigns it to `node_id`.
///
/// The returned slot is sealed.
pub fn import_slot(
    dir: &Path,
    registry: &DataTypeRegistry,
    node_id: NodeId,
    progress: &ProgressInfo,
) -> Result<DataSlot, ImportError> {
    let manifest_path = dir.join(DATA_TABLE_FILE);
    let content = fs::read_to_string(&manifest_path).map_err(|source| ImportError::Io {
        path: manifest_path.clone(),
        source,
    })?;
    let manifest: SlotManifest =
        serde_json::from_str(&content).map_err(|source| ImportError::MalformedManifest {
            path: manifest_path,
            source,
        })?;

    let slot_type = registry
        .resolve(&manifest.data_type)
        .ok_or_else(|| ImportError::UnknownDataType {
            type_id: manifest.data_type.clone(),
        })?;
    let mut slot = DataSlot::new(node_id, manifest.slot.clone(), slot_type);

    let total = manifest.rows.len();
    for (position, row) in manifest.rows.into_iter().enumerate() {
        progress.resolve_and_log("Data row", position, total);
        let row_dir: PathBuf = dir.join(row.index.to_string());
        if !row_dir.is_dir() {
            return Err(ImportError::MissingRowFolder {
                row: row.index,
                path: row_dir,
            });
        }
        let loader = registry
            .loader(&row.data_type)
            .ok_or_else(|| ImportError::UnknownDataType {
                type_id: row.data_type.clone(),
            })?;
        let item = loader(&row_dir).map_err(|e| ImportError::RowLoadFailed {
            row: row.index,
            message: e.to_string(),
        })?;
        slot.add_row(item, row.annotations, row.context)?;
    }
    slot.seal();

    SlotImported {
        slot: slot.name(),
        rows: slot.row_count(),
        path: dir,
    }
    .log();
    Ok(slot)
}
