// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Data items and their declared types.

use std::any::Any;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Id of the root type that accepts every item.
pub const ROOT_DATA_TYPE: &str = "data";

/// Id of the built-in [`TextData`] type.
pub const TEXT_DATA_TYPE: &str = "text";

/// File name used by [`TextData`] inside its row folder.
const TEXT_FILE_NAME: &str = "text.txt";

/// Declared type of a slot or an item.
///
/// A type is identified by its id and lists the ids of every type it can
/// stand in for. Assignability is checked against that list, the root type
/// [`ROOT_DATA_TYPE`] accepts everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    id: String,
    #[serde(default)]
    supertypes: Vec<String>,
}

impl DataType {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            supertypes: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_DATA_TYPE)
    }

    pub fn text() -> Self {
        Self::new(TEXT_DATA_TYPE)
    }

    pub fn with_supertype(mut self, id: impl Into<String>) -> Self {
        self.supertypes.push(id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_DATA_TYPE
    }

    /// Whether an item of this type may be stored in a slot declared as `target`.
    pub fn is_assignable_to(&self, target: &DataType) -> bool {
        target.is_root() || self.id == target.id || self.supertypes.iter().any(|s| s == &target.id)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// How a shared item is handed out to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyPolicy {
    /// Readers share the same instance
    #[default]
    Share,
    /// Every read returns a private duplicate
    DuplicateOnRead,
}

/// An opaque typed payload stored in a slot row.
///
/// Items are immutable once stored and shared behind [`Arc`]. Implementations
/// that hold mutable state should report [`CopyPolicy::DuplicateOnRead`].
pub trait Data: Any + Send + Sync + fmt::Debug {
    fn data_type(&self) -> DataType;

    fn duplicate(&self) -> DataItem;

    fn copy_policy(&self) -> CopyPolicy {
        CopyPolicy::Share
    }

    /// Writes the payload into an existing, empty row folder.
    fn save_to(&self, dir: &Path) -> anyhow::Result<()>;

    /// Short human-readable description used by result browsers and logs.
    fn summary(&self) -> String {
        format!("{:?}", self)
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Data {
    pub fn downcast_ref<T: Data>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Shared handle to a data item. Identity is `Arc::ptr_eq`.
pub type DataItem = Arc<dyn Data>;

/// Plain text payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextData {
    text: String,
}

impl TextData {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn item(text: impl Into<String>) -> DataItem {
        Arc::new(Self::new(text))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Reads a row folder written by [`Data::save_to`].
    pub fn load(dir: &Path) -> anyhow::Result<DataItem> {
        let text = fs::read_to_string(dir.join(TEXT_FILE_NAME))?;
        Ok(Self::item(text))
    }
}

impl Data for TextData {
    fn data_type(&self) -> DataType {
        DataType::text()
    }

    fn duplicate(&self) -> DataItem {
        Arc::new(self.clone())
    }

    fn save_to(&self, dir: &Path) -> anyhow::Result<()> {
        fs::write(dir.join(TEXT_FILE_NAME), &self.text)?;
        Ok(())
    }

    fn summary(&self) -> String {
        self.text.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_accepts_everything() {
        let mask = DataType::new("mask").with_supertype("image");
        assert!(mask.is_assignable_to(&DataType::root()));
        assert!(DataType::text().is_assignable_to(&DataType::root()));
    }

    #[test]
    fn test_assignability_follows_supertypes() {
        let image = DataType::new("image");
        let mask = DataType::new("mask").with_supertype("image");
        let table = DataType::new("table");

        assert!(mask.is_assignable_to(&image));
        assert!(mask.is_assignable_to(&mask));
        assert!(!image.is_assignable_to(&mask));
        assert!(!mask.is_assignable_to(&table));
    }

    #[test]
    fn test_downcast_text_item() {
        let item = TextData::item("hello");
        let text = item.downcast_ref::<TextData>().expect("text item");
        assert_eq!(text.text(), "hello");
        assert_eq!(item.data_type(), DataType::text());
    }

    #[test]
    fn test_duplicate_is_a_distinct_instance() {
        let item = TextData::item("hello");
        let copy = item.duplicate();
        assert!(!Arc::ptr_eq(&item, &copy));
        assert_eq!(copy.summary(), "hello");
    }

    #[test]
    fn test_text_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        TextData::new("persisted").save_to(dir.path()).unwrap();
        let loaded = TextData::load(dir.path()).unwrap();
        assert_eq!(loaded.summary(), "persisted");
    }
}
