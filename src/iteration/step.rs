// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::{AnnotationMergeMode, Annotations, DataItem, DataSlot, ReadMode};
use crate::errors::SlotError;

/// A sealed input slot as seen by step generation.
#[derive(Debug, Clone)]
pub struct InputSlot {
    pub name: String,
    pub optional: bool,
    pub slot: Arc<DataSlot>,
}

impl InputSlot {
    pub fn new(name: impl Into<String>, optional: bool, slot: Arc<DataSlot>) -> Self {
        Self {
            name: name.into(),
            optional,
            slot,
        }
    }

    pub fn row_count(&self) -> usize {
        self.slot.row_count()
    }
}

/// Rows one step takes from a single input slot.
#[derive(Debug, Clone)]
pub struct StepInput {
    pub name: String,
    pub slot: Arc<DataSlot>,
    pub rows: Vec<usize>,
}

/// The unit of algorithm invocation.
#[derive(Debug, Clone)]
pub struct IterationStep {
    index: usize,
    inputs: Vec<StepInput>,
    annotations: Annotations,
    unmatched: bool,
}

impl IterationStep {
    pub(crate) fn new(inputs: Vec<StepInput>, mode: AnnotationMergeMode) -> Self {
        let row_annotations: Vec<&Annotations> = inputs
            .iter()
            .flat_map(|input| {
                input
                    .rows
                    .iter()
                    .filter_map(|&row| input.slot.annotations(row).ok())
            })
            .collect();
        let annotations = Annotations::merge(row_annotations, mode);
        Self {
            index: 0,
            inputs,
            annotations,
            unmatched: false,
        }
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub(crate) fn mark_unmatched(&mut self) {
        self.unmatched = true;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn inputs(&self) -> &[StepInput] {
        &self.inputs
    }

    pub fn input(&self, slot: &str) -> Option<&StepInput> {
        self.inputs.iter().find(|input| input.name == slot)
    }

    /// Row indices taken from `slot`. Empty for unknown or absent slots.
    pub fn rows(&self, slot: &str) -> &[usize] {
        self.input(slot).map(|input| input.rows.as_slice()).unwrap_or(&[])
    }

    /// Items taken from `slot`, in row order.
    pub fn data(&self, slot: &str, mode: ReadMode) -> Result<Vec<DataItem>, SlotError> {
        match self.input(slot) {
            Some(input) => input
                .rows
                .iter()
                .map(|&row| input.slot.data(row, mode))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// The first item taken from `slot`, for strategies that pair single rows.
    pub fn single(&self, slot: &str, mode: ReadMode) -> Result<Option<DataItem>, SlotError> {
        match self.input(slot) {
            Some(input) => match input.rows.first() {
                Some(&row) => Ok(Some(input.slot.data(row, mode)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// `true` when the step lacks rows for a required input and was kept
    /// under [`UnmatchedRowPolicy::Divert`].
    pub fn is_unmatched(&self) -> bool {
        self.unmatched
    }

    /// Context ids of every participating row.
    pub fn parent_contexts(&self) -> Vec<Uuid> {
        self.inputs
            .iter()
            .flat_map(|input| {
                input
                    .rows
                    .iter()
                    .filter_map(|&row| input.slot.row(row).ok().map(|r| r.context.id))
            })
            .collect()
    }

    /// Slot name and row indices of every input, for error reports.
    pub fn row_summary(&self) -> Vec<(String, Vec<usize>)> {
        self.inputs
            .iter()
            .map(|input| (input.name.clone(), input.rows.clone()))
            .collect()
    }
}

/// Options shared by the single-iteration strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationSettings {
    #[serde(default)]
    pub annotation_merge: AnnotationMergeMode,
    /// Only steps whose index lies in this range are executed
    #[serde(default)]
    pub limit: Option<Range<usize>>,
}

/// What happens to a merged step that has no rows for a required input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedRowPolicy {
    /// Remove the step
    Drop,
    /// Keep the step as its own unit, flagged as unmatched
    Divert,
    /// Abort step generation
    Fail,
}

/// Which annotation columns decide that rows belong together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMatching {
    /// Every column present in any input
    #[default]
    Union,
    /// Columns present in every input
    Intersection,
    /// Columns starting with `#` present in any input
    PrefixHashUnion,
    /// Columns starting with `#` present in every input
    PrefixHashIntersection,
    /// Exactly these columns
    Custom(Vec<String>),
    /// All rows form one step
    MergeAll,
    /// Every row forms its own step
    SplitAll,
    /// No columns, all rows share the empty key
    None,
}

/// Options of the merging strategy.
///
/// There is no default: the unmatched policy must always be chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergingSettings {
    #[serde(default)]
    pub column_matching: ColumnMatching,
    #[serde(default)]
    pub excluded_columns: Vec<String>,
    pub unmatched: UnmatchedRowPolicy,
    #[serde(default)]
    pub annotation_merge: AnnotationMergeMode,
    #[serde(default)]
    pub limit: Option<Range<usize>>,
}

impl MergingSettings {
    pub fn new(unmatched: UnmatchedRowPolicy) -> Self {
        Self {
            column_matching: ColumnMatching::default(),
            excluded_columns: Vec::new(),
            unmatched,
            annotation_merge: AnnotationMergeMode::default(),
            limit: None,
        }
    }

    pub fn with_column_matching(mut self, column_matching: ColumnMatching) -> Self {
        self.column_matching = column_matching;
        self
    }

    pub fn excluding(mut self, column: impl Into<String>) -> Self {
        self.excluded_columns.push(column.into());
        self
    }
}

/// Keeps the steps whose index lies in `limit` and renumbers them.
pub(crate) fn apply_limit(steps: Vec<IterationStep>, limit: Option<&Range<usize>>) -> Vec<IterationStep> {
    let kept: Vec<IterationStep> = match limit {
        Some(range) => steps
            .into_iter()
            .enumerate()
            .filter(|(i, _)| range.contains(i))
            .map(|(_, step)| step)
            .collect(),
        None => steps,
    };
    renumber(kept)
}

pub(crate) fn renumber(steps: Vec<IterationStep>) -> Vec<IterationStep> {
    steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| step.with_index(i))
        .collect()
}
