// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Groups rows of several inputs by the values of their reference annotations.
//!
//! Every input is indexed by its discriminator (the values of the reference
//! columns, a missing annotation counting as the empty string). The union of
//! discriminators over all inputs, in order of first appearance, yields one
//! step per key holding every matching row of every input. Matching is exact
//! and case sensitive.

use std::collections::{BTreeSet, HashMap};

use crate::errors::StepGenerationError;
use crate::iteration::step::{
    apply_limit, renumber, ColumnMatching, InputSlot, IterationStep, MergingSettings, StepInput,
    UnmatchedRowPolicy,
};

type Discriminator = Vec<String>;

pub fn generate(
    inputs: &[InputSlot],
    settings: &MergingSettings,
) -> Result<Vec<IterationStep>, StepGenerationError> {
    if inputs.iter().any(|input| !input.optional && input.row_count() == 0) {
        return Ok(Vec::new());
    }

    let groups = match &settings.column_matching {
        ColumnMatching::MergeAll => merge_all(inputs),
        ColumnMatching::SplitAll => split_all(inputs),
        matching => {
            let columns = reference_columns(inputs, matching, &settings.excluded_columns);
            group_by_discriminator(inputs, &columns)
        }
    };

    let steps: Vec<IterationStep> = groups
        .into_iter()
        .map(|rows| IterationStep::new(rows, settings.annotation_merge))
        .collect();
    let steps = apply_limit(steps, settings.limit.as_ref());

    let mut kept = Vec::with_capacity(steps.len());
    for mut step in steps {
        match missing_required_input(inputs, &step) {
            None => kept.push(step),
            Some(slot) => match settings.unmatched {
                UnmatchedRowPolicy::Drop => {}
                UnmatchedRowPolicy::Divert => {
                    step.mark_unmatched();
                    kept.push(step);
                }
                UnmatchedRowPolicy::Fail => {
                    return Err(StepGenerationError::IncompleteStep {
                        slot,
                        annotations: step.annotations().clone(),
                    });
                }
            },
        }
    }
    Ok(renumber(kept))
}

/// Columns that decide which rows belong together.
pub fn reference_columns(
    inputs: &[InputSlot],
    matching: &ColumnMatching,
    excluded: &[String],
) -> Vec<String> {
    let per_slot = |prefix: &str| -> Vec<BTreeSet<String>> {
        inputs
            .iter()
            .filter(|input| input.row_count() > 0)
            .map(|input| {
                input
                    .slot
                    .annotation_columns()
                    .into_iter()
                    .filter(|name| name.starts_with(prefix))
                    .collect()
            })
            .collect()
    };
    let union = |sets: Vec<BTreeSet<String>>| -> BTreeSet<String> {
        sets.into_iter().flatten().collect()
    };
    let intersection = |sets: Vec<BTreeSet<String>>| -> BTreeSet<String> {
        let mut iter = sets.into_iter();
        let first = iter.next().unwrap_or_default();
        iter.fold(first, |acc, set| acc.intersection(&set).cloned().collect())
    };

    let columns: BTreeSet<String> = match matching {
        ColumnMatching::Union => union(per_slot("")),
        ColumnMatching::Intersection => intersection(per_slot("")),
        ColumnMatching::PrefixHashUnion => union(per_slot("#")),
        ColumnMatching::PrefixHashIntersection => intersection(per_slot("#")),
        ColumnMatching::Custom(names) => names.iter().cloned().collect(),
        ColumnMatching::MergeAll | ColumnMatching::SplitAll | ColumnMatching::None => {
            BTreeSet::new()
        }
    };
    columns
        .into_iter()
        .filter(|name| !excluded.contains(name))
        .collect()
}

fn group_by_discriminator(inputs: &[InputSlot], columns: &[String]) -> Vec<Vec<StepInput>> {
    let mut seen: HashMap<Discriminator, usize> = HashMap::new();
    let mut rows_by_key: Vec<Vec<Vec<usize>>> = Vec::new();

    for (slot_index, input) in inputs.iter().enumerate() {
        for row in 0..input.row_count() {
            let key: Discriminator = columns
                .iter()
                .map(|column| input.slot.annotation(row, column).unwrap_or("").to_string())
                .collect();
            let key_index = *seen.entry(key).or_insert_with(|| {
                rows_by_key.push(vec![Vec::new(); inputs.len()]);
                rows_by_key.len() - 1
            });
            rows_by_key[key_index][slot_index].push(row);
        }
    }

    rows_by_key
        .into_iter()
        .map(|slot_rows| {
            inputs
                .iter()
                .zip(slot_rows)
                .map(|(input, rows)| StepInput {
                    name: input.name.clone(),
                    slot: input.slot.clone(),
                    rows,
                })
                .collect()
        })
        .collect()
}

fn merge_all(inputs: &[InputSlot]) -> Vec<Vec<StepInput>> {
    let rows = inputs
        .iter()
        .map(|input| StepInput {
            name: input.name.clone(),
            slot: input.slot.clone(),
            rows: (0..input.row_count()).collect(),
        })
        .collect();
    vec![rows]
}

fn split_all(inputs: &[InputSlot]) -> Vec<Vec<StepInput>> {
    let mut groups = Vec::new();
    for (slot_index, input) in inputs.iter().enumerate() {
        for row in 0..input.row_count() {
            let step = inputs
                .iter()
                .enumerate()
                .map(|(i, other)| StepInput {
                    name: other.name.clone(),
                    slot: other.slot.clone(),
                    rows: if i == slot_index { vec![row] } else { Vec::new() },
                })
                .collect();
            groups.push(step);
        }
    }
    groups
}

fn missing_required_input(inputs: &[InputSlot], step: &IterationStep) -> Option<String> {
    inputs
        .iter()
        .find(|input| !input.optional && step.rows(&input.name).is_empty())
        .map(|input| input.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Annotations, DataContext, DataSlot, DataType, TextData};
    use crate::graph::NodeId;
    use std::sync::Arc;

    fn input(name: &str, samples: &[&str], optional: bool) -> InputSlot {
        let mut slot = DataSlot::new(NodeId::new(), name, DataType::text());
        for sample in samples {
            slot.add_row(
                TextData::item(format!("{}-{}", name, sample)),
                Annotations::new().with("Sample", *sample),
                DataContext::default(),
            )
            .unwrap();
        }
        slot.seal();
        InputSlot::new(name, optional, Arc::new(slot))
    }

    fn sample_inputs() -> Vec<InputSlot> {
        vec![input("A", &["1", "2", "3"], false), input("B", &["1", "2"], false)]
    }

    #[test]
    fn test_divert_keeps_unmatched_step() {
        let settings = MergingSettings::new(UnmatchedRowPolicy::Divert);
        let steps = generate(&sample_inputs(), &settings).unwrap();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].rows("A"), &[0]);
        assert_eq!(steps[0].rows("B"), &[0]);
        assert_eq!(steps[1].annotations().get("Sample"), Some("2"));
        assert!(!steps[1].is_unmatched());

        let unmatched = &steps[2];
        assert!(unmatched.is_unmatched());
        assert_eq!(unmatched.rows("A"), &[2]);
        assert!(unmatched.rows("B").is_empty());
    }

    #[test]
    fn test_groups_follow_first_appearance() {
        let inputs = vec![
            input("A", &["1", "2", "2", "3"], false),
            input("B", &["2", "3", "3"], false),
        ];
        let steps = generate(&inputs, &MergingSettings::new(UnmatchedRowPolicy::Divert)).unwrap();

        let expected: [(&[usize], &[usize], bool); 3] = [
            (&[0], &[], true),
            (&[1, 2], &[0], false),
            (&[3], &[1, 2], false),
        ];
        assert_eq!(steps.len(), expected.len());
        for (step, (a, b, unmatched)) in steps.iter().zip(expected) {
            assert_eq!(step.rows("A"), a, "slot A of step {}", step.index());
            assert_eq!(step.rows("B"), b, "slot B of step {}", step.index());
            assert_eq!(step.is_unmatched(), unmatched, "step {}", step.index());
        }
    }

    #[test]
    fn test_drop_removes_unmatched_step() {
        let settings = MergingSettings::new(UnmatchedRowPolicy::Drop);
        let steps = generate(&sample_inputs(), &settings).unwrap();

        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|step| !step.is_unmatched()));
        assert_eq!(steps[1].index(), 1);
    }

    #[test]
    fn test_fail_reports_incomplete_step() {
        let settings = MergingSettings::new(UnmatchedRowPolicy::Fail);
        let err = generate(&sample_inputs(), &settings).unwrap_err();
        assert!(matches!(
            err,
            StepGenerationError::IncompleteStep { ref slot, .. } if slot == "B"
        ));
    }

    #[test]
    fn test_rows_with_equal_keys_are_grouped() {
        let inputs = vec![
            input("A", &["1", "1", "2"], false),
            input("B", &["2", "1"], false),
        ];
        let steps = generate(&inputs, &MergingSettings::new(UnmatchedRowPolicy::Fail)).unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].rows("A"), &[0, 1]);
        assert_eq!(steps[0].rows("B"), &[1]);
        assert_eq!(steps[1].rows("A"), &[2]);
        assert_eq!(steps[1].rows("B"), &[0]);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let inputs = vec![input("A", &["x"], false), input("B", &["X"], false)];
        let steps = generate(&inputs, &MergingSettings::new(UnmatchedRowPolicy::Drop)).unwrap();
        assert!(steps.is_empty());
    }

    #[test]
    fn test_optional_empty_input_does_not_block() {
        let inputs = vec![input("A", &["1", "2"], false), input("B", &[], true)];
        let steps = generate(&inputs, &MergingSettings::new(UnmatchedRowPolicy::Fail)).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].rows("B").is_empty());
    }

    #[test]
    fn test_required_empty_input_yields_no_steps() {
        let inputs = vec![input("A", &["1", "2"], false), input("B", &[], false)];
        let steps = generate(&inputs, &MergingSettings::new(UnmatchedRowPolicy::Divert)).unwrap();
        assert!(steps.is_empty());
    }

    #[test]
    fn test_merge_all_and_split_all() {
        let merge_all = MergingSettings::new(UnmatchedRowPolicy::Divert)
            .with_column_matching(ColumnMatching::MergeAll);
        let steps = generate(&sample_inputs(), &merge_all).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].rows("A"), &[0, 1, 2]);
        assert_eq!(steps[0].rows("B"), &[0, 1]);
        assert_eq!(steps[0].annotations().get("Sample"), Some(r#"["1","2","3"]"#));

        let split_all = MergingSettings::new(UnmatchedRowPolicy::Divert)
            .with_column_matching(ColumnMatching::SplitAll);
        let steps = generate(&sample_inputs(), &split_all).unwrap();
        assert_eq!(steps.len(), 5);
        assert!(steps.iter().all(|step| step.is_unmatched()));
    }

    #[test]
    fn test_excluded_columns_are_ignored() {
        let inputs = sample_inputs();
        let columns = reference_columns(&inputs, &ColumnMatching::Union, &["Sample".to_string()]);
        assert!(columns.is_empty());

        let settings = MergingSettings::new(UnmatchedRowPolicy::Fail).excluding("Sample");
        let steps = generate(&inputs, &settings).unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_prefix_hash_columns() {
        let mut slot = DataSlot::new(NodeId::new(), "A", DataType::text());
        slot.add_row(
            TextData::item("a"),
            Annotations::new().with("#Dataset", "d1").with("Sample", "1"),
            DataContext::default(),
        )
        .unwrap();
        let inputs = vec![InputSlot::new("A", false, Arc::new(slot))];

        assert_eq!(
            reference_columns(&inputs, &ColumnMatching::PrefixHashUnion, &[]),
            vec!["#Dataset"]
        );
        assert_eq!(
            reference_columns(&inputs, &ColumnMatching::Union, &[]),
            vec!["#Dataset", "Sample"]
        );
    }

    #[test]
    fn test_intersection_keeps_shared_columns() {
        let mut first = DataSlot::new(NodeId::new(), "A", DataType::text());
        first
            .add_row(
                TextData::item("a"),
                Annotations::new().with("Sample", "1").with("Channel", "red"),
                DataContext::default(),
            )
            .unwrap();
        let mut second = DataSlot::new(NodeId::new(), "B", DataType::text());
        second
            .add_row(
                TextData::item("b"),
                Annotations::new().with("Sample", "1"),
                DataContext::default(),
            )
            .unwrap();
        let inputs = vec![
            InputSlot::new("A", false, Arc::new(first)),
            InputSlot::new("B", false, Arc::new(second)),
        ];
        assert_eq!(
            reference_columns(&inputs, &ColumnMatching::Intersection, &[]),
            vec!["Sample"]
        );
    }
}
