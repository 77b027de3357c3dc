// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One step per row, pairing rows of all inputs by position.

use crate::errors::StepGenerationError;
use crate::iteration::step::{apply_limit, InputSlot, IterationSettings, IterationStep, StepInput};

/// Pairs row `i` of every participating input.
///
/// * A required input without rows yields no steps.
/// * An optional input without rows does not participate.
/// * Without inputs, or when every input is optional and empty, one empty step is produced.
/// * Equal row counts give one step per row. Otherwise exactly one input may
///   hold a single row, which is broadcast to every step.
pub fn generate(
    inputs: &[InputSlot],
    settings: &IterationSettings,
) -> Result<Vec<IterationStep>, StepGenerationError> {
    if inputs.iter().any(|input| !input.optional && input.row_count() == 0) {
        return Ok(Vec::new());
    }

    let participating: Vec<&InputSlot> = inputs.iter().filter(|i| i.row_count() > 0).collect();
    if participating.is_empty() {
        let step = IterationStep::new(empty_inputs(inputs), settings.annotation_merge);
        return Ok(apply_limit(vec![step], settings.limit.as_ref()));
    }

    let step_count = step_count(&participating)?;
    let mut steps = Vec::with_capacity(step_count);
    for row in 0..step_count {
        let step_inputs = inputs
            .iter()
            .map(|input| {
                let rows = match input.row_count() {
                    0 => Vec::new(),
                    1 => vec![0],
                    _ => vec![row],
                };
                StepInput {
                    name: input.name.clone(),
                    slot: input.slot.clone(),
                    rows,
                }
            })
            .collect();
        steps.push(IterationStep::new(step_inputs, settings.annotation_merge));
    }
    Ok(apply_limit(steps, settings.limit.as_ref()))
}

fn step_count(participating: &[&InputSlot]) -> Result<usize, StepGenerationError> {
    let first = participating[0].row_count();
    if participating.iter().all(|input| input.row_count() == first) {
        return Ok(first);
    }

    let singles = participating.iter().filter(|i| i.row_count() == 1).count();
    let mut others = participating
        .iter()
        .map(|i| i.row_count())
        .filter(|&rows| rows != 1);
    let broadcast_target = others.next();
    let consistent = others.all(|rows| Some(rows) == broadcast_target);

    match broadcast_target {
        Some(rows) if singles == 1 && consistent => Ok(rows),
        _ => Err(StepGenerationError::SizeMismatch {
            sizes: participating
                .iter()
                .map(|i| (i.name.clone(), i.row_count()))
                .collect(),
        }),
    }
}

fn empty_inputs(inputs: &[InputSlot]) -> Vec<StepInput> {
    inputs
        .iter()
        .map(|input| StepInput {
            name: input.name.clone(),
            slot: input.slot.clone(),
            rows: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AnnotationMergeMode, Annotations, DataContext, DataSlot, DataType, TextData};
    use crate::graph::NodeId;
    use std::sync::Arc;

    fn input(name: &str, rows: usize, optional: bool) -> InputSlot {
        let mut slot = DataSlot::new(NodeId::new(), name, DataType::text());
        for i in 0..rows {
            slot.add_row(
                TextData::item(format!("{}{}", name, i)),
                Annotations::new().with(name, i.to_string()),
                DataContext::default(),
            )
            .unwrap();
        }
        slot.seal();
        InputSlot::new(name, optional, Arc::new(slot))
    }

    #[test]
    fn test_equal_sizes_pair_rows_by_position() {
        let inputs = vec![input("A", 4, false), input("B", 4, false)];
        let steps = generate(&inputs, &IterationSettings::default()).unwrap();

        assert_eq!(steps.len(), 4);
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.index(), i);
            assert_eq!(step.rows("A"), &[i]);
            assert_eq!(step.rows("B"), &[i]);
        }
    }

    #[test]
    fn test_single_row_is_broadcast() {
        let inputs = vec![input("A", 4, false), input("B", 1, false)];
        let steps = generate(&inputs, &IterationSettings::default()).unwrap();

        assert_eq!(steps.len(), 4);
        assert!(steps.iter().all(|step| step.rows("B") == [0]));
        assert_eq!(steps[3].rows("A"), &[3]);
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let inputs = vec![input("A", 4, false), input("B", 3, false)];
        let err = generate(&inputs, &IterationSettings::default()).unwrap_err();
        assert_eq!(
            err,
            StepGenerationError::SizeMismatch {
                sizes: vec![("A".to_string(), 4), ("B".to_string(), 3)]
            }
        );
    }

    #[test]
    fn test_two_single_rows_against_many_is_an_error() {
        let inputs = vec![input("A", 4, false), input("B", 1, false), input("C", 1, false)];
        assert!(generate(&inputs, &IterationSettings::default()).is_err());
    }

    #[test]
    fn test_required_empty_input_yields_no_steps() {
        let inputs = vec![input("A", 4, false), input("B", 0, false)];
        assert!(generate(&inputs, &IterationSettings::default()).unwrap().is_empty());
    }

    #[test]
    fn test_optional_empty_input_does_not_participate() {
        let inputs = vec![input("A", 3, false), input("B", 0, true)];
        let steps = generate(&inputs, &IterationSettings::default()).unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps[0].rows("B").is_empty());
    }

    #[test]
    fn test_no_inputs_yield_one_step() {
        let steps = generate(&[], &IterationSettings::default()).unwrap();
        assert_eq!(steps.len(), 1);
        assert!(steps[0].inputs().is_empty());
    }

    #[test]
    fn test_all_optional_and_empty_yield_one_empty_step() {
        let inputs = vec![input("A", 0, true)];
        let steps = generate(&inputs, &IterationSettings::default()).unwrap();
        assert_eq!(steps.len(), 1);
        assert!(steps[0].rows("A").is_empty());
    }

    #[test]
    fn test_step_annotations_are_merged() {
        let inputs = vec![input("A", 2, false), input("B", 2, false)];
        let steps = generate(&inputs, &IterationSettings::default()).unwrap();
        assert_eq!(steps[1].annotations().get("A"), Some("1"));
        assert_eq!(steps[1].annotations().get("B"), Some("1"));

        let discard = IterationSettings {
            annotation_merge: AnnotationMergeMode::Discard,
            limit: None,
        };
        let steps = generate(&inputs, &discard).unwrap();
        assert!(steps[0].annotations().is_empty());
    }

    #[test]
    fn test_limit_keeps_range_and_renumbers() {
        let inputs = vec![input("A", 5, false)];
        let settings = IterationSettings {
            annotation_merge: AnnotationMergeMode::Merge,
            limit: Some(1..3),
        };
        let steps = generate(&inputs, &settings).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].index(), 0);
        assert_eq!(steps[0].rows("A"), &[1]);
        assert_eq!(steps[1].rows("A"), &[2]);
    }
}
