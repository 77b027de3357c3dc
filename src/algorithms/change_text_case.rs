// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::algorithms::text_of;
use crate::data::{Annotations, DataType, ReadMode, SlotInfo, TextData};
use crate::engine::ProgressInfo;
use crate::errors::{ValidationContext, ValidationIssue, ValidationReport};
use crate::graph::GraphNode;
use crate::iteration::{IterationContext, IterationStep};
use crate::traits::Algorithm;

pub const INPUT: &str = "Input";
pub const OUTPUT: &str = "Output";
/// Node parameter overriding the algorithm's default case
pub const CASE_PARAMETER: &str = "case";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Upper,
    Lower,
    /// First letter of each word capitalized
    Proper,
    /// Like proper, but short articles and prepositions stay lowercase
    Title,
}

impl CaseType {
    pub fn apply(&self, input: &str) -> String {
        match self {
            CaseType::Upper => input.to_uppercase(),
            CaseType::Lower => input.to_lowercase(),
            CaseType::Proper => input
                .split_whitespace()
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
            CaseType::Title => input
                .split_whitespace()
                .enumerate()
                .map(|(i, word)| {
                    let lower_word = word.to_lowercase();
                    if i == 0 || !is_small_word(&lower_word) {
                        capitalize(word)
                    } else {
                        lower_word
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

fn is_small_word(word: &str) -> bool {
    matches!(
        word,
        "a" | "an" | "the" | "and" | "or" | "but" | "in" | "on" | "at" | "to" | "for" | "of"
            | "with" | "by"
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}

/// Converts every text row to a different case, one row per step.
#[derive(Debug, Clone)]
pub struct ChangeTextCase {
    case: CaseType,
}

impl ChangeTextCase {
    pub fn new(case: CaseType) -> Self {
        Self { case }
    }

    pub fn upper() -> Self {
        Self::new(CaseType::Upper)
    }

    pub fn lower() -> Self {
        Self::new(CaseType::Lower)
    }

    pub fn proper() -> Self {
        Self::new(CaseType::Proper)
    }

    pub fn title() -> Self {
        Self::new(CaseType::Title)
    }

    pub fn case(&self) -> CaseType {
        self.case
    }
}

#[async_trait]
impl Algorithm for ChangeTextCase {
    fn name(&self) -> &'static str {
        "change_text_case"
    }

    fn input_slots(&self) -> Vec<SlotInfo> {
        vec![SlotInfo::input(INPUT, DataType::text())]
    }

    fn output_slots(&self) -> Vec<SlotInfo> {
        vec![SlotInfo::output(OUTPUT, DataType::text())]
    }

    fn report_validity(&self, node: &GraphNode, report: &mut ValidationReport) {
        if let Some(value) = node.parameter(CASE_PARAMETER) {
            if let Err(e) = serde_json::from_value::<CaseType>(value.clone()) {
                report.error(
                    ValidationContext::Node {
                        id: node.id(),
                        name: node.name().to_string(),
                    },
                    ValidationIssue::Algorithm {
                        message: format!("Parameter '{}' is not a known case: {}", CASE_PARAMETER, e),
                    },
                );
            }
        }
    }

    async fn run_iteration(
        &self,
        step: &IterationStep,
        ctx: &mut IterationContext,
        _progress: &ProgressInfo,
    ) -> anyhow::Result<()> {
        let case = ctx
            .parameter::<CaseType>(CASE_PARAMETER)
            .context("Invalid case parameter")?
            .unwrap_or(self.case);
        let items = step.data(INPUT, ReadMode::Share)?;
        if items.is_empty() {
            return Err(anyhow!("Step {} has no '{}' rows", step.index(), INPUT));
        }
        for item in items {
            let converted = case.apply(text_of(&item)?);
            ctx.add_output(OUTPUT, TextData::item(converted), Annotations::new())?;
        }
        Ok(())
    }
}
