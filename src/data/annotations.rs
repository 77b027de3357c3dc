// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Text annotations attached to slot rows and their merge rules.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name-to-value annotations of one row. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, String>);

/// How annotations with the same name are combined when rows are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationMergeMode {
    /// Distinct values are combined into a JSON array string
    #[default]
    Merge,
    /// The first value wins
    SkipExisting,
    /// The last value wins
    OverwriteExisting,
    /// The merged result carries no annotations
    Discard,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets `name` to `value` and returns the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of `name`, or the empty string when the row has no such annotation.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `other` into `self` using `mode`.
    pub fn merge_from(&mut self, other: &Annotations, mode: AnnotationMergeMode) {
        *self = Self::merge([&*self, other], mode);
    }

    /// Combines several annotation sets into one.
    pub fn merge<'a, I>(sets: I, mode: AnnotationMergeMode) -> Annotations
    where
        I: IntoIterator<Item = &'a Annotations>,
    {
        let mut result = Annotations::new();
        match mode {
            AnnotationMergeMode::Discard => {}
            AnnotationMergeMode::SkipExisting => {
                for set in sets {
                    for (name, value) in set.iter() {
                        if !result.contains(name) {
                            result.insert(name, value);
                        }
                    }
                }
            }
            AnnotationMergeMode::OverwriteExisting => {
                for set in sets {
                    for (name, value) in set.iter() {
                        result.insert(name, value);
                    }
                }
            }
            AnnotationMergeMode::Merge => {
                let mut collected: BTreeMap<&str, Vec<String>> = BTreeMap::new();
                for set in sets {
                    for (name, value) in set.iter() {
                        let values = collected.entry(name).or_default();
                        for v in expand_merged_value(value) {
                            if !values.contains(&v) {
                                values.push(v);
                            }
                        }
                    }
                }
                for (name, values) in collected {
                    result.insert(name, combine_values(values));
                }
            }
        }
        result
    }
}

/// Previously merged values are JSON arrays of strings, anything else is a single value.
fn expand_merged_value(value: &str) -> Vec<String> {
    if value.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<String>>(value) {
            return values;
        }
    }
    vec![value.to_string()]
}

fn combine_values(mut values: Vec<String>) -> String {
    if values.len() == 1 {
        return values.remove(0);
    }
    serde_json::to_string(&values).unwrap_or_else(|_| values.join(","))
}

impl fmt::Display for Annotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Annotations {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut annotations = Annotations::new();
        for (name, value) in iter {
            annotations.insert(name, value);
        }
        annotations
    }
}
