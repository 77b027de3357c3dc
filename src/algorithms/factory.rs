// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::{ChangeTextCase, JoinText, SourceText};
use crate::traits::Algorithm;

/// Factory for creating built-in algorithm instances by name
pub struct AlgorithmFactory;

impl AlgorithmFactory {
    /// Create an algorithm instance by implementation name
    ///
    /// - "source_text" -> SourceText
    /// - "change_text_case_upper" -> ChangeTextCase (uppercase)
    /// - "change_text_case_lower" -> ChangeTextCase (lowercase)
    /// - "change_text_case_proper" -> ChangeTextCase (proper case)
    /// - "change_text_case_title" -> ChangeTextCase (title case)
    /// - "join_text" -> JoinText
    pub fn create(name: &str) -> Result<Arc<dyn Algorithm>, String> {
        match name {
            "source_text" => Ok(Arc::new(SourceText)),

            "change_text_case_upper" => Ok(Arc::new(ChangeTextCase::upper())),
            "change_text_case_lower" => Ok(Arc::new(ChangeTextCase::lower())),
            "change_text_case_proper" => Ok(Arc::new(ChangeTextCase::proper())),
            "change_text_case_title" => Ok(Arc::new(ChangeTextCase::title())),

            "join_text" => Ok(Arc::new(JoinText)),

            _ => Err(format!("Unknown algorithm implementation: '{}'", name)),
        }
    }

    /// List all available algorithm implementations
    pub fn list_available_implementations() -> Vec<&'static str> {
        vec![
            "source_text",
            "change_text_case_upper",
            "change_text_case_lower",
            "change_text_case_proper",
            "change_text_case_title",
            "join_text",
        ]
    }

    /// Check if an implementation is available
    pub fn is_implementation_available(name: &str) -> bool {
        Self::list_available_implementations().contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_implementation_can_be_created() {
        for name in AlgorithmFactory::list_available_implementations() {
            let algorithm = AlgorithmFactory::create(name)
                .unwrap_or_else(|e| panic!("Failed to create {}: {}", name, e));
            assert!(name.starts_with(algorithm.name()));
        }
    }

    #[test]
    fn test_unknown_implementation() {
        let err = AlgorithmFactory::create("reverse_text").err().unwrap();
        assert!(err.contains("reverse_text"));
        assert!(!AlgorithmFactory::is_implementation_available("reverse_text"));
        assert!(AlgorithmFactory::is_implementation_available("join_text"));
    }
}
